use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use nightscreen_core::{
    Candidate, EventInfo, GuardResult, MarketSentiment, NightscreenError, OhlcvSource, Opportunity,
    Phase, PhaseStatus, RunCounts, RunState, SentimentSource,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn, Instrument};

use batch_predictor::BatchPredictor;
use event_risk_guard::EventRiskGuard;
use market_data_adapter::MarketDataAdapter;
use notification_service::ExternalNotifier;
use opportunity_scorer::{OpportunityScorer, ScoringInput};
use report_emitter::ReportEmitter;
use spi_monitor::SpiMonitor;
use stock_scanner::{StockScanner, Universe};

use crate::config::RunConfig;

const SCANNER_SOFT_BUDGET: Duration = Duration::from_secs(20 * 60);
const PREDICTION_SOFT_BUDGET: Duration = Duration::from_secs(20 * 60);
const EVENT_RISK_SOFT_BUDGET: Duration = Duration::from_secs(10 * 60);

/// Process exit codes per spec.md §6. Anything outside these three (an
/// unhandled error propagating out of `main`) exits through a separate,
/// higher non-zero code — see `main.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    NoCandidates,
    HardCapExceeded,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::NoCandidates => 2,
            ExitCode::HardCapExceeded => 3,
        }
    }
}

/// Runs a future to completion while racing a soft wall-clock budget.
/// Exceeding the budget only logs and records a warning on `state` — the
/// work already in flight is never cancelled, per spec.md §5's "detect and
/// warn, never forcibly cancel" posture for per-phase budgets.
async fn run_with_soft_budget<F, T>(phase: Phase, budget: Duration, state: &mut RunState, fut: F) -> T
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(fut);
    tokio::pin!(handle);
    let sleep = tokio::time::sleep(budget);
    tokio::pin!(sleep);

    tokio::select! {
        res = &mut handle => res.expect("phase task panicked"),
        _ = &mut sleep => {
            let message = format!(
                "{} exceeded its soft wall-clock budget of {}m; letting in-flight work finish",
                phase.as_str(),
                budget.as_secs() / 60,
            );
            warn!(phase = phase.as_str(), "phase soft budget exceeded");
            state.warn(message);
            handle.await.expect("phase task panicked")
        }
    }
}

async fn scan_phase(scanner: StockScanner, universe: Universe) -> Vec<Candidate> {
    scanner.scan(&universe).await
}

async fn event_risk_phase(
    guard: Arc<EventRiskGuard>,
    semaphore: Arc<Semaphore>,
    candidates: Vec<Candidate>,
    today: NaiveDate,
) -> Vec<(Candidate, GuardResult)> {
    let mut set = JoinSet::new();
    for candidate in candidates {
        let guard = guard.clone();
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let result = guard.assess(&candidate.symbol, today).await;
            (candidate, result)
        });
    }

    let mut out = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(pair) => out.push(pair),
            Err(e) => warn!(error = %e, "event-risk task panicked"),
        }
    }
    out
}

async fn prediction_phase(
    predictor: Arc<BatchPredictor>,
    semaphore: Arc<Semaphore>,
    guarded: Vec<(Candidate, GuardResult)>,
) -> Vec<ScoringInput> {
    let mut set = JoinSet::new();
    for (candidate, guard) in guarded {
        let predictor = predictor.clone();
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let prediction = predictor.predict(&candidate, &guard).await;
            (candidate, guard, prediction)
        });
    }

    let mut out = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((candidate, _, None)) => {
                warn!(symbol = candidate.symbol, "no prediction produced, dropping candidate");
            }
            Ok((candidate, guard, Some(prediction))) => {
                out.push(ScoringInput { candidate, prediction, guard });
            }
            Err(e) => warn!(error = %e, "prediction task panicked"),
        }
    }
    out
}

fn io_error(e: std::io::Error) -> NightscreenError {
    NightscreenError::ReportWrite { reason: e.to_string() }
}

/// Drives the 8 phases of an overnight run end to end, persisting
/// `RunState` after every phase transition so a crash mid-run leaves a
/// readable trail of how far the pipeline got (spec.md §4.9, §7).
pub struct Orchestrator {
    run_id: NaiveDate,
    run_dir: PathBuf,
    config: RunConfig,
    adapter: Arc<MarketDataAdapter>,
    sentiment: Arc<dyn SentimentSource>,
    notifier: Arc<dyn ExternalNotifier>,
    universe: Universe,
    calendar: Vec<EventInfo>,
    lstm_dir: PathBuf,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: NaiveDate,
        run_dir: PathBuf,
        config: RunConfig,
        adapter: Arc<MarketDataAdapter>,
        sentiment: Arc<dyn SentimentSource>,
        notifier: Arc<dyn ExternalNotifier>,
        universe: Universe,
        calendar: Vec<EventInfo>,
        lstm_dir: PathBuf,
    ) -> Self {
        Self {
            run_id,
            run_dir,
            config,
            adapter,
            sentiment,
            notifier,
            universe,
            calendar,
            lstm_dir,
        }
    }

    fn hard_cap_exceeded(&self, run_start: Instant, hard_cap: Duration) -> bool {
        !hard_cap.is_zero() && run_start.elapsed() > hard_cap
    }

    fn persist(&self, state: &RunState, state_path: &Path) -> Result<(), NightscreenError> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| NightscreenError::ReportWrite { reason: e.to_string() })?;
        let tmp_path = PathBuf::from(format!("{}.tmp", state_path.display()));
        std::fs::write(&tmp_path, &json).map_err(io_error)?;
        std::fs::rename(&tmp_path, state_path).map_err(io_error)?;
        Ok(())
    }

    /// The hard-cap path: skip straight to Emit with whatever was produced
    /// so far (possibly nothing) and Notify, per spec.md §5's "short-circuit
    /// to report emission, exit code 3" rule.
    async fn short_circuit(
        &self,
        mut state: RunState,
        state_path: &Path,
        market: &MarketSentiment,
        ranked: &[Opportunity],
    ) -> Result<ExitCode, NightscreenError> {
        warn!("hard overall run cap exceeded, short-circuiting to report emission");
        state.warn("hard overall run cap (run.hard_cap_minutes) exceeded; emitting partial results");

        let run_date = self.run_id.format("%Y-%m-%d").to_string();
        let emitter = ReportEmitter::new(self.run_dir.clone());

        state.set_phase(Phase::Emit, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        emitter.emit(&run_date, market, ranked)?;
        state.set_phase(Phase::Emit, PhaseStatus::Complete);
        self.persist(&state, state_path)?;

        state.set_phase(Phase::Notify, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        self.notifier
            .send(
                &format!("Overnight pipeline — hard cap exceeded ({run_date})"),
                "The overnight pipeline exceeded its hard overall time budget and emitted partial results.",
                &[],
            )
            .await;
        state.set_phase(Phase::Notify, PhaseStatus::Complete);
        state.finished_at = Some(chrono::Utc::now());
        self.persist(&state, state_path)?;

        Ok(ExitCode::HardCapExceeded)
    }

    async fn notify(&self, run_date: &str, is_empty: bool, counts: &RunCounts) {
        let subject = format!("Overnight Screen — {run_date}");
        let html_path = self.run_dir.join("morning_report.html");
        let body = std::fs::read_to_string(&html_path)
            .unwrap_or_else(|_| report_emitter::describe_empty_run(counts));

        let attachments = if is_empty {
            Vec::new()
        } else {
            vec![self.run_dir.join("full_results.csv"), self.run_dir.join("event_risk_summary.csv")]
        };

        self.notifier.send(&subject, &body, &attachments).await;
    }

    pub async fn run(&self, state_path: &Path) -> Result<ExitCode, NightscreenError> {
        let run_start = Instant::now();
        let hard_cap = Duration::from_secs(self.config.run.hard_cap_minutes.max(0) as u64 * 60);

        let mut state = RunState::new(self.run_id);
        state.counts.universe_size = self.universe.total_tickers();
        state.set_phase(Phase::Config, PhaseStatus::Complete);
        self.persist(&state, state_path)?;

        if self.hard_cap_exceeded(run_start, hard_cap) {
            return self.short_circuit(state, state_path, &MarketSentiment::default(), &[]).await;
        }

        state.set_phase(Phase::SpiSentiment, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        let market = SpiMonitor::new(self.adapter.clone())
            .assess()
            .instrument(tracing::info_span!("phase", name = "spi_sentiment"))
            .await;
        state.set_phase(Phase::SpiSentiment, PhaseStatus::Complete);
        self.persist(&state, state_path)?;

        if self.hard_cap_exceeded(run_start, hard_cap) {
            return self.short_circuit(state, state_path, &market, &[]).await;
        }

        state.set_phase(Phase::Scan, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        let ohlcv: Arc<dyn OhlcvSource> = self.adapter.clone();
        let scanner = StockScanner::new(ohlcv, self.adapter.worker_semaphore());
        let candidates = run_with_soft_budget(
            Phase::Scan,
            SCANNER_SOFT_BUDGET,
            &mut state,
            scan_phase(scanner, self.universe.clone()).instrument(tracing::info_span!("phase", name = "scan")),
        )
        .await;
        state.counts.candidates_found = candidates.len();
        if candidates.is_empty() {
            warn!("scan produced zero candidates");
        }
        state.set_phase(Phase::Scan, PhaseStatus::Complete);
        self.persist(&state, state_path)?;

        if self.hard_cap_exceeded(run_start, hard_cap) {
            return self.short_circuit(state, state_path, &market, &[]).await;
        }

        state.set_phase(Phase::EventRisk, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        let guard = Arc::new(EventRiskGuard::new(
            self.calendar.clone(),
            self.adapter.clone() as Arc<dyn OhlcvSource>,
            self.sentiment.clone(),
            self.config.event_guard.clone(),
        ));
        let today = event_risk_guard::market_today();
        let guarded = run_with_soft_budget(
            Phase::EventRisk,
            EVENT_RISK_SOFT_BUDGET,
            &mut state,
            event_risk_phase(guard, self.adapter.worker_semaphore(), candidates.clone(), today)
                .instrument(tracing::info_span!("phase", name = "event_risk")),
        )
        .await;
        state.set_phase(Phase::EventRisk, PhaseStatus::Complete);
        self.persist(&state, state_path)?;

        if self.hard_cap_exceeded(run_start, hard_cap) {
            return self.short_circuit(state, state_path, &market, &[]).await;
        }

        state.set_phase(Phase::Prediction, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        let predictor = Arc::new(BatchPredictor::with_weights(
            self.adapter.clone() as Arc<dyn OhlcvSource>,
            self.sentiment.clone(),
            BatchPredictor::default_models(self.lstm_dir.clone()),
            market.sentiment_score,
            self.config.ensemble.weights,
        ));
        let scored_inputs = run_with_soft_budget(
            Phase::Prediction,
            PREDICTION_SOFT_BUDGET,
            &mut state,
            prediction_phase(predictor, self.adapter.worker_semaphore(), guarded)
                .instrument(tracing::info_span!("phase", name = "prediction")),
        )
        .await;
        state.counts.predictions_made = scored_inputs.len();
        state.counts.skipped_event_risk = candidates.len().saturating_sub(scored_inputs.len());
        state.set_phase(Phase::Prediction, PhaseStatus::Complete);
        self.persist(&state, state_path)?;

        if self.hard_cap_exceeded(run_start, hard_cap) {
            return self.short_circuit(state, state_path, &market, &[]).await;
        }

        state.set_phase(Phase::Scoring, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        let ranked = OpportunityScorer::rank(scored_inputs, &market);
        state.counts.opportunities_ranked = ranked.len();
        state.set_phase(Phase::Scoring, PhaseStatus::Complete);
        self.persist(&state, state_path)?;

        state.set_phase(Phase::Emit, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        let run_date = self.run_id.format("%Y-%m-%d").to_string();
        if ranked.is_empty() {
            state.warn(report_emitter::describe_empty_run(&state.counts));
        }
        let emitter = ReportEmitter::new(self.run_dir.clone());
        emitter.emit(&run_date, &market, &ranked)?;
        state.set_phase(Phase::Emit, PhaseStatus::Complete);
        self.persist(&state, state_path)?;

        state.set_phase(Phase::Notify, PhaseStatus::Running);
        self.persist(&state, state_path)?;
        self.notify(&run_date, ranked.is_empty(), &state.counts).await;
        state.set_phase(Phase::Notify, PhaseStatus::Complete);
        state.finished_at = Some(chrono::Utc::now());
        self.persist(&state, state_path)?;

        info!(
            candidates = state.counts.candidates_found,
            predictions = state.counts.predictions_made,
            opportunities = state.counts.opportunities_ranked,
            "overnight pipeline run complete"
        );

        if ranked.is_empty() {
            Ok(ExitCode::NoCandidates)
        } else {
            Ok(ExitCode::Success)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use market_data_adapter::provider::test_support::RecordingProvider;
    use nightscreen_core::{Bar, Sector, SentimentSnapshot};
    use notification_service::NoopNotifier;
    use std::collections::BTreeMap;

    struct NoSentiment;
    #[async_trait]
    impl SentimentSource for NoSentiment {
        async fn sentiment(&self, _symbol: &str, _lookback_hours: i64) -> SentimentSnapshot {
            SentimentSnapshot::empty()
        }
    }

    fn bar(i: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i * 86_400, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_500_000.0,
        }
    }

    fn tiny_universe() -> Universe {
        let mut by_sector = BTreeMap::new();
        for sector in Sector::all() {
            by_sector.insert(sector, vec![]);
        }
        by_sector.insert(Sector::Financials, vec!["AAA.AX".to_string()]);
        Universe { by_sector }
    }

    #[tokio::test]
    async fn empty_universe_run_yields_no_candidates_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(RecordingProvider::new(vec![bar(0, 10.0)]));
        let fallback = Arc::new(RecordingProvider::new(vec![bar(0, 10.0)]));
        let adapter = Arc::new(MarketDataAdapter::new(primary, fallback));

        let mut universe = tiny_universe();
        universe.by_sector.insert(Sector::Financials, vec![]);

        let orchestrator = Orchestrator::new(
            chrono::NaiveDate::from_ymd_opt(2026, 7, 29).unwrap(),
            dir.path().join("run"),
            RunConfig::default(),
            adapter,
            Arc::new(NoSentiment),
            Arc::new(NoopNotifier),
            universe,
            vec![],
            dir.path().join("lstm"),
        );

        let state_path = dir.path().join("run_state.json");
        let exit = orchestrator.run(&state_path).await.unwrap();
        assert_eq!(exit, ExitCode::NoCandidates);
        assert!(state_path.exists());
    }

    #[tokio::test]
    async fn zero_hard_cap_minutes_never_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(RecordingProvider::new(vec![bar(0, 10.0)]));
        let fallback = Arc::new(RecordingProvider::new(vec![bar(0, 10.0)]));
        let adapter = Arc::new(MarketDataAdapter::new(primary, fallback));

        let mut config = RunConfig::default();
        config.run.hard_cap_minutes = 0;

        let orchestrator = Orchestrator::new(
            chrono::NaiveDate::from_ymd_opt(2026, 7, 29).unwrap(),
            dir.path().join("run"),
            config,
            adapter,
            Arc::new(NoSentiment),
            Arc::new(NoopNotifier),
            tiny_universe(),
            vec![],
            dir.path().join("lstm"),
        );

        let state_path = dir.path().join("run_state.json");
        let exit = orchestrator.run(&state_path).await.unwrap();
        assert_ne!(exit, ExitCode::HardCapExceeded);
    }
}
