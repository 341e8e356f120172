pub mod csv_writer;
pub mod html;

use std::fs;
use std::path::PathBuf;

use nightscreen_core::{MarketSentiment, NightscreenError, Opportunity};
use tracing::info;

/// Produces the three per-run artifacts named in `reports/YYYY-MM-DD/`:
/// `morning_report.html`, `full_results.csv`, `event_risk_summary.csv`.
/// `run_state.json` is the orchestrator's own concern, not emitted here.
pub struct ReportEmitter {
    run_dir: PathBuf,
}

impl ReportEmitter {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self { run_dir: run_dir.into() }
    }

    pub fn emit(
        &self,
        run_date: &str,
        market: &MarketSentiment,
        ranked: &[Opportunity],
    ) -> Result<(), NightscreenError> {
        fs::create_dir_all(&self.run_dir).map_err(io_error)?;

        let watchlist: Vec<&Opportunity> = ranked
            .iter()
            .filter(|o| o.prediction.final_confidence >= 60.0 && o.prediction.final_confidence < 75.0)
            .collect();

        let sit_outs: Vec<&Opportunity> = ranked.iter().filter(|o| o.guard.skip_trading).collect();

        let html = html::MorningReportHtml::render(run_date, market, ranked, &watchlist, &sit_outs);
        self.write_atomic("morning_report.html", html.as_bytes())?;

        let mut full_csv = Vec::new();
        csv_writer::write_full_results(ranked, &mut full_csv)?;
        self.write_atomic("full_results.csv", &full_csv)?;

        let mut event_csv = Vec::new();
        csv_writer::write_event_risk_summary(ranked, &mut event_csv)?;
        self.write_atomic("event_risk_summary.csv", &event_csv)?;

        info!(
            run_dir = %self.run_dir.display(),
            opportunities = ranked.len(),
            watchlist = watchlist.len(),
            sit_outs = sit_outs.len(),
            "report emitted"
        );

        Ok(())
    }

    /// Write to `<name>.tmp` then rename over the final path, so a reader
    /// never observes a partially-written report.
    fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<(), NightscreenError> {
        let final_path = self.run_dir.join(name);
        let tmp_path = self.run_dir.join(format!("{name}.tmp"));
        fs::write(&tmp_path, contents).map_err(io_error)?;
        fs::rename(&tmp_path, &final_path).map_err(io_error)?;
        Ok(())
    }
}

/// True when a report should explicitly say the pipeline yielded nothing,
/// per spec.md §7's "a run with zero candidates produces a report that
/// explicitly states the pipeline yielded nothing" requirement.
pub fn describe_empty_run(reason_counts: &nightscreen_core::RunCounts) -> String {
    format!(
        "No opportunities were produced this run. Universe size {}, candidates found {}, predictions made {}.",
        reason_counts.universe_size, reason_counts.candidates_found, reason_counts.predictions_made,
    )
}

fn io_error(e: std::io::Error) -> NightscreenError {
    NightscreenError::ReportWrite { reason: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightscreen_core::{
        Candidate, Direction, GapConfidence, GapDirection, GuardResult, ModelContribution, ModelName,
        OverallSentiment, Prediction, Rating, Sector,
    };

    fn market() -> MarketSentiment {
        MarketSentiment {
            spi_change_pct: 0.3,
            sp500_change_pct: Some(0.2),
            nasdaq_change_pct: Some(0.4),
            dow_change_pct: Some(0.1),
            gap_direction: GapDirection::Up,
            gap_confidence: GapConfidence::High,
            overall_sentiment: OverallSentiment::Bullish,
            sentiment_score: 65.0,
        }
    }

    fn opportunity(symbol: &str, score: f64, skip: bool) -> Opportunity {
        let mut guard = GuardResult::clean(symbol);
        guard.skip_trading = skip;
        if skip {
            guard.warning_message = format!("{symbol}: sitting out, earnings in buffer window");
        }
        Opportunity {
            score,
            rating: Rating::from_score(score),
            candidate: Candidate {
                symbol: symbol.to_string(),
                sector: Sector::Financials,
                name: symbol.to_string(),
                price: 20.0,
                avg_volume: 2_000_000,
                volatility: 0.18,
                beta: 1.1,
                screening_score: 70.0,
            },
            prediction: Prediction {
                direction: Direction::Buy,
                confidence: 0.7,
                expected_change_pct: 0.02,
                contributions: vec![ModelContribution {
                    model: ModelName::Trend,
                    direction: Direction::Buy,
                    confidence: 0.7,
                    weight: 1.0,
                }],
                volume_adjustment: 0.0,
                event_adjustment: 0.0,
                final_confidence: 68.0,
            },
            guard,
        }
    }

    #[test]
    fn emit_writes_all_three_artifacts_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ReportEmitter::new(dir.path());
        let ranked = vec![opportunity("AAA.AX", 80.0, false), opportunity("BBB.AX", 40.0, true)];
        emitter.emit("2026-07-29", &market(), &ranked).unwrap();

        assert!(dir.path().join("morning_report.html").exists());
        assert!(dir.path().join("full_results.csv").exists());
        assert!(dir.path().join("event_risk_summary.csv").exists());
        assert!(!dir.path().join("morning_report.html.tmp").exists());
    }

    #[test]
    fn html_report_includes_sit_out_warning() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ReportEmitter::new(dir.path());
        let ranked = vec![opportunity("BBB.AX", 40.0, true)];
        emitter.emit("2026-07-29", &market(), &ranked).unwrap();
        let html = fs::read_to_string(dir.path().join("morning_report.html")).unwrap();
        assert!(html.contains("sitting out"));
    }

    #[test]
    fn full_csv_has_at_least_forty_columns() {
        let mut buf = Vec::new();
        csv_writer::write_full_results(&[opportunity("AAA.AX", 80.0, false)], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.split(',').count() >= 40);
    }

    #[test]
    fn empty_run_description_names_the_reason_counts() {
        let counts = nightscreen_core::RunCounts { universe_size: 240, ..Default::default() };
        let text = describe_empty_run(&counts);
        assert!(text.contains("240"));
    }
}
