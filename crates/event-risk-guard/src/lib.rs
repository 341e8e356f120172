pub mod calendar;

use std::sync::Arc;

use chrono::NaiveDate;
use nightscreen_core::{math, EventInfo, EventType, GuardResult, Interval, OhlcvSource, Period, SentimentSource};

pub use calendar::{market_today, parse_calendar};

const BETA_PROXY_SYMBOL: &str = "^AXJO";
const HEDGE_BETA_WINDOW_DAYS: usize = 60;
const SENTIMENT_WINDOW_HOURS: i64 = 72;

/// Run-configuration knobs the spec exposes under `event_guard.*`, with the
/// defaults from §6. `Deserialize` so `pipeline-orchestrator::RunConfig` can
/// load overrides straight out of the run's JSON config file; missing keys
/// fall back to `Default`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct EventGuardConfig {
    pub lookahead_days: i64,
    pub earnings_buffer_days: i64,
    pub dividend_buffer_days: i64,
    pub neg_sentiment_threshold: f64,
    pub vol_spike_multiplier: f64,
    pub haircut_max: f64,
}

impl Default for EventGuardConfig {
    fn default() -> Self {
        Self {
            lookahead_days: 7,
            earnings_buffer_days: 3,
            dividend_buffer_days: 1,
            neg_sentiment_threshold: -0.10,
            vol_spike_multiplier: 1.35,
            haircut_max: 0.70,
        }
    }
}

/// Event detector + risk scorer. Computes per-ticker position haircuts and
/// sit-out windows from the manual calendar, rolling news sentiment and
/// realized-volatility spikes. Mirrors the risk workspace's "weighted
/// dimensions, additive-then-clamped, banded classification" shape, with
/// the spec's fixed weights instead of that workspace's tunable ones.
pub struct EventRiskGuard {
    calendar: Vec<EventInfo>,
    ohlcv: Arc<dyn OhlcvSource>,
    sentiment: Arc<dyn SentimentSource>,
    config: EventGuardConfig,
}

impl EventRiskGuard {
    pub fn new(
        calendar: Vec<EventInfo>,
        ohlcv: Arc<dyn OhlcvSource>,
        sentiment: Arc<dyn SentimentSource>,
        config: EventGuardConfig,
    ) -> Self {
        Self {
            calendar,
            ohlcv,
            sentiment,
            config,
        }
    }

    /// Events for `symbol` within the lookahead window on the future side and
    /// the wider of the two sit-out buffers on the past side — the two-sided
    /// window §4.4 describes ("within ±3 days of an earnings event", "±1 day
    /// of a dividend ex-date"). Deduplicated so the event nearest `today` per
    /// (symbol, type) wins, sorted by distance from `today` ascending.
    /// `days_to_event` is signed: negative means the event already happened.
    fn upcoming_events(&self, symbol: &str, today: NaiveDate) -> Vec<(EventInfo, i64)> {
        let cutoff = today + chrono::Duration::days(self.config.lookahead_days);
        let earliest = today
            - chrono::Duration::days(self.config.earnings_buffer_days.max(self.config.dividend_buffer_days));

        let mut by_type: std::collections::HashMap<EventType, EventInfo> = std::collections::HashMap::new();
        for event in &self.calendar {
            if event.symbol != symbol {
                continue;
            }
            if event.date < earliest || event.date > cutoff {
                continue;
            }
            by_type
                .entry(event.event_type)
                .and_modify(|existing| {
                    let existing_distance = (existing.date - today).num_days().abs();
                    let candidate_distance = (event.date - today).num_days().abs();
                    if candidate_distance < existing_distance {
                        *existing = event.clone();
                    }
                })
                .or_insert_with(|| event.clone());
        }

        let mut events: Vec<(EventInfo, i64)> = by_type
            .into_values()
            .map(|e| {
                let days = (e.date - today).num_days();
                (e, days)
            })
            .collect();
        events.sort_by_key(|(_, days)| days.abs());
        events
    }

    async fn vol_spike(&self, symbol: &str) -> bool {
        let series = match self.ohlcv.history(symbol, Period::Mo3, Interval::D1).await {
            Ok(s) => s,
            Err(_) => return false,
        };
        let closes = series.closes();
        if closes.len() < 31 {
            return false;
        }
        let short = &closes[closes.len() - 10..];
        let long = &closes[closes.len() - 30..];
        let vol_10d = math::annualized_volatility(short);
        let vol_30d = math::annualized_volatility(long);
        if vol_30d <= 0.0 {
            return false;
        }
        vol_10d > self.config.vol_spike_multiplier * vol_30d
    }

    async fn hedge_beta(&self, symbol: &str) -> Option<f64> {
        let series = self.ohlcv.history(symbol, Period::Mo3, Interval::D1).await.ok()?;
        let index = self.ohlcv.history(BETA_PROXY_SYMBOL, Period::Mo3, Interval::D1).await.ok()?;

        let asset_closes = series.closes();
        let index_closes = index.closes();
        if asset_closes.len() < HEDGE_BETA_WINDOW_DAYS + 1 || index_closes.len() < HEDGE_BETA_WINDOW_DAYS + 1 {
            return None;
        }
        let asset_window = &asset_closes[asset_closes.len() - (HEDGE_BETA_WINDOW_DAYS + 1)..];
        let index_window = &index_closes[index_closes.len() - (HEDGE_BETA_WINDOW_DAYS + 1)..];
        let asset_returns = math::returns(asset_window);
        let index_returns = math::returns(index_window);
        Some(math::beta(&asset_returns, &index_returns))
    }

    fn risk_band(risk_score: f64) -> &'static str {
        if risk_score >= 0.80 {
            "critical"
        } else if risk_score >= 0.50 {
            "elevated"
        } else if risk_score >= 0.25 {
            "moderate"
        } else {
            "low"
        }
    }

    fn haircut_for(&self, risk_score: f64) -> f64 {
        if risk_score >= 0.80 {
            self.config.haircut_max
        } else if risk_score >= 0.50 {
            0.45
        } else if risk_score >= 0.25 {
            0.20
        } else {
            0.0
        }
    }

    fn warning_message(
        symbol: &str,
        primary: Option<&(EventInfo, i64)>,
        risk_score: f64,
    ) -> String {
        let severity = Self::risk_band(risk_score);
        match primary {
            Some((event, days)) => format!(
                "{symbol}: {} in {days} day(s), risk {severity} ({risk_score:.2})",
                event.event_type.as_str()
            ),
            None => format!("{symbol}: no known events, risk {severity} ({risk_score:.2})"),
        }
    }

    /// Per spec.md §4.4: event detection, sentiment/vol-spike scoring, haircut
    /// and sit-out mapping, hedge-beta guidance. Never fails the pipeline —
    /// a sentiment-provider outage just zeroes that component.
    pub async fn assess(&self, symbol: &str, today: NaiveDate) -> GuardResult {
        let events = self.upcoming_events(symbol, today);
        let has_upcoming_event = !events.is_empty();
        let primary = events.first();

        let snapshot = self.sentiment.sentiment(symbol, SENTIMENT_WINDOW_HOURS).await;
        let avg_sentiment_72h = sentiment_provider::trailing_average_compound(
            &snapshot.articles,
            SENTIMENT_WINDOW_HOURS,
        );

        let vol_spike = self.vol_spike(symbol).await;

        let mut risk_score = 0.0;
        if has_upcoming_event {
            risk_score += 0.45;
            if primary.map(|(e, _)| e.event_type.is_high_impact()).unwrap_or(false) {
                risk_score += 0.20;
            }
        }
        if avg_sentiment_72h.map(|s| s < self.config.neg_sentiment_threshold).unwrap_or(false) {
            risk_score += 0.25;
        }
        if vol_spike {
            risk_score += 0.15;
        }
        risk_score = math::clamp(risk_score, 0.0, 1.0);

        let weight_haircut = self.haircut_for(risk_score);

        let earnings_sitout = events.iter().any(|(e, days)| {
            e.event_type == EventType::Earnings && days.abs() <= self.config.earnings_buffer_days
        });
        let dividend_sitout = events.iter().any(|(e, days)| {
            e.event_type == EventType::Dividend && days.abs() <= self.config.dividend_buffer_days
        });
        let skip_trading = risk_score >= 0.80 || earnings_sitout || dividend_sitout;

        let suggested_hedge_beta = self.hedge_beta(symbol).await;
        let warning_message = Self::warning_message(symbol, primary, risk_score);

        GuardResult {
            has_upcoming_event,
            days_to_event: primary.map(|(_, d)| *d),
            event_type: primary.map(|(e, _)| e.event_type),
            avg_sentiment_72h,
            vol_spike,
            risk_score,
            weight_haircut,
            skip_trading,
            suggested_hedge_beta,
            warning_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use nightscreen_core::{Bar, EventSourceKind, NightscreenError, OhlcvSeries, SentimentSnapshot};
    use std::collections::HashMap;

    struct FakeOhlcv {
        series_by_symbol: HashMap<String, OhlcvSeries>,
    }

    fn flat_series(symbol: &str, n: usize, close: f64) -> OhlcvSeries {
        let bars = (0..n)
            .map(|i| Bar {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000_000.0,
            })
            .collect();
        OhlcvSeries {
            symbol: symbol.to_string(),
            period: Period::Mo3,
            interval: Interval::D1,
            bars,
        }
    }

    #[async_trait]
    impl OhlcvSource for FakeOhlcv {
        async fn history(
            &self,
            symbol: &str,
            _period: Period,
            _interval: Interval,
        ) -> Result<OhlcvSeries, NightscreenError> {
            self.series_by_symbol
                .get(symbol)
                .cloned()
                .ok_or_else(|| NightscreenError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: "missing fixture".to_string(),
                })
        }
    }

    struct NoSentiment;
    #[async_trait]
    impl SentimentSource for NoSentiment {
        async fn sentiment(&self, _symbol: &str, _lookback_hours: i64) -> SentimentSnapshot {
            SentimentSnapshot::empty()
        }
    }

    fn guard(events: Vec<EventInfo>) -> EventRiskGuard {
        let mut series = HashMap::new();
        series.insert("ANZ.AX".to_string(), flat_series("ANZ.AX", 90, 25.0));
        series.insert("NAB.AX".to_string(), flat_series("NAB.AX", 90, 30.0));
        series.insert("CSL.AX".to_string(), flat_series("CSL.AX", 90, 280.0));
        series.insert(BETA_PROXY_SYMBOL.to_string(), flat_series(BETA_PROXY_SYMBOL, 90, 7000.0));

        EventRiskGuard::new(
            events,
            Arc::new(FakeOhlcv { series_by_symbol: series }),
            Arc::new(NoSentiment),
            EventGuardConfig::default(),
        )
    }

    fn event(symbol: &str, event_type: EventType, days_ahead: i64, today: NaiveDate) -> EventInfo {
        EventInfo {
            symbol: symbol.to_string(),
            event_type,
            date: today + chrono::Duration::days(days_ahead),
            source: EventSourceKind::CalendarCsv,
            title: None,
            url: None,
        }
    }

    #[tokio::test]
    async fn clean_candidate_has_low_risk_and_no_haircut() {
        let today = market_today();
        let guard = guard(vec![]);
        let result = guard.assess("CSL.AX", today).await;
        assert!(!result.has_upcoming_event);
        assert!(result.risk_score < 0.25);
        assert_eq!(result.weight_haircut, 0.0);
        assert!(!result.skip_trading);
    }

    #[tokio::test]
    async fn earnings_within_buffer_forces_skip_trading() {
        let today = market_today();
        let guard = guard(vec![event("ANZ.AX", EventType::Earnings, 2, today)]);
        let result = guard.assess("ANZ.AX", today).await;
        assert_eq!(result.days_to_event, Some(2));
        assert!((result.risk_score - 0.65).abs() < 1e-9);
        assert_eq!(result.weight_haircut, 0.45);
        assert!(result.skip_trading);
    }

    #[tokio::test]
    async fn regulatory_outside_buffer_does_not_force_skip() {
        let today = market_today();
        let guard = guard(vec![event("NAB.AX", EventType::BaselIii, 5, today)]);
        let result = guard.assess("NAB.AX", today).await;
        assert_eq!(result.event_type, Some(EventType::BaselIii));
        assert!((result.risk_score - 0.65).abs() < 1e-9);
        assert_eq!(result.weight_haircut, 0.45);
        assert!(!result.skip_trading);
    }

    #[tokio::test]
    async fn recent_past_earnings_still_forces_skip_trading() {
        let today = market_today();
        let guard = guard(vec![event("ANZ.AX", EventType::Earnings, -2, today)]);
        let result = guard.assess("ANZ.AX", today).await;
        assert_eq!(result.days_to_event, Some(-2));
        assert!((result.risk_score - 0.65).abs() < 1e-9);
        assert_eq!(result.weight_haircut, 0.45);
        assert!(result.skip_trading);
    }

    #[tokio::test]
    async fn event_outside_lookahead_window_is_ignored() {
        let today = market_today();
        let guard = guard(vec![event("ANZ.AX", EventType::Earnings, 8, today)]);
        let result = guard.assess("ANZ.AX", today).await;
        assert!(!result.has_upcoming_event);
        assert_eq!(result.risk_score, 0.0);
    }
}
