use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Lookback period for a history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    D1,
    D5,
    Mo1,
    Mo3,
    Mo6,
    Y1,
    Y2,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::D1 => "1d",
            Period::D5 => "5d",
            Period::Mo1 => "1mo",
            Period::Mo3 => "3mo",
            Period::Mo6 => "6mo",
            Period::Y1 => "1y",
            Period::Y2 => "2y",
        }
    }
}

/// Bar interval for a history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    M1,
    M5,
    M15,
    M30,
    H1,
    D1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::D1 => "1d",
        }
    }
}

/// An ordered, deduplicated bar series for one symbol/period/interval.
/// Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcvSeries {
    pub symbol: String,
    pub period: Period,
    pub interval: Interval,
    pub bars: Vec<Bar>,
}

impl OhlcvSeries {
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// ASX GICS-derived sector grouping. Fixed at 8 per the screening universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sector {
    Financials,
    Materials,
    Energy,
    Healthcare,
    ConsumerDiscretionary,
    Industrials,
    RealEstate,
    Utilities,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Financials => "Financials",
            Sector::Materials => "Materials",
            Sector::Energy => "Energy",
            Sector::Healthcare => "Healthcare",
            Sector::ConsumerDiscretionary => "Consumer Discretionary",
            Sector::Industrials => "Industrials",
            Sector::RealEstate => "Real Estate",
            Sector::Utilities => "Utilities",
        }
    }

    pub fn all() -> [Sector; 8] {
        [
            Sector::Financials,
            Sector::Materials,
            Sector::Energy,
            Sector::Healthcare,
            Sector::ConsumerDiscretionary,
            Sector::Industrials,
            Sector::RealEstate,
            Sector::Utilities,
        ]
    }

    pub fn from_config_key(key: &str) -> Option<Sector> {
        match key {
            "Financials" => Some(Sector::Financials),
            "Materials" => Some(Sector::Materials),
            "Energy" => Some(Sector::Energy),
            "Healthcare" => Some(Sector::Healthcare),
            "Consumer Discretionary" => Some(Sector::ConsumerDiscretionary),
            "Industrials" => Some(Sector::Industrials),
            "Real Estate" => Some(Sector::RealEstate),
            "Utilities" => Some(Sector::Utilities),
            _ => None,
        }
    }
}

/// A screened stock, immutable once produced by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub sector: Sector,
    pub name: String,
    pub price: f64,
    pub avg_volume: u64,
    pub volatility: f64,
    pub beta: f64,
    pub screening_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapDirection {
    Up,
    Flat,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapConfidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallSentiment {
    Bullish,
    Neutral,
    Bearish,
}

/// Overnight market bias, built once at the start of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSentiment {
    pub spi_change_pct: f64,
    pub sp500_change_pct: Option<f64>,
    pub nasdaq_change_pct: Option<f64>,
    pub dow_change_pct: Option<f64>,
    pub gap_direction: GapDirection,
    pub gap_confidence: GapConfidence,
    pub overall_sentiment: OverallSentiment,
    pub sentiment_score: f64,
}

impl Default for MarketSentiment {
    /// Degraded default used when every index fails to fetch.
    fn default() -> Self {
        Self {
            spi_change_pct: 0.0,
            sp500_change_pct: None,
            nasdaq_change_pct: None,
            dow_change_pct: None,
            gap_direction: GapDirection::Flat,
            gap_confidence: GapConfidence::Low,
            overall_sentiment: OverallSentiment::Neutral,
            sentiment_score: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Earnings,
    Dividend,
    BaselIii,
    Regulatory,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Earnings => "earnings",
            EventType::Dividend => "dividend",
            EventType::BaselIii => "basel_iii",
            EventType::Regulatory => "regulatory",
        }
    }

    pub fn from_str(s: &str) -> Option<EventType> {
        match s {
            "earnings" => Some(EventType::Earnings),
            "dividend" => Some(EventType::Dividend),
            "basel_iii" => Some(EventType::BaselIii),
            "regulatory" => Some(EventType::Regulatory),
            _ => None,
        }
    }

    pub fn is_high_impact(&self) -> bool {
        matches!(self, EventType::Earnings | EventType::BaselIii | EventType::Regulatory)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSourceKind {
    CalendarCsv,
    ProviderApi,
}

/// A known upcoming corporate/regulatory event, timezone-normalized at ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    pub symbol: String,
    pub event_type: EventType,
    /// Market-timezone (Australia/Sydney) date of the event.
    pub date: NaiveDate,
    pub source: EventSourceKind,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Event-risk annotation for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardResult {
    pub has_upcoming_event: bool,
    pub days_to_event: Option<i64>,
    pub event_type: Option<EventType>,
    pub avg_sentiment_72h: Option<f64>,
    pub vol_spike: bool,
    pub risk_score: f64,
    pub weight_haircut: f64,
    pub skip_trading: bool,
    pub suggested_hedge_beta: Option<f64>,
    pub warning_message: String,
}

impl GuardResult {
    /// The "no event, benign sentiment/vol" baseline per the spec's invariant:
    /// has_upcoming_event=false, sentiment non-negative, no vol spike => risk<0.25, haircut=0.
    pub fn clean(symbol: &str) -> Self {
        GuardResult {
            has_upcoming_event: false,
            days_to_event: None,
            event_type: None,
            avg_sentiment_72h: None,
            vol_spike: false,
            risk_score: 0.0,
            weight_haircut: 0.0,
            skip_trading: false,
            suggested_hedge_beta: None,
            warning_message: format!("{symbol}: no known events, no elevated risk"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelName {
    Lstm,
    Trend,
    Technical,
    Sentiment,
}

impl ModelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::Lstm => "lstm",
            ModelName::Trend => "trend",
            ModelName::Technical => "technical",
            ModelName::Sentiment => "sentiment",
        }
    }
}

/// One model's vote, before weighting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelVote {
    pub direction: Direction,
    /// 0.0-1.0
    pub confidence: f64,
}

/// A model's contribution after weight assignment, kept on the Prediction for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelContribution {
    pub model: ModelName,
    pub direction: Direction,
    pub confidence: f64,
    pub weight: f64,
}

/// Per-candidate ensemble output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub direction: Direction,
    pub confidence: f64,
    pub expected_change_pct: f64,
    pub contributions: Vec<ModelContribution>,
    pub volume_adjustment: f64,
    pub event_adjustment: f64,
    pub final_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    APlus,
    A,
    BPlus,
    B,
    C,
}

impl Rating {
    pub fn from_score(score: f64) -> Rating {
        if score >= 85.0 {
            Rating::APlus
        } else if score >= 75.0 {
            Rating::A
        } else if score >= 65.0 {
            Rating::BPlus
        } else if score >= 55.0 {
            Rating::B
        } else {
            Rating::C
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::APlus => "A+",
            Rating::A => "A",
            Rating::BPlus => "B+",
            Rating::B => "B",
            Rating::C => "C",
        }
    }
}

/// A ranked report row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub score: f64,
    pub rating: Rating,
    pub candidate: Candidate,
    pub prediction: Prediction,
    pub guard: GuardResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Config,
    SpiSentiment,
    Scan,
    EventRisk,
    Prediction,
    Scoring,
    Emit,
    Notify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Config => "config",
            Phase::SpiSentiment => "spi_sentiment",
            Phase::Scan => "scan",
            Phase::EventRisk => "event_risk",
            Phase::Prediction => "prediction",
            Phase::Scoring => "scoring",
            Phase::Emit => "emit",
            Phase::Notify => "notify",
        }
    }

    pub fn all() -> [Phase; 8] {
        [
            Phase::Config,
            Phase::SpiSentiment,
            Phase::Scan,
            Phase::EventRisk,
            Phase::Prediction,
            Phase::Scoring,
            Phase::Emit,
            Phase::Notify,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCounts {
    pub universe_size: usize,
    pub candidates_found: usize,
    pub predictions_made: usize,
    pub skipped_event_risk: usize,
    pub opportunities_ranked: usize,
}

/// Process-wide pipeline state, persisted after each phase. Written only by
/// the orchestrator; every other hand-off in the pipeline is an immutable
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: NaiveDate,
    pub phases: BTreeMap<Phase, PhaseStatus>,
    pub counts: RunCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
}

impl RunState {
    pub fn new(run_id: NaiveDate) -> Self {
        let mut phases = BTreeMap::new();
        for phase in Phase::all() {
            phases.insert(phase, PhaseStatus::Pending);
        }
        Self {
            run_id,
            phases,
            counts: RunCounts::default(),
            started_at: Utc::now(),
            finished_at: None,
            warnings: Vec::new(),
        }
    }

    pub fn set_phase(&mut self, phase: Phase, status: PhaseStatus) {
        self.phases.insert(phase, status);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// A news article as consumed/produced by the sentiment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub source: String,
    pub ts: DateTime<Utc>,
    pub score: f64,
}

/// Sentiment snapshot for one symbol over a trailing window. Never
/// fabricated: an empty/error result is `article_count: 0, compound: 0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub article_count: usize,
    pub articles: Vec<NewsArticle>,
}

impl SentimentSnapshot {
    pub fn empty() -> Self {
        Self {
            compound: 0.0,
            positive: 0.0,
            negative: 0.0,
            neutral: 1.0,
            article_count: 0,
            articles: Vec::new(),
        }
    }
}
