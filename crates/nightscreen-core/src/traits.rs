use async_trait::async_trait;

use crate::error::NightscreenError;
use crate::types::{
    EventInfo, Interval, ModelVote, OhlcvSeries, Period, SentimentSnapshot,
};

/// Source of OHLCV history. Deliberately has no method that touches a
/// metadata/company-details endpoint: the provider this pipeline runs
/// against blocks on those, so the capability is never exposed rather
/// than merely unused.
#[async_trait]
pub trait OhlcvSource: Send + Sync {
    async fn history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<OhlcvSeries, NightscreenError>;
}

/// Source of upcoming corporate/regulatory events for a symbol.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn upcoming_events(&self, symbol: &str) -> Result<Vec<EventInfo>, NightscreenError>;
}

/// Source of recent-news sentiment for a symbol.
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn sentiment(&self, symbol: &str, lookback_hours: i64) -> SentimentSnapshot;
}

/// Everything a model needs to cast a vote. Assembled once per candidate
/// by batch-predictor and handed to every registered predictor.
#[derive(Debug, Clone)]
pub struct PredictionContext {
    pub symbol: String,
    pub series: OhlcvSeries,
    pub sentiment: SentimentSnapshot,
    pub market_sentiment_score: f64,
}

/// A single ensemble member. Absence of an opinion (`None`) is a normal,
/// expected outcome (no trained model, not enough bars, no articles) and
/// must never be represented as an `Err`: the ensemble renormalizes
/// weights around it rather than failing the candidate.
#[async_trait]
pub trait ModelPredictor: Send + Sync {
    fn name(&self) -> crate::types::ModelName;

    async fn predict(&self, ctx: &PredictionContext) -> Option<ModelVote>;
}
