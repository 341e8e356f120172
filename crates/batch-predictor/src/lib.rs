pub mod ensemble;
pub mod indicators;
pub mod models;

use std::sync::Arc;

use nightscreen_core::{
    math, Candidate, GuardResult, Interval, ModelName, ModelPredictor, OhlcvSource, Period,
    Prediction, PredictionContext, SentimentSource,
};
use tracing::warn;

pub use ensemble::EnsembleWeights;
pub use models::{FileLstmModelStore, LstmModel, LstmModelStore, SentimentModel, TechnicalConsensusModel, TrendModel};

/// Produces one Prediction per Candidate by running the 4-model registry
/// and aggregating. A registry (`Vec<Box<dyn ModelPredictor>>`), not an
/// inheritance hierarchy — matches spec.md §9 and the teacher's own
/// dynamic-dispatch trait-object style.
pub struct BatchPredictor {
    ohlcv: Arc<dyn OhlcvSource>,
    sentiment: Arc<dyn SentimentSource>,
    models: Vec<Box<dyn ModelPredictor>>,
    market_sentiment_score: f64,
    weights: EnsembleWeights,
}

impl BatchPredictor {
    pub fn new(
        ohlcv: Arc<dyn OhlcvSource>,
        sentiment: Arc<dyn SentimentSource>,
        models: Vec<Box<dyn ModelPredictor>>,
        market_sentiment_score: f64,
    ) -> Self {
        Self::with_weights(ohlcv, sentiment, models, market_sentiment_score, EnsembleWeights::default())
    }

    pub fn with_weights(
        ohlcv: Arc<dyn OhlcvSource>,
        sentiment: Arc<dyn SentimentSource>,
        models: Vec<Box<dyn ModelPredictor>>,
        market_sentiment_score: f64,
        weights: EnsembleWeights,
    ) -> Self {
        Self {
            ohlcv,
            sentiment,
            models,
            market_sentiment_score,
            weights,
        }
    }

    /// Emits no Prediction when OHLCV is missing for the candidate (the
    /// candidate is dropped, per spec.md §4.5 failure semantics) or when
    /// every registered model declines to vote.
    pub async fn predict(&self, candidate: &Candidate, guard: &GuardResult) -> Option<Prediction> {
        let series = match self.ohlcv.history(&candidate.symbol, Period::Y1, Interval::D1).await {
            Ok(s) => s,
            Err(e) => {
                warn!(symbol = candidate.symbol, error = %e, "batch predictor: no OHLCV, dropping candidate");
                return None;
            }
        };

        let sentiment = self.sentiment.sentiment(&candidate.symbol, 72).await;
        let ctx = PredictionContext {
            symbol: candidate.symbol.clone(),
            series: series.clone(),
            sentiment,
            market_sentiment_score: self.market_sentiment_score,
        };

        let mut votes = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let vote = model.predict(&ctx).await;
            if vote.is_none() {
                warn!(
                    symbol = candidate.symbol,
                    model = model.name().as_str(),
                    "model declined to vote"
                );
            }
            votes.push((model.name(), vote));
        }

        if votes.iter().all(|(_, v)| v.is_none()) {
            warn!(symbol = candidate.symbol, "all models declined, no prediction");
            return None;
        }

        let volume_ratio = volume_ratio_20d(&series);
        Some(ensemble::aggregate(&votes, volume_ratio, guard, &self.weights))
    }

    /// Default 4-model registry per spec.md §4.5.
    pub fn default_models(lstm_dir: impl Into<std::path::PathBuf>) -> Vec<Box<dyn ModelPredictor>> {
        vec![
            Box::new(LstmModel::new(Box::new(FileLstmModelStore::new(lstm_dir)))),
            Box::new(TrendModel),
            Box::new(TechnicalConsensusModel),
            Box::new(SentimentModel),
        ]
    }
}

fn volume_ratio_20d(series: &nightscreen_core::OhlcvSeries) -> f64 {
    let bars = &series.bars;
    if bars.len() < 21 {
        return 1.0;
    }
    let latest = bars.last().map(|b| b.volume).unwrap_or(0.0);
    let window: Vec<f64> = bars[bars.len() - 21..bars.len() - 1].iter().map(|b| b.volume).collect();
    let avg = math::mean(&window);
    if avg <= 0.0 {
        1.0
    } else {
        latest / avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use nightscreen_core::{Bar, NightscreenError, OhlcvSeries, Sector, SentimentSnapshot};

    struct FixedSeries(OhlcvSeries);

    #[async_trait]
    impl OhlcvSource for FixedSeries {
        async fn history(
            &self,
            _symbol: &str,
            _period: Period,
            _interval: Interval,
        ) -> Result<OhlcvSeries, NightscreenError> {
            Ok(self.0.clone())
        }
    }

    struct Missing;
    #[async_trait]
    impl OhlcvSource for Missing {
        async fn history(
            &self,
            symbol: &str,
            _period: Period,
            _interval: Interval,
        ) -> Result<OhlcvSeries, NightscreenError> {
            Err(NightscreenError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no data".to_string(),
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

    fn candidate() -> Candidate {
        Candidate {
            symbol: "TST.AX".to_string(),
            sector: Sector::Financials,
            name: "Test".to_string(),
            price: 10.0,
            avg_volume: 1_000_000,
            volatility: 0.2,
            beta: 1.0,
            screening_score: 70.0,
        }
    }

    fn rising_series(n: usize) -> OhlcvSeries {
        let bars = (0..n)
            .map(|i| Bar {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
                open: 10.0 + i as f64 * 0.05,
                high: 10.0 + i as f64 * 0.05 + 0.1,
                low: 10.0 + i as f64 * 0.05 - 0.1,
                close: 10.0 + i as f64 * 0.05,
                volume: 1_000_000.0,
            })
            .collect();
        OhlcvSeries {
            symbol: "TST.AX".to_string(),
            period: Period::Y1,
            interval: Interval::D1,
            bars,
        }
    }

    #[tokio::test]
    async fn missing_ohlcv_drops_the_candidate() {
        let predictor = BatchPredictor::new(
            Arc::new(Missing),
            Arc::new(NoSentiment),
            vec![Box::new(TrendModel)],
            50.0,
        );
        let guard = GuardResult::clean("TST.AX");
        let result = predictor.predict(&candidate(), &guard).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn prediction_confidence_stays_in_bounds() {
        let predictor = BatchPredictor::new(
            Arc::new(FixedSeries(rising_series(250))),
            Arc::new(NoSentiment),
            vec![Box::new(TrendModel), Box::new(TechnicalConsensusModel)],
            50.0,
        );
        let guard = GuardResult::clean("TST.AX");
        let prediction = predictor.predict(&candidate(), &guard).await.unwrap();
        assert!(prediction.final_confidence >= 50.0 && prediction.final_confidence <= 95.0);
    }
}
