use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nightscreen_core::{Direction, ModelName, ModelVote};
use serde::Deserialize;

use crate::indicators;
use nightscreen_core::traits::{ModelPredictor, PredictionContext};

/// Pre-baked LSTM inference artifact for one symbol. Training is out of
/// scope for this pipeline; this is the already-trained model's output,
/// refreshed by an offline job and simply read here.
#[derive(Debug, Clone, Deserialize)]
pub struct LstmWeights {
    pub expected_return_pct: f64,
    pub confidence: f64,
}

/// Looks up a per-symbol pretrained model. Absence is a normal outcome
/// (`None`), mirroring the ml-client workspace's `ModelNotLoaded` path,
/// reshaped here to `Option` since the spec treats model-absent as
/// non-error (§9).
pub trait LstmModelStore: Send + Sync {
    fn load(&self, symbol: &str) -> Option<LstmWeights>;
}

pub struct FileLstmModelStore {
    dir: PathBuf,
}

impl FileLstmModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LstmModelStore for FileLstmModelStore {
    fn load(&self, symbol: &str) -> Option<LstmWeights> {
        let path: PathBuf = Path::new(&self.dir).join(format!("{symbol}.lstm.json"));
        let raw = std::fs::read_to_string(&path).ok()?;
        serde_json::from_str(&raw).ok()
    }
}

pub struct LstmModel {
    store: Box<dyn LstmModelStore>,
}

impl LstmModel {
    pub fn new(store: Box<dyn LstmModelStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ModelPredictor for LstmModel {
    fn name(&self) -> ModelName {
        ModelName::Lstm
    }

    async fn predict(&self, ctx: &PredictionContext) -> Option<ModelVote> {
        let weights = self.store.load(&ctx.symbol)?;
        let direction = if weights.expected_return_pct > 0.1 {
            Direction::Buy
        } else if weights.expected_return_pct < -0.1 {
            Direction::Sell
        } else {
            Direction::Hold
        };
        Some(ModelVote {
            direction,
            confidence: weights.confidence.clamp(0.5, 0.95),
        })
    }
}

/// Rule-based trend model: SMA slopes, last-close-vs-SMA position, 12/26
/// EMA crossover, recent higher-highs/lower-lows. Grounded on the
/// technical-analysis workspace's Golden/Death Cross and trend-detection
/// signals.
pub struct TrendModel;

#[async_trait]
impl ModelPredictor for TrendModel {
    fn name(&self) -> ModelName {
        ModelName::Trend
    }

    async fn predict(&self, ctx: &PredictionContext) -> Option<ModelVote> {
        let closes = ctx.series.closes();
        if closes.len() < 60 {
            return None;
        }

        let mut votes: Vec<(i32, bool)> = Vec::new();

        let sma20 = indicators::sma(&closes, 20);
        let sma50 = indicators::sma(&closes, 50);
        let sma200 = indicators::sma(&closes, 200);

        if sma20.len() >= 2 {
            votes.push((1, *sma20.last().unwrap() > sma20[sma20.len() - 2]));
        }
        if sma50.len() >= 2 {
            votes.push((1, *sma50.last().unwrap() > sma50[sma50.len() - 2]));
        }
        if sma200.len() >= 2 {
            votes.push((1, *sma200.last().unwrap() > sma200[sma200.len() - 2]));
        }

        let last_close = *closes.last().unwrap();
        if let Some(&last_sma20) = sma20.last() {
            votes.push((2, last_close > last_sma20));
        }

        let ema12 = indicators::ema(&closes, 12);
        let ema26 = indicators::ema(&closes, 26);
        if ema12.len() >= 2 && ema26.len() >= 2 {
            let last_12 = *ema12.last().unwrap();
            let last_26 = *ema26.last().unwrap();
            votes.push((2, last_12 > last_26));
        }

        let recent = &closes[closes.len() - 20.min(closes.len())..];
        if recent.len() >= 3 {
            let higher_highs = recent.windows(2).filter(|w| w[1] > w[0]).count();
            let lower_lows = recent.windows(2).filter(|w| w[1] < w[0]).count();
            votes.push((1, higher_highs > lower_lows));
        }

        if votes.is_empty() {
            return None;
        }

        let total_weight: i32 = votes.iter().map(|(w, _)| w).sum();
        let bullish_weight: i32 = votes.iter().filter(|(_, b)| *b).map(|(w, _)| w).sum();
        let bearish_weight = total_weight - bullish_weight;

        let direction = if bullish_weight > bearish_weight {
            Direction::Buy
        } else if bearish_weight > bullish_weight {
            Direction::Sell
        } else {
            Direction::Hold
        };

        let agreement = bullish_weight.max(bearish_weight) as f64 / total_weight as f64;
        let confidence = (0.5 + agreement * 0.4).clamp(0.5, 0.9);

        Some(ModelVote { direction, confidence })
    }
}

/// Vote-accumulation technical consensus: RSI(14), MACD(12,26,9),
/// Bollinger(20,2), Stochastic(14,3), ADX(14), ATR(14) vs its 20-period
/// average, each casting one BUY/SELL/HOLD vote on textbook thresholds.
/// Grounded on the
/// technical-analysis workspace's `Vec<(&str, i32, bool)>` pattern,
/// re-thresholded to fixed textbook values per the spec rather than that
/// workspace's adaptive percentile bands.
pub struct TechnicalConsensusModel;

#[async_trait]
impl ModelPredictor for TechnicalConsensusModel {
    fn name(&self) -> ModelName {
        ModelName::Technical
    }

    async fn predict(&self, ctx: &PredictionContext) -> Option<ModelVote> {
        let closes = ctx.series.closes();
        if closes.len() < 50 {
            return None;
        }
        let bars = &ctx.series.bars;

        let mut bull_votes = 0usize;
        let mut bear_votes = 0usize;
        let mut total_votes = 0usize;

        let rsi = indicators::rsi(&closes, 14);
        if let Some(&last) = rsi.last() {
            total_votes += 1;
            if last < 30.0 {
                bull_votes += 1;
            } else if last > 70.0 {
                bear_votes += 1;
            }
        }

        let macd = indicators::macd(&closes, 12, 26, 9);
        if macd.histogram.len() >= 2 {
            total_votes += 1;
            let last = *macd.histogram.last().unwrap();
            let prev = macd.histogram[macd.histogram.len() - 2];
            if last > 0.0 && prev <= 0.0 {
                bull_votes += 1;
            } else if last < 0.0 && prev >= 0.0 {
                bear_votes += 1;
            }
        }

        let bb = indicators::bollinger_bands(&closes, 20, 2.0);
        if !bb.upper.is_empty() {
            total_votes += 1;
            let last_close = *closes.last().unwrap();
            if last_close < *bb.lower.last().unwrap() {
                bull_votes += 1;
            } else if last_close > *bb.upper.last().unwrap() {
                bear_votes += 1;
            }
        }

        let stoch = indicators::stochastic(bars, 14, 3);
        if let Some(&last_k) = stoch.k.last() {
            total_votes += 1;
            if last_k < 20.0 {
                bull_votes += 1;
            } else if last_k > 80.0 {
                bear_votes += 1;
            }
        }

        let adx = indicators::adx(bars, 14);
        if let Some(&last_adx) = adx.adx.last() {
            if last_adx > 25.0 {
                total_votes += 1;
                let last_pdi = adx.plus_di.last().copied().unwrap_or(0.0);
                let last_mdi = adx.minus_di.last().copied().unwrap_or(0.0);
                if last_pdi > last_mdi {
                    bull_votes += 1;
                } else {
                    bear_votes += 1;
                }
            }
        }

        let atr_values = indicators::atr(bars, 14);
        let atr_sma = indicators::sma(&atr_values, 20);
        if let (Some(&last_atr), Some(&last_atr_sma)) = (atr_values.last(), atr_sma.last()) {
            if last_atr_sma > 0.0 {
                let atr_ratio = last_atr / last_atr_sma;
                total_votes += 1;
                if atr_ratio > 1.5 {
                    bear_votes += 1;
                } else if atr_ratio < 0.6 {
                    bull_votes += 1;
                }
            }
        }

        if total_votes == 0 {
            return None;
        }

        let direction = if bull_votes > bear_votes {
            Direction::Buy
        } else if bear_votes > bull_votes {
            Direction::Sell
        } else {
            Direction::Hold
        };
        let confidence = bull_votes.max(bear_votes) as f64 / total_votes as f64;

        Some(ModelVote { direction, confidence })
    }
}

/// Consumes the pre-computed sentiment snapshot on the prediction context.
/// Direction from the compound threshold, confidence capped by article
/// count per spec.md §4.5.
pub struct SentimentModel;

#[async_trait]
impl ModelPredictor for SentimentModel {
    fn name(&self) -> ModelName {
        ModelName::Sentiment
    }

    async fn predict(&self, ctx: &PredictionContext) -> Option<ModelVote> {
        let snapshot = &ctx.sentiment;
        if snapshot.article_count == 0 {
            return None;
        }

        let direction = if snapshot.compound > 0.30 {
            Direction::Buy
        } else if snapshot.compound < -0.30 {
            Direction::Sell
        } else {
            Direction::Hold
        };

        let cap = match snapshot.article_count {
            n if n >= 10 => 0.85,
            5..=9 => 0.80,
            1..=4 => 0.75,
            _ => 0.0,
        };

        let confidence = (snapshot.compound.abs() + 0.5).min(cap);

        Some(ModelVote { direction, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nightscreen_core::{Bar, Interval, OhlcvSeries, Period, SentimentSnapshot};

    fn series_of(closes: &[f64]) -> OhlcvSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
                open: *c,
                high: *c + 0.5,
                low: *c - 0.5,
                close: *c,
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

    fn ctx(closes: &[f64], sentiment: SentimentSnapshot) -> PredictionContext {
        PredictionContext {
            symbol: "TST.AX".to_string(),
            series: series_of(closes),
            sentiment,
            market_sentiment_score: 50.0,
        }
    }

    struct NoModels;
    impl LstmModelStore for NoModels {
        fn load(&self, _symbol: &str) -> Option<LstmWeights> {
            None
        }
    }

    #[tokio::test]
    async fn lstm_disabled_when_no_model_file() {
        let model = LstmModel::new(Box::new(NoModels));
        let vote = model.predict(&ctx(&[10.0; 200], SentimentSnapshot::empty())).await;
        assert!(vote.is_none());
    }

    #[tokio::test]
    async fn trend_model_bullish_on_steadily_rising_series() {
        let closes: Vec<f64> = (0..250).map(|i| 10.0 + i as f64 * 0.1).collect();
        let model = TrendModel;
        let vote = model.predict(&ctx(&closes, SentimentSnapshot::empty())).await.unwrap();
        assert_eq!(vote.direction, Direction::Buy);
    }

    #[tokio::test]
    async fn trend_model_fires_on_recently_listed_stock_with_only_60_bars() {
        let closes: Vec<f64> = (0..60).map(|i| 10.0 + i as f64 * 0.1).collect();
        let model = TrendModel;
        let vote = model.predict(&ctx(&closes, SentimentSnapshot::empty())).await;
        assert!(vote.is_some());
    }

    #[tokio::test]
    async fn technical_consensus_survives_a_volatility_spike_without_panicking() {
        let mut closes: Vec<f64> = vec![10.0; 40];
        for i in 0..20 {
            closes.push(10.0 + if i % 2 == 0 { 3.0 } else { -3.0 });
        }
        let model = TechnicalConsensusModel;
        let vote = model.predict(&ctx(&closes, SentimentSnapshot::empty())).await;
        assert!(vote.is_some());
    }

    #[tokio::test]
    async fn sentiment_model_disabled_with_zero_articles() {
        let model = SentimentModel;
        let vote = model.predict(&ctx(&[10.0; 60], SentimentSnapshot::empty())).await;
        assert!(vote.is_none());
    }

    #[tokio::test]
    async fn sentiment_model_caps_confidence_by_article_count() {
        let mut snapshot = SentimentSnapshot::empty();
        snapshot.article_count = 2;
        snapshot.compound = 0.9;
        let model = SentimentModel;
        let vote = model.predict(&ctx(&[10.0; 60], snapshot)).await.unwrap();
        assert!(vote.confidence <= 0.75);
        assert_eq!(vote.direction, Direction::Buy);
    }
}
