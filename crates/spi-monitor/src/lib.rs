use std::sync::Arc;

use nightscreen_core::{
    GapConfidence, GapDirection, Interval, MarketSentiment, OhlcvSource, OverallSentiment, Period,
};
use tracing::warn;

const SPI_SYMBOL: &str = "SPI.AX";
const SP500_SYMBOL: &str = "^GSPC";
const NASDAQ_SYMBOL: &str = "^IXIC";
const DOW_SYMBOL: &str = "^DJI";
const LOOKBACK_BARS: usize = 10;

/// Produces the run's overnight `MarketSentiment` snapshot from index and
/// futures data. Degrades gracefully: any index that fails to fetch just
/// drops out of the sentiment_score average rather than failing the run.
pub struct SpiMonitor {
    source: Arc<dyn OhlcvSource>,
}

impl SpiMonitor {
    pub fn new(source: Arc<dyn OhlcvSource>) -> Self {
        Self { source }
    }

    async fn change_pct(&self, symbol: &str) -> Option<f64> {
        match self.source.history(symbol, Period::D5, Interval::H1).await {
            Ok(series) => change_pct_from_bars(&series.closes()),
            Err(e) => {
                warn!(symbol, error = %e, "index fetch failed, dropping from sentiment calc");
                None
            }
        }
    }

    pub async fn assess(&self) -> MarketSentiment {
        let spi = self.change_pct(SPI_SYMBOL).await;
        let sp500 = self.change_pct(SP500_SYMBOL).await;
        let nasdaq = self.change_pct(NASDAQ_SYMBOL).await;
        let dow = self.change_pct(DOW_SYMBOL).await;

        let components: Vec<f64> = [spi, sp500, nasdaq, dow].into_iter().flatten().collect();
        if components.is_empty() {
            return MarketSentiment::default();
        }

        let spi_change_pct = spi.unwrap_or(0.0);
        let predicted_gap = spi_change_pct * 0.85;

        let gap_direction = if predicted_gap > 0.30 {
            GapDirection::Up
        } else if predicted_gap < -0.30 {
            GapDirection::Down
        } else {
            GapDirection::Flat
        };
        let gap_confidence = if spi.is_none() {
            GapConfidence::Low
        } else if predicted_gap.abs() > 0.30 {
            GapConfidence::High
        } else {
            GapConfidence::Medium
        };

        let overall_sentiment = match (sp500, nasdaq) {
            (Some(s), Some(n)) if s > 0.5 && n > 0.5 => OverallSentiment::Bullish,
            (Some(s), Some(n)) if s < -0.5 && n < -0.5 => OverallSentiment::Bearish,
            _ => OverallSentiment::Neutral,
        };

        let positive = components.iter().filter(|c| **c > 0.0).count() as f64;
        let negative = components.iter().filter(|c| **c < 0.0).count() as f64;
        let sentiment_score = (50.0 + 10.0 * (positive - negative)).clamp(0.0, 100.0);

        MarketSentiment {
            spi_change_pct,
            sp500_change_pct: sp500,
            nasdaq_change_pct: nasdaq,
            dow_change_pct: dow,
            gap_direction,
            gap_confidence,
            overall_sentiment,
            sentiment_score,
        }
    }
}

fn change_pct_from_bars(closes: &[f64]) -> Option<f64> {
    if closes.len() <= LOOKBACK_BARS {
        return None;
    }
    let latest = *closes.last()?;
    let prior = closes[closes.len() - 1 - LOOKBACK_BARS];
    if prior == 0.0 {
        return None;
    }
    Some(((latest - prior) / prior) * 100.0)
}
