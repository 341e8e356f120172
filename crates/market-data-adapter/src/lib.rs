pub mod cache;
pub mod cooling;
pub mod provider;
pub mod rate_limiter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use nightscreen_core::{Bar, Interval, NightscreenError, OhlcvSeries, OhlcvSource, Period};
use tracing::warn;

use cache::SeriesCache;
use cooling::CoolingTracker;
use provider::{ChartEndpoint, ProviderError};
use rate_limiter::RateLimiter;

/// Symbols treated as index/futures data, which get the slower 1s
/// inter-request cadence instead of the per-symbol 500ms one.
const INDEX_SYMBOLS: &[&str] = &["SPI.AX", "^GSPC", "^IXIC", "^DJI", "^AXJO"];

fn is_index_symbol(symbol: &str) -> bool {
    INDEX_SYMBOLS.contains(&symbol)
}

/// The `adapter.*` / `scanner.max_workers` run-config knobs (spec.md §6),
/// with the defaults those options list. `Deserialize` so
/// `pipeline-orchestrator::RunConfig` can load overrides straight out of
/// the run's JSON config file; missing keys fall back to `Default`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub primary_delay_s: f64,
    pub index_delay_s: f64,
    pub timeout_s: u64,
    pub fallback_cooling_streak: u32,
    pub max_workers: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            primary_delay_s: 0.5,
            index_delay_s: 1.0,
            timeout_s: 15,
            fallback_cooling_streak: 3,
            max_workers: 2,
        }
    }
}

/// The single point of contact with the outside market-data world. Owns
/// the worker semaphore that every parallel per-symbol fan-out elsewhere
/// in the pipeline (scanner, event-risk guard) must acquire before making
/// an adapter call.
pub struct MarketDataAdapter {
    primary: Arc<dyn ChartEndpoint>,
    fallback: Arc<dyn ChartEndpoint>,
    cooling: CoolingTracker,
    cache: SeriesCache,
    symbol_limiter: RateLimiter,
    index_limiter: RateLimiter,
    worker_semaphore: Arc<tokio::sync::Semaphore>,
    primary_timeout: Duration,
    fallback_timeout: Duration,
}

impl MarketDataAdapter {
    pub fn new(primary: Arc<dyn ChartEndpoint>, fallback: Arc<dyn ChartEndpoint>) -> Self {
        Self::with_config(primary, fallback, &AdapterConfig::default())
    }

    pub fn with_config(
        primary: Arc<dyn ChartEndpoint>,
        fallback: Arc<dyn ChartEndpoint>,
        config: &AdapterConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            cooling: CoolingTracker::new(config.fallback_cooling_streak),
            cache: SeriesCache::new(),
            symbol_limiter: RateLimiter::new(
                Duration::from_secs_f64(config.primary_delay_s),
                1,
            ),
            index_limiter: RateLimiter::new(Duration::from_secs_f64(config.index_delay_s), 1),
            worker_semaphore: Arc::new(tokio::sync::Semaphore::new(config.max_workers)),
            primary_timeout: Duration::from_secs(config.timeout_s),
            fallback_timeout: Duration::from_secs(config.timeout_s) + Duration::from_secs(5),
        }
    }

    /// Shared across components so the global 2-worker cap is a single
    /// enforcement point, not a convention every caller has to honor.
    pub fn worker_semaphore(&self) -> Arc<tokio::sync::Semaphore> {
        self.worker_semaphore.clone()
    }

    async fn throttle(&self, symbol: &str) {
        if is_index_symbol(symbol) {
            self.index_limiter.acquire().await;
        } else {
            self.symbol_limiter.acquire().await;
        }
    }

    async fn fetch_with_resilience(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Vec<Bar>, NightscreenError> {
        if !self.cooling.is_cold() {
            let attempt = tokio::time::timeout(
                self.primary_timeout,
                self.primary.fetch_chart(symbol, period, interval),
            )
            .await;

            match attempt {
                Ok(Ok(resp)) => {
                    self.cooling.record_primary_success();
                    return Ok(resp.bars);
                }
                Ok(Err(ProviderError::NotFound(_))) => {
                    return Err(NightscreenError::DataUnavailable {
                        symbol: symbol.to_string(),
                        reason: "symbol not found".to_string(),
                    });
                }
                Ok(Err(e)) => {
                    warn!(symbol, error = %e, "primary provider failed, falling back");
                }
                Err(_) => {
                    warn!(symbol, "primary provider timed out, falling back");
                }
            }
        }

        let attempt = tokio::time::timeout(
            self.fallback_timeout,
            self.fallback.fetch_chart(symbol, period, interval),
        )
        .await;

        match attempt {
            Ok(Ok(resp)) => {
                self.cooling.record_fallback_success();
                Ok(resp.bars)
            }
            Ok(Err(ProviderError::NotFound(_))) => Err(NightscreenError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "symbol not found".to_string(),
            }),
            Ok(Err(e)) => Err(NightscreenError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(NightscreenError::timeout_as_data_unavailable(
                symbol,
                self.fallback_timeout,
            )),
        }
    }

    pub async fn get_history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<OhlcvSeries, NightscreenError> {
        if let Some(cached) = self.cache.get(symbol, period, interval) {
            return Ok(cached);
        }

        self.throttle(symbol).await;
        let mut bars = self.fetch_with_resilience(symbol, period, interval).await?;
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);

        let series = OhlcvSeries {
            symbol: symbol.to_string(),
            period,
            interval,
            bars,
        };
        self.cache.insert(symbol, period, interval, series.clone());
        Ok(series)
    }

    pub async fn get_close_on(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<f64, NightscreenError> {
        let series = self.get_history(symbol, Period::Y1, Interval::D1).await?;
        series
            .bars
            .iter()
            .find(|b| b.timestamp.date_naive() == date)
            .map(|b| b.close)
            .ok_or_else(|| NightscreenError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no bar on {date}"),
            })
    }

    pub async fn get_average_volume(
        &self,
        symbol: &str,
        lookback_days: usize,
    ) -> Result<u64, NightscreenError> {
        let series = self.get_history(symbol, Period::Mo3, Interval::D1).await?;
        let tail: Vec<&Bar> = series.bars.iter().rev().take(lookback_days).collect();
        if tail.is_empty() {
            return Err(NightscreenError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no bars for average volume".to_string(),
            });
        }
        let total: f64 = tail.iter().map(|b| b.volume).sum();
        Ok((total / tail.len() as f64).round() as u64)
    }
}

#[async_trait]
impl OhlcvSource for MarketDataAdapter {
    async fn history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<OhlcvSeries, NightscreenError> {
        self.get_history(symbol, period, interval).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider::test_support::RecordingProvider;

    fn bar(ts_secs: i64, close: f64) -> Bar {
        Bar {
            timestamp: chrono::DateTime::from_timestamp(ts_secs, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000_000.0,
        }
    }

    #[tokio::test]
    async fn history_is_cached_after_first_fetch() {
        let primary = Arc::new(RecordingProvider::new(vec![bar(1_700_000_000, 10.0)]));
        let fallback = Arc::new(RecordingProvider::new(vec![]));
        let adapter = MarketDataAdapter::new(primary.clone(), fallback);

        adapter
            .get_history("BHP.AX", Period::D5, Interval::H1)
            .await
            .unwrap();
        adapter
            .get_history("BHP.AX", Period::D5, Interval::H1)
            .await
            .unwrap();

        assert_eq!(primary.requested_urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn falls_back_when_primary_errors() {
        struct FailingProvider;
        #[async_trait]
        impl ChartEndpoint for FailingProvider {
            async fn fetch_chart(
                &self,
                _symbol: &str,
                _period: Period,
                _interval: Interval,
            ) -> Result<provider::ChartResponse, ProviderError> {
                Err(ProviderError::Blocked)
            }
        }

        let primary = Arc::new(FailingProvider);
        let fallback = Arc::new(RecordingProvider::new(vec![bar(1_700_000_000, 12.0)]));
        let adapter = MarketDataAdapter::new(primary, fallback.clone());

        let series = adapter
            .get_history("CBA.AX", Period::D5, Interval::H1)
            .await
            .unwrap();

        assert_eq!(series.bars.len(), 1);
        assert_eq!(fallback.requested_urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn worker_semaphore_caps_at_two() {
        let primary = Arc::new(RecordingProvider::new(vec![]));
        let fallback = Arc::new(RecordingProvider::new(vec![]));
        let adapter = MarketDataAdapter::new(primary, fallback);
        assert_eq!(adapter.worker_semaphore().available_permits(), 2);
    }
}
