pub mod filters;
pub mod scoring;
pub mod universe;

use std::sync::Arc;

use nightscreen_core::{math, Candidate, Interval, OhlcvSource, Period};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

pub use universe::Universe;

const BETA_PROXY_SYMBOL: &str = "^AXJO";

/// Builds the candidate list, honoring the adapter's shared worker cap.
pub struct StockScanner {
    source: Arc<dyn OhlcvSource>,
    worker_semaphore: Arc<Semaphore>,
}

impl StockScanner {
    pub fn new(source: Arc<dyn OhlcvSource>, worker_semaphore: Arc<Semaphore>) -> Self {
        Self {
            source,
            worker_semaphore,
        }
    }

    pub async fn scan(&self, universe: &Universe) -> Vec<Candidate> {
        let index_returns = match self
            .source
            .history(BETA_PROXY_SYMBOL, Period::Y1, Interval::D1)
            .await
        {
            Ok(series) => math::returns(&series.closes()),
            Err(e) => {
                warn!(error = %e, "could not fetch ASX 200 proxy for beta, defaulting beta to 1.0");
                Vec::new()
            }
        };

        let mut candidates = Vec::new();
        for (sector, tickers) in &universe.by_sector {
            let sector_candidates = self.scan_sector(*sector, tickers, &index_returns).await;
            if sector_candidates.len() < 3 {
                warn!(
                    sector = sector.as_str(),
                    count = sector_candidates.len(),
                    "sector produced fewer than 3 candidates, allowing through with warning"
                );
            }
            candidates.extend(sector_candidates);
        }
        candidates
    }

    async fn scan_sector(
        &self,
        sector: nightscreen_core::Sector,
        tickers: &[String],
        index_returns: &[f64],
    ) -> Vec<Candidate> {
        let mut set = JoinSet::new();
        for ticker in tickers {
            let source = self.source.clone();
            let semaphore = self.worker_semaphore.clone();
            let symbol = ticker.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let series = source.history(&symbol, Period::Y1, Interval::D1).await;
                (symbol, series)
            });
        }

        let mut raw = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((symbol, Ok(series))) => raw.push((symbol, series)),
                Ok((symbol, Err(e))) => {
                    warn!(symbol, error = %e, "scanner skipping ticker: fetch failed");
                }
                Err(e) => warn!(error = %e, "scanner task panicked"),
            }
        }

        let mut scored = Vec::new();
        for (symbol, series) in &raw {
            let Some(metrics) = filters::compute_metrics(series) else {
                warn!(symbol, "scanner skipping ticker: no bars");
                continue;
            };
            if let Err(reason) = filters::passes_filters(series, &metrics) {
                warn!(symbol, reason, "scanner skipping ticker: filter failed");
                continue;
            }
            let beta = if index_returns.is_empty() {
                1.0
            } else {
                let asset_returns = math::returns(&series.closes());
                math::beta(&asset_returns, index_returns)
            };
            let proxy = scoring::cap_proxy(metrics.last_close, metrics.avg_volume_20d);
            scored.push((symbol.clone(), series.clone(), metrics, beta, proxy));
        }

        let mut proxies: Vec<f64> = scored.iter().map(|s| s.4).collect();
        proxies.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median_idx = proxies.len() / 2;
        let median_proxy = proxies.get(median_idx).copied().unwrap_or(0.0);

        scored
            .into_iter()
            .map(|(symbol, _series, metrics, beta, proxy)| {
                let top_half = proxy >= median_proxy;
                let score = scoring::screening_score(&metrics, beta, top_half);
                Candidate {
                    name: symbol.clone(),
                    symbol,
                    sector,
                    price: metrics.last_close,
                    avg_volume: metrics.avg_volume_20d.round() as u64,
                    volatility: metrics.volatility,
                    beta,
                    screening_score: score,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use nightscreen_core::{Bar, NightscreenError, OhlcvSeries, Sector};
    use std::collections::BTreeMap;

    struct FakeSource {
        series_by_symbol: std::collections::HashMap<String, OhlcvSeries>,
    }

    fn flat_series(symbol: &str, n: usize, close: f64, volume: f64) -> OhlcvSeries {
        let bars = (0..n)
            .map(|i| Bar {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume,
            })
            .collect();
        OhlcvSeries {
            symbol: symbol.to_string(),
            period: Period::Y1,
            interval: Interval::D1,
            bars,
        }
    }

    #[async_trait]
    impl OhlcvSource for FakeSource {
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
                    reason: "not in fixture".to_string(),
                })
        }
    }

    #[tokio::test]
    async fn scan_skips_failing_symbols_and_keeps_healthy_ones() {
        let mut fixture = std::collections::HashMap::new();
        fixture.insert(
            "AAA.AX".to_string(),
            flat_series("AAA.AX", 80, 5.0, 1_000_000.0),
        );
        fixture.insert("^AXJO".to_string(), flat_series("^AXJO", 80, 7000.0, 1.0));
        // BBB.AX intentionally absent: fetch fails and must be skipped, not abort the scan.

        let source = Arc::new(FakeSource {
            series_by_symbol: fixture,
        });
        let scanner = StockScanner::new(source, Arc::new(Semaphore::new(2)));

        let mut by_sector = BTreeMap::new();
        by_sector.insert(
            Sector::Financials,
            vec!["AAA.AX".to_string(), "BBB.AX".to_string()],
        );
        let universe = Universe { by_sector };

        let candidates = scanner.scan(&universe).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].symbol, "AAA.AX");
        assert_eq!(candidates[0].name, "AAA.AX");
    }
}
