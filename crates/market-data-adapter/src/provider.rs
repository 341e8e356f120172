use std::time::{Duration, Instant};

use async_trait::async_trait;
use nightscreen_core::{Bar, Interval, Period};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("block signature detected")]
    Blocked,
    #[error("symbol not found: {0}")]
    NotFound(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub struct ChartResponse {
    pub bars: Vec<Bar>,
    pub body_len: usize,
    pub latency: Duration,
}

/// A source of OHLCV chart data. Intentionally has only this one method:
/// there is no way to ask a `ChartEndpoint` for ticker metadata, a quote
/// snapshot, or financials, because the real provider's equivalent of
/// those is the HTML-scraped, bot-detected page that causes IP blocks.
#[async_trait]
pub trait ChartEndpoint: Send + Sync {
    async fn fetch_chart(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<ChartResponse, ProviderError>;
}

/// Empty body + HTTP 200 + suspiciously short latency is the provider's
/// block signature: a real chart response for any liquid ASX symbol never
/// returns under ~250ms once TLS and JSON parsing are accounted for.
pub fn looks_blocked(status: u16, body_len: usize, latency: Duration) -> bool {
    status == 200 && body_len == 0 && latency < Duration::from_millis(250)
}

#[derive(Debug, Deserialize)]
struct RawBar {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Deserialize)]
struct RawChart {
    #[serde(default)]
    bars: Vec<RawBar>,
}

/// Talks to the primary provider's `/chart/{symbol}` time-series endpoint
/// only. Browser-like headers and a process-wide client are kept so
/// connections are reused across calls, mirroring the teacher's
/// `PolygonClient` session handling.
pub struct HttpChartProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChartProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
            )
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client build");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChartEndpoint for HttpChartProvider {
    async fn fetch_chart(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<ChartResponse, ProviderError> {
        let url = format!(
            "{}/chart/{}?range={}&interval={}",
            self.base_url,
            symbol,
            period.as_str(),
            interval.as_str()
        );
        let start = Instant::now();
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let latency = start.elapsed();

        if looks_blocked(status, body.len(), latency) {
            return Err(ProviderError::Blocked);
        }
        if status == 404 {
            return Err(ProviderError::NotFound(symbol.to_string()));
        }
        if !(200..300).contains(&status) {
            return Err(ProviderError::Transport(format!("status {status}")));
        }

        let raw: RawChart = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let bars = raw
            .bars
            .into_iter()
            .filter_map(|b| {
                chrono::DateTime::from_timestamp(b.t, 0).map(|ts| Bar {
                    timestamp: ts,
                    open: b.o,
                    high: b.h,
                    low: b.l,
                    close: b.c,
                    volume: b.v,
                })
            })
            .collect();

        Ok(ChartResponse {
            bars,
            body_len: body.len(),
            latency,
        })
    }
}

/// A provider that hands back canned responses. Used in tests to assert
/// the adapter never sends a request matching anything but a chart-style
/// path (enforcing the metadata-endpoint ban without a live network).
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    pub struct RecordingProvider {
        pub requested_urls: Mutex<Vec<String>>,
        pub response: ChartResponse,
    }

    impl RecordingProvider {
        pub fn new(bars: Vec<Bar>) -> Self {
            Self {
                requested_urls: Mutex::new(Vec::new()),
                response: ChartResponse {
                    bars,
                    body_len: 128,
                    latency: Duration::from_millis(300),
                },
            }
        }
    }

    #[async_trait]
    impl ChartEndpoint for RecordingProvider {
        async fn fetch_chart(
            &self,
            symbol: &str,
            period: Period,
            interval: Interval,
        ) -> Result<ChartResponse, ProviderError> {
            let url = format!("/chart/{}?range={}&interval={}", symbol, period.as_str(), interval.as_str());
            self.requested_urls.lock().unwrap().push(url);
            Ok(ChartResponse {
                bars: self.response.bars.clone(),
                body_len: self.response.body_len,
                latency: self.response.latency,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_block_signature() {
        assert!(looks_blocked(200, 0, Duration::from_millis(50)));
        assert!(!looks_blocked(200, 512, Duration::from_millis(50)));
        assert!(!looks_blocked(200, 0, Duration::from_millis(400)));
        assert!(!looks_blocked(429, 0, Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn recording_provider_only_hits_chart_paths() {
        let provider = test_support::RecordingProvider::new(vec![]);
        provider
            .fetch_chart("BHP.AX", Period::D5, Interval::H1)
            .await
            .unwrap();
        let urls = provider.requested_urls.lock().unwrap();
        assert!(urls.iter().all(|u| u.starts_with("/chart/")));
    }
}
