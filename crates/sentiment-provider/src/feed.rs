use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A raw headline before scoring. Shape mirrors what a news aggregator
/// hands back: title, optional body, loosely-structured keywords/tickers.
#[derive(Debug, Clone)]
pub struct RawArticle {
    pub title: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub tickers: Vec<String>,
    pub published_utc: DateTime<Utc>,
    pub source: String,
}

/// Fetches raw headlines for a symbol. The model/scraping choice behind
/// this is explicitly out of scope; callers only see the contract below.
/// Never fabricates: a fetch failure returns an empty vec, not an error
/// the rest of the pipeline has to special-case.
#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn fetch(&self, symbol: &str, window_days: i64) -> Vec<RawArticle>;
}

/// A feed with nothing behind it. Used where no real news integration is
/// configured; every symbol reports zero articles, which the engine
/// already treats as "sentiment disabled" for that symbol.
pub struct NullNewsFeed;

#[async_trait]
impl NewsFeed for NullNewsFeed {
    async fn fetch(&self, _symbol: &str, _window_days: i64) -> Vec<RawArticle> {
        Vec::new()
    }
}
