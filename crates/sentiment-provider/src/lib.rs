pub mod feed;

use async_trait::async_trait;
use chrono::Utc;
use nightscreen_core::{NewsArticle, SentimentSnapshot, SentimentSource};
use std::collections::HashSet;
use std::sync::Arc;

pub use feed::{NewsFeed, NullNewsFeed, RawArticle};

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't", "weren't",
    "won't", "wouldn't", "couldn't", "shouldn't", "hardly", "barely", "neither", "nor", "without",
];

const NEGATION_WINDOW: usize = 3;

/// Lexicon-based scorer standing in for the "FinBERT-style" classifier the
/// spec leaves as an external implementation detail. Same word lists,
/// negation handling, recency decay and entity weighting as the sentiment
/// workspace's engine; reshaped here to the `{compound, positive, negative,
/// neutral, article_count, articles}` contract instead of a single
/// analysis result.
pub struct SentimentEngine {
    feed: Arc<dyn NewsFeed>,
    positive_words: Vec<&'static str>,
    negative_words: Vec<&'static str>,
}

impl SentimentEngine {
    pub fn new(feed: Arc<dyn NewsFeed>) -> Self {
        Self {
            feed,
            positive_words: vec![
                "bullish", "rally", "surge", "gain", "profit", "growth", "beat", "upgrade",
                "outperform", "strong", "positive", "rise", "increase", "breakthrough",
                "innovation", "success", "exceed", "momentum", "buy", "recommend", "optimistic",
                "record", "high", "advance", "dividend", "buyback", "repurchase", "accretive",
                "upside", "recovery", "rebound", "expansion", "robust", "accelerating",
                "overweight", "raised", "guidance", "upgraded", "initiated", "reiterated",
                "outpacing", "tailwind",
            ],
            negative_words: vec![
                "bearish", "decline", "loss", "fall", "plunge", "crash", "miss", "downgrade",
                "underperform", "weak", "negative", "drop", "decrease", "concern", "risk", "fail",
                "disappoint", "slump", "sell", "warning", "pessimistic", "low", "retreat", "fear",
                "trouble", "dilution", "dilutive", "headwind", "lawsuit", "litigation", "recall",
                "investigation", "probe", "default", "bankruptcy", "restructuring", "layoff",
                "downside", "overvalued", "bubble", "underweight", "lowered", "suspended",
            ],
        }
    }

    fn score_text(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| {
                c.is_whitespace() || c == ',' || c == ';' || c == '.' || c == '!' || c == '?'
            })
            .filter(|w| !w.is_empty())
            .collect();

        let positive_set: HashSet<&str> = self.positive_words.iter().copied().collect();
        let negative_set: HashSet<&str> = self.negative_words.iter().copied().collect();
        let negation_set: HashSet<&str> = NEGATION_WORDS.iter().copied().collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| negation_set.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let mut score: i32 = 0;
        for (i, word) in words.iter().enumerate() {
            let is_positive = positive_set.contains(*word);
            let is_negative = negative_set.contains(*word);
            if !is_positive && !is_negative {
                continue;
            }
            let negated = negation_positions
                .iter()
                .any(|&neg_pos| neg_pos < i && (i - neg_pos) <= NEGATION_WINDOW);
            if is_positive {
                score += if negated { -1 } else { 1 };
            } else {
                score += if negated { 1 } else { -1 };
            }
        }
        score as f64
    }

    fn score_article(&self, article: &RawArticle) -> f64 {
        let mut total = self.score_text(&article.title) * 2.0;
        if let Some(desc) = &article.description {
            total += self.score_text(desc);
        }
        for keyword in &article.keywords {
            total += self.score_text(keyword) * 0.5;
        }
        total
    }

    fn recency_weight(&self, article: &RawArticle) -> f64 {
        let age_hours = (Utc::now() - article.published_utc).num_hours();
        if age_hours < 24 {
            1.0
        } else if age_hours < 48 {
            0.7
        } else if age_hours < 168 {
            0.4
        } else {
            0.2
        }
    }

    fn entity_weight(&self, article: &RawArticle, symbol: &str) -> f64 {
        let sym_upper = symbol.to_uppercase();
        let is_primary = article.tickers.iter().any(|t| t.to_uppercase() == sym_upper);
        if is_primary {
            if article.tickers.len() <= 2 {
                1.5
            } else {
                1.2
            }
        } else {
            0.5
        }
    }

    async fn snapshot(&self, symbol: &str, window_days: i64) -> SentimentSnapshot {
        let raw = self.feed.fetch(symbol, window_days).await;
        if raw.is_empty() {
            return SentimentSnapshot::empty();
        }

        let mut total_score = 0.0;
        let mut total_weight = 0.0;
        let mut positive_count = 0usize;
        let mut negative_count = 0usize;
        let mut neutral_count = 0usize;
        let mut articles = Vec::with_capacity(raw.len());

        for article in &raw {
            let article_score = self.score_article(article);
            let weight = self.recency_weight(article) * self.entity_weight(article, symbol);
            total_score += article_score * weight;
            total_weight += weight;

            if article_score > 0.5 {
                positive_count += 1;
            } else if article_score < -0.5 {
                negative_count += 1;
            } else {
                neutral_count += 1;
            }

            // Per-article compound on the same [-1,1] scale as the snapshot,
            // consumed by event-risk-guard's 72h rolling average.
            let article_compound = (article_score / 3.0).tanh();
            articles.push(NewsArticle {
                title: article.title.clone(),
                source: article.source.clone(),
                ts: article.published_utc,
                score: article_compound,
            });
        }

        let avg_sentiment = if total_weight > 0.0 {
            total_score / total_weight
        } else {
            0.0
        };

        // tanh keeps the mapping smooth instead of hard-clamping outliers;
        // divisor chosen so a handful of strongly-worded headlines still
        // saturates near +/-1 rather than pinning on the first one.
        let compound = (avg_sentiment / 3.0).tanh();

        let n = raw.len() as f64;
        SentimentSnapshot {
            compound,
            positive: positive_count as f64 / n,
            negative: negative_count as f64 / n,
            neutral: neutral_count as f64 / n,
            article_count: raw.len(),
            articles,
        }
    }
}

#[async_trait]
impl SentimentSource for SentimentEngine {
    async fn sentiment(&self, symbol: &str, lookback_hours: i64) -> SentimentSnapshot {
        let window_days = (lookback_hours / 24).max(1);
        self.snapshot(symbol, window_days).await
    }
}

/// Average of per-article compound scores within a trailing window,
/// shared by event-risk-guard's 72-hour sentiment check. Mirrors the
/// sentiment workspace's windowed-average approach to velocity.
pub fn trailing_average_compound(articles: &[NewsArticle], window_hours: i64) -> Option<f64> {
    let cutoff = Utc::now() - chrono::Duration::hours(window_hours);
    let in_window: Vec<f64> = articles
        .iter()
        .filter(|a| a.ts >= cutoff)
        .map(|a| a.score)
        .collect();
    if in_window.is_empty() {
        return None;
    }
    Some(in_window.iter().sum::<f64>() / in_window.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct FixedFeed {
        articles: Vec<RawArticle>,
    }

    #[async_trait]
    impl NewsFeed for FixedFeed {
        async fn fetch(&self, _symbol: &str, _window_days: i64) -> Vec<RawArticle> {
            self.articles.clone()
        }
    }

    fn article(title: &str, tickers: &[&str]) -> RawArticle {
        RawArticle {
            title: title.to_string(),
            description: None,
            keywords: vec![],
            tickers: tickers.iter().map(|s| s.to_string()).collect(),
            published_utc: Utc::now(),
            source: "test-wire".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_feed_never_fabricates_sentiment() {
        let engine = SentimentEngine::new(Arc::new(NullNewsFeed));
        let snapshot = engine.sentiment("CBA.AX", 72).await;
        assert_eq!(snapshot.article_count, 0);
        assert_eq!(snapshot.compound, 0.0);
    }

    #[tokio::test]
    async fn positive_headlines_yield_positive_compound() {
        let feed = FixedFeed {
            articles: vec![
                article("Bank posts record profit, upgrades guidance", &["CBA.AX"]),
                article("Analysts bullish on strong recovery and rally", &["CBA.AX"]),
            ],
        };
        let engine = SentimentEngine::new(Arc::new(feed));
        let snapshot = engine.sentiment("CBA.AX", 72).await;
        assert!(snapshot.compound > 0.0);
        assert_eq!(snapshot.article_count, 2);
    }

    #[tokio::test]
    async fn negation_flips_polarity() {
        let feed = FixedFeed {
            articles: vec![article("Profit growth was not strong this quarter", &["CBA.AX"])],
        };
        let engine = SentimentEngine::new(Arc::new(feed));
        let snapshot = engine.sentiment("CBA.AX", 72).await;
        assert!(snapshot.compound <= 0.0);
    }

    #[test]
    fn trailing_average_ignores_stale_articles() {
        let now = Utc::now();
        let articles = vec![
            NewsArticle {
                title: "recent".to_string(),
                source: "wire".to_string(),
                ts: now - Duration::hours(10),
                score: 0.8,
            },
            NewsArticle {
                title: "stale".to_string(),
                source: "wire".to_string(),
                ts: now - Duration::hours(200),
                score: -0.9,
            },
        ];
        let avg = trailing_average_compound(&articles, 72).unwrap();
        assert!((avg - 0.8).abs() < 1e-9);
    }
}
