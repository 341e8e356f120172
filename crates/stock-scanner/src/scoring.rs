use crate::filters::ScanMetrics;

/// Base 50, plus up to four bonuses, each independent per spec.md §4.2.
pub fn screening_score(metrics: &ScanMetrics, beta: f64, cap_proxy_top_half: bool) -> f64 {
    let mut score = 50.0;
    if metrics.avg_volume_20d > 1_000_000.0 {
        score += 10.0;
    }
    if (0.8..=1.5).contains(&beta) {
        score += 15.0;
    }
    if metrics.last_close > metrics.sma_20 {
        score += 10.0;
    }
    if cap_proxy_top_half {
        score += 15.0;
    }
    score
}

pub fn cap_proxy(last_close: f64, avg_volume_20d: f64) -> f64 {
    last_close * avg_volume_20d
}
