use nightscreen_core::{math, Bar, OhlcvSeries};

#[derive(Debug, Clone, Copy)]
pub struct ScanMetrics {
    pub last_close: f64,
    pub avg_volume_20d: f64,
    pub sma_20: f64,
    pub volatility: f64,
}

pub fn compute_metrics(series: &OhlcvSeries) -> Option<ScanMetrics> {
    let bars = &series.bars;
    if bars.is_empty() {
        return None;
    }
    let last_close = bars.last()?.close;
    let tail20: Vec<&Bar> = bars.iter().rev().take(20).collect();
    let avg_volume_20d = tail20.iter().map(|b| b.volume).sum::<f64>() / tail20.len() as f64;
    let sma_20 = tail20.iter().map(|b| b.close).sum::<f64>() / tail20.len() as f64;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volatility = math::annualized_volatility(&closes);
    Some(ScanMetrics {
        last_close,
        avg_volume_20d,
        sma_20,
        volatility,
    })
}

/// Reasons are descriptive so scan failures can be logged per spec's
/// "per-ticker failures are logged and skipped" requirement.
pub fn passes_filters(series: &OhlcvSeries, metrics: &ScanMetrics) -> Result<(), &'static str> {
    if metrics.last_close <= 0.50 {
        return Err("price below AUD 0.50");
    }
    if metrics.avg_volume_20d <= 500_000.0 {
        return Err("20-day average volume below 500,000");
    }
    if series.bars.len() < 60 {
        return Err("fewer than 60 bars of daily history");
    }
    let last_five = series.bars.iter().rev().take(5);
    if !last_five.clone().any(|b| b.volume > 0.0) {
        return Err("fully stalled: no volume in last 5 sessions");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nightscreen_core::{Interval, Period};

    fn series_with(n: usize, close: f64, volume: f64) -> OhlcvSeries {
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
            symbol: "TEST.AX".to_string(),
            period: Period::Y1,
            interval: Interval::D1,
            bars,
        }
    }

    #[test]
    fn rejects_penny_stock() {
        let series = series_with(80, 0.20, 1_000_000.0);
        let metrics = compute_metrics(&series).unwrap();
        assert_eq!(passes_filters(&series, &metrics), Err("price below AUD 0.50"));
    }

    #[test]
    fn rejects_thin_volume() {
        let series = series_with(80, 5.0, 100_000.0);
        let metrics = compute_metrics(&series).unwrap();
        assert_eq!(
            passes_filters(&series, &metrics),
            Err("20-day average volume below 500,000")
        );
    }

    #[test]
    fn rejects_short_history() {
        let series = series_with(30, 5.0, 1_000_000.0);
        let metrics = compute_metrics(&series).unwrap();
        assert_eq!(
            passes_filters(&series, &metrics),
            Err("fewer than 60 bars of daily history")
        );
    }

    #[test]
    fn accepts_healthy_stock() {
        let series = series_with(80, 5.0, 1_000_000.0);
        let metrics = compute_metrics(&series).unwrap();
        assert!(passes_filters(&series, &metrics).is_ok());
    }

    #[test]
    fn rejects_stalled_volume() {
        let mut series = series_with(80, 5.0, 1_000_000.0);
        for b in series.bars.iter_mut().rev().take(5) {
            b.volume = 0.0;
        }
        let metrics = compute_metrics(&series).unwrap();
        assert_eq!(
            passes_filters(&series, &metrics),
            Err("fully stalled: no volume in last 5 sessions")
        );
    }
}
