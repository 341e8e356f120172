/// Statistical helpers shared by the scanner's beta/volatility filter and
/// the event-risk guard's hedge-beta calculation. Adapted from the
/// analysis workspace's adaptive-threshold module; kept deliberately small
/// since this pipeline uses fixed textbook thresholds rather than
/// data-driven percentile bands.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Daily returns from a close-price series.
pub fn returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Annualized volatility (stdev of daily returns * sqrt(252)).
pub fn annualized_volatility(closes: &[f64]) -> f64 {
    let r = returns(closes);
    std_dev(&r) * 252f64.sqrt()
}

/// Beta of `asset_returns` against `market_returns` via covariance/variance.
/// Returns 1.0 (market-neutral assumption) if there isn't enough overlap.
pub fn beta(asset_returns: &[f64], market_returns: &[f64]) -> f64 {
    let n = asset_returns.len().min(market_returns.len());
    if n < 2 {
        return 1.0;
    }
    let a = &asset_returns[..n];
    let m = &market_returns[..n];
    let am = mean(a);
    let mm = mean(m);
    let covariance: f64 = a
        .iter()
        .zip(m.iter())
        .map(|(ai, mi)| (ai - am) * (mi - mm))
        .sum::<f64>()
        / (n - 1) as f64;
    let market_variance = std_dev(m).powi(2);
    if market_variance == 0.0 {
        1.0
    } else {
        covariance / market_variance
    }
}

/// Clamp a score into [floor, ceiling].
pub fn clamp(value: f64, floor: f64, ceiling: f64) -> f64 {
    value.max(floor).min(ceiling)
}
