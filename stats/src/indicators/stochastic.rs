use super::sma::sma;

/// Slow stochastic: raw %K smoothed by `smooth_k`, %D is an SMA of %K.
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
    smooth_k: usize,
    smooth_d: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = closes.len();
    let mut raw_k = vec![None; n];
    if period == 0 || n < period {
        return (vec![None; n], vec![None; n]);
    }
    for i in (period - 1)..n {
        let window_high = highs[(i + 1 - period)..=i].iter().cloned().fold(f64::MIN, f64::max);
        let window_low = lows[(i + 1 - period)..=i].iter().cloned().fold(f64::MAX, f64::min);
        let range = window_high - window_low;
        raw_k[i] = Some(if range == 0.0 { 50.0 } else { 100.0 * (closes[i] - window_low) / range });
    }

    let raw_k_filled: Vec<f64> = raw_k.iter().map(|v| v.unwrap_or(0.0)).collect();
    let k_smoothed = sma(&raw_k_filled, smooth_k);
    let k: Vec<Option<f64>> = raw_k
        .iter()
        .zip(k_smoothed.iter())
        .map(|(raw, smoothed)| raw.and(*smoothed))
        .collect();

    let k_filled: Vec<f64> = k.iter().map(|v| v.unwrap_or(0.0)).collect();
    let d_raw = sma(&k_filled, smooth_d);
    let d: Vec<Option<f64>> = k.iter().zip(d_raw.iter()).map(|(kv, dv)| kv.and(*dv)).collect();

    (k, d)
}
