//! Average True Range, Wilder-smoothed.
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low).max((high - prev_close).abs()).max((low - prev_close).abs())
}

pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if period == 0 || n <= period {
        return out;
    }
    let mut trs = Vec::with_capacity(n);
    trs.push(highs[0] - lows[0]);
    for i in 1..n {
        trs.push(true_range(highs[i], lows[i], closes[i - 1]));
    }
    let mut avg: f64 = trs[1..=period].iter().sum::<f64>() / period as f64;
    out[period] = Some(avg);
    for i in (period + 1)..n {
        avg = (avg * (period as f64 - 1.0) + trs[i]) / period as f64;
        out[i] = Some(avg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_range_candles_yield_constant_atr() {
        let highs = vec![11.0; 20];
        let lows = vec![9.0; 20];
        let closes = vec![10.0; 20];
        let out = atr(&highs, &lows, &closes, 14);
        assert_eq!(out[14], Some(2.0));
        assert_eq!(out[19], Some(2.0));
    }
}
