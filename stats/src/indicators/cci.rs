//! Commodity Channel Index.
const CCI_CONSTANT: f64 = 0.015;

pub fn cci(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if period == 0 || n < period {
        return out;
    }
    let typical: Vec<f64> = (0..n).map(|i| (highs[i] + lows[i] + closes[i]) / 3.0).collect();
    for i in (period - 1)..n {
        let window = &typical[(i + 1 - period)..=i];
        let sma: f64 = window.iter().sum::<f64>() / period as f64;
        let mean_dev: f64 = window.iter().map(|v| (v - sma).abs()).sum::<f64>() / period as f64;
        out[i] = Some(if mean_dev == 0.0 {
            0.0
        } else {
            (typical[i] - sma) / (CCI_CONSTANT * mean_dev)
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_typical_price_yields_zero_cci() {
        let highs = vec![10.0; 25];
        let lows = vec![10.0; 25];
        let closes = vec![10.0; 25];
        let out = cci(&highs, &lows, &closes, 20);
        assert_eq!(out[24], Some(0.0));
    }
}
