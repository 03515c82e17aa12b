//! Money Flow Index: volume-weighted RSI analogue, bounded in [0, 100].
pub fn mfi(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if period == 0 || n <= period {
        return out;
    }
    let typical: Vec<f64> = (0..n).map(|i| (highs[i] + lows[i] + closes[i]) / 3.0).collect();
    let raw_flow: Vec<f64> = (0..n).map(|i| typical[i] * volumes[i]).collect();

    for i in period..n {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for j in (i + 1 - period)..=i {
            if j == 0 {
                continue;
            }
            if typical[j] > typical[j - 1] {
                positive += raw_flow[j];
            } else if typical[j] < typical[j - 1] {
                negative += raw_flow[j];
            }
        }
        out[i] = Some(if negative == 0.0 {
            100.0
        } else {
            let ratio = positive / negative;
            100.0 - (100.0 / (1.0 + ratio))
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rising_prices_and_volume_saturate_mfi() {
        let n = 20;
        let closes: Vec<f64> = (0..n).map(|i| 10.0 + i as f64).collect();
        let highs = closes.clone();
        let lows = closes.clone();
        let volumes = vec![100.0; n];
        let out = mfi(&highs, &lows, &closes, &volumes, 14);
        assert_eq!(out[n - 1], Some(100.0));
    }
}
