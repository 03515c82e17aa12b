//! Williams %R, a momentum oscillator bounded in [-100, 0].
pub fn williams_r(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if period == 0 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window_high = highs[(i + 1 - period)..=i].iter().cloned().fold(f64::MIN, f64::max);
        let window_low = lows[(i + 1 - period)..=i].iter().cloned().fold(f64::MAX, f64::min);
        let range = window_high - window_low;
        out[i] = Some(if range == 0.0 {
            0.0
        } else {
            -100.0 * (window_high - closes[i]) / range
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_at_window_high_is_zero() {
        let highs = vec![9.0, 10.0, 11.0, 12.0];
        let lows = vec![8.0, 8.5, 9.0, 9.5];
        let closes = vec![8.5, 9.0, 10.5, 12.0];
        let out = williams_r(&highs, &lows, &closes, 4);
        assert_eq!(out[3], Some(0.0));
    }
}
