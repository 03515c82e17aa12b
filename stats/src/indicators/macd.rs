use super::ema::ExponentialMovingAverage;
use crate::Next;

/// MACD line, signal line, and histogram.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = closes.len();
    let mut line = vec![None; n];
    let mut sig = vec![None; n];
    let mut hist = vec![None; n];
    if fast == 0 || slow == 0 || signal == 0 || slow <= fast {
        return (line, sig, hist);
    }

    let mut ema_fast = ExponentialMovingAverage::new(2.0, fast as u32).expect("fast != 0");
    let mut ema_slow = ExponentialMovingAverage::new(2.0, slow as u32).expect("slow != 0");
    let mut ema_signal = ExponentialMovingAverage::new(2.0, signal as u32).expect("signal != 0");

    let mut signal_warm = 0usize;
    for (i, &close) in closes.iter().enumerate() {
        let f = ema_fast.next(close);
        let s = ema_slow.next(close);
        let macd_val = f - s;
        if i + 1 >= slow {
            line[i] = Some(macd_val);
            let sig_val = ema_signal.next(macd_val);
            signal_warm += 1;
            if signal_warm >= signal {
                sig[i] = Some(sig_val);
                hist[i] = Some(macd_val - sig_val);
            }
        }
    }
    (line, sig, hist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_is_line_minus_signal_once_warmed_up() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let (line, sig, hist) = macd(&closes, 12, 26, 9);
        let last = closes.len() - 1;
        if let (Some(l), Some(s), Some(h)) = (line[last], sig[last], hist[last]) {
            assert!((h - (l - s)).abs() < 1e-9);
        } else {
            panic!("expected warmed-up macd at the end of a 60-candle series");
        }
    }
}
