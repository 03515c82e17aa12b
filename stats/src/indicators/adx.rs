//! Average Directional Index: smoothed trend-strength in [0, 100].
use super::atr::true_range;

pub fn adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if period == 0 || n <= period * 2 {
        return out;
    }

    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    let mut tr = vec![0.0; n];
    for i in 1..n {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        plus_dm[i] = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        minus_dm[i] = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
        tr[i] = true_range(highs[i], lows[i], closes[i - 1]);
    }

    let mut smooth_tr: f64 = tr[1..=period].iter().sum();
    let mut smooth_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut smooth_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx_series = vec![None; n];
    let di = |plus: f64, minus: f64, trv: f64| -> (f64, f64) {
        if trv == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * plus / trv, 100.0 * minus / trv)
        }
    };
    let (mut pdi, mut mdi) = di(smooth_plus, smooth_minus, smooth_tr);
    dx_series[period] = Some(dx(pdi, mdi));

    for i in (period + 1)..n {
        smooth_tr = smooth_tr - (smooth_tr / period as f64) + tr[i];
        smooth_plus = smooth_plus - (smooth_plus / period as f64) + plus_dm[i];
        smooth_minus = smooth_minus - (smooth_minus / period as f64) + minus_dm[i];
        let (p, m) = di(smooth_plus, smooth_minus, smooth_tr);
        pdi = p;
        mdi = m;
        dx_series[i] = Some(dx(pdi, mdi));
    }

    // ADX is a further Wilder-smoothed average of DX over `period` bars.
    let first_dx_idx = period;
    let last_idx = n - 1;
    if last_idx < first_dx_idx + period - 1 {
        return out;
    }
    let seed_end = first_dx_idx + period - 1;
    let seed_vals: Vec<f64> = dx_series[first_dx_idx..=seed_end].iter().map(|v| v.unwrap()).collect();
    let mut adx_val = seed_vals.iter().sum::<f64>() / period as f64;
    out[seed_end] = Some(adx_val);
    for i in (seed_end + 1)..n {
        let dxv = dx_series[i].unwrap();
        adx_val = (adx_val * (period as f64 - 1.0) + dxv) / period as f64;
        out[i] = Some(adx_val);
    }
    out
}

fn dx(pdi: f64, mdi: f64) -> f64 {
    let sum = pdi + mdi;
    if sum == 0.0 {
        0.0
    } else {
        100.0 * (pdi - mdi).abs() / sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_uptrend_drives_adx_high() {
        let n = 80;
        let closes: Vec<f64> = (0..n).map(|i| 10.0 + i as f64).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.5).collect();
        let out = adx(&highs, &lows, &closes, 14);
        let last = out[n - 1].expect("adx should be warmed up by candle 80");
        assert!(last > 50.0, "expected strong trend reading, got {last}");
    }
}
