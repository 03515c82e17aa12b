//! On-Balance Volume: running sum of signed volume by close direction.
/// Never missing; the first candle seeds the running total at its own volume.
pub fn obv(closes: &[f64], volumes: &[f64]) -> Vec<Option<f64>> {
    let n = closes.len();
    if n == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(n);
    let mut running = volumes[0];
    out.push(Some(running));
    for i in 1..n {
        if closes[i] > closes[i - 1] {
            running += volumes[i];
        } else if closes[i] < closes[i - 1] {
            running -= volumes[i];
        }
        out.push(Some(running));
    }
    out
}
