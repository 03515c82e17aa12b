//! Candle-pattern recognition: each pattern produces a
//! per-bar reading of `+100` (bullish), `-100` (bearish), or `0` (absent).
use std::collections::HashMap;

struct Bar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl Bar {
    fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
    fn range(&self) -> f64 {
        (self.high - self.low).max(1e-12)
    }
    fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }
    fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }
    fn is_bullish(&self) -> bool {
        self.close > self.open
    }
    fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

fn bars(opens: &[f64], highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<Bar> {
    (0..closes.len())
        .map(|i| Bar { open: opens[i], high: highs[i], low: lows[i], close: closes[i] })
        .collect()
}

/// Computes all recognised patterns over the candle window, one `+100`/`0`/
/// `-100` entry per bar per pattern.
pub fn compute_patterns(opens: &[f64], highs: &[f64], lows: &[f64], closes: &[f64]) -> HashMap<String, Vec<i32>> {
    let n = closes.len();
    let b = bars(opens, highs, lows, closes);
    let mut out: HashMap<String, Vec<i32>> = HashMap::new();
    for name in [
        "hammer",
        "inverted_hammer",
        "hanging_man",
        "shooting_star",
        "engulfing",
        "morning_star",
        "evening_star",
        "piercing",
        "dark_cloud_cover",
    ] {
        out.insert(name.to_string(), vec![0; n]);
    }

    for i in 0..n {
        let bar = &b[i];
        let small_body = bar.body() <= bar.range() * 0.35;

        // Hammer / hanging man: long lower shadow, small body near the top.
        if small_body && bar.lower_shadow() >= bar.body() * 2.0 && bar.upper_shadow() <= bar.body() * 0.5 {
            if i > 0 && b[i - 1].is_bearish() {
                out.get_mut("hammer").unwrap()[i] = 100;
            }
            if i > 0 && b[i - 1].is_bullish() {
                out.get_mut("hanging_man").unwrap()[i] = -100;
            }
        }

        // Inverted hammer / shooting star: long upper shadow, small body near the bottom.
        if small_body && bar.upper_shadow() >= bar.body() * 2.0 && bar.lower_shadow() <= bar.body() * 0.5 {
            if i > 0 && b[i - 1].is_bearish() {
                out.get_mut("inverted_hammer").unwrap()[i] = 100;
            }
            if i > 0 && b[i - 1].is_bullish() {
                out.get_mut("shooting_star").unwrap()[i] = -100;
            }
        }

        if i >= 1 {
            let prev = &b[i - 1];
            // Bullish/bearish engulfing.
            if prev.is_bearish() && bar.is_bullish() && bar.open <= prev.close && bar.close >= prev.open {
                out.get_mut("engulfing").unwrap()[i] = 100;
            } else if prev.is_bullish() && bar.is_bearish() && bar.open >= prev.close && bar.close <= prev.open {
                out.get_mut("engulfing").unwrap()[i] = -100;
            }

            // Piercing line / dark cloud cover.
            let prev_mid = (prev.open + prev.close) / 2.0;
            if prev.is_bearish() && bar.is_bullish() && bar.open < prev.close && bar.close > prev_mid && bar.close < prev.open {
                out.get_mut("piercing").unwrap()[i] = 100;
            }
            if prev.is_bullish() && bar.is_bearish() && bar.open > prev.close && bar.close < prev_mid && bar.close > prev.open {
                out.get_mut("dark_cloud_cover").unwrap()[i] = -100;
            }
        }

        if i >= 2 {
            let first = &b[i - 2];
            let middle = &b[i - 1];
            let middle_small = middle.body() <= first.body() * 0.35;
            if first.is_bearish() && middle_small && bar.is_bullish() && bar.close > (first.open + first.close) / 2.0 {
                out.get_mut("morning_star").unwrap()[i] = 100;
            }
            if first.is_bullish() && middle_small && bar.is_bearish() && bar.close < (first.open + first.close) / 2.0 {
                out.get_mut("evening_star").unwrap()[i] = -100;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullish_engulfing_is_detected() {
        let opens = vec![10.0, 8.0];
        let closes = vec![9.0, 11.0];
        let highs = vec![10.2, 11.2];
        let lows = vec![8.8, 7.8];
        let out = compute_patterns(&opens, &highs, &lows, &closes);
        assert_eq!(out["engulfing"][1], 100);
    }

    #[test]
    fn hammer_after_down_move_is_bullish() {
        let opens = vec![10.0, 9.0];
        let closes = vec![9.0, 9.3];
        let highs = vec![10.1, 9.4];
        let lows = vec![8.9, 7.5];
        let out = compute_patterns(&opens, &highs, &lows, &closes);
        assert_eq!(out["hammer"][1], 100);
    }
}
