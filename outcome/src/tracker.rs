//! Outcome Tracker: asynchronous, closed-loop forward
//! observation of every signal that received a validated entry/stop/target
//! set, independent of whether a position was actually opened for it.
use crate::error::Result;
use crate::types::{SignalOutcome, Verdict};
use broker_core::types::{Candle, Timeframe};
use broker_core::Broker;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use db::{Storage, StorageExt};
use itertools::Itertools;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use signals::SignalDirection;
use std::collections::HashMap;
use std::sync::Arc;

pub const OUTCOMES_TABLE: &str = "signal_outcomes";

/// A checkpoint horizon measured from `signal_created_at`.
#[derive(Debug, Clone, Copy)]
enum Checkpoint {
    H1,
    H4,
    H12,
    H24,
}

impl Checkpoint {
    fn hours(self) -> i64 {
        match self {
            Checkpoint::H1 => 1,
            Checkpoint::H4 => 4,
            Checkpoint::H12 => 12,
            Checkpoint::H24 => 24,
        }
    }

    const ALL: [Checkpoint; 4] = [Checkpoint::H1, Checkpoint::H4, Checkpoint::H12, Checkpoint::H24];
}

/// 0.5% either side of breakeven is noise; outside that band the 24h return
/// decides correct vs incorrect (mirrors the Python tracker's thresholds).
const CORRECT_THRESHOLD_PCT: f64 = 0.5;
const INCORRECT_THRESHOLD_PCT: f64 = -0.5;

pub struct OutcomeTracker {
    storage: Arc<dyn Storage>,
}

impl OutcomeTracker {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        storage.ensure_table(OUTCOMES_TABLE).expect("outcome table must be creatable");
        Self { storage }
    }

    /// Inserts a pending outcome row for every signal that doesn't have one
    /// yet. Callers pass in the signals eligible for tracking (validated,
    /// with a concrete entry price); signals without an entry price never
    /// get an outcome row since there is nothing to measure return against.
    pub fn create_missing_outcomes(&self, candidates: &[SignalOutcome]) -> Result<usize> {
        let mut created = 0;
        for candidate in candidates {
            let key = candidate.signal_id.to_string();
            if self.storage.get::<SignalOutcome>(OUTCOMES_TABLE, &key).is_ok() {
                continue;
            }
            self.storage.put(OUTCOMES_TABLE, &key, candidate)?;
            created += 1;
        }
        Ok(created)
    }

    fn unresolved(&self) -> Result<Vec<SignalOutcome>> {
        Ok(self
            .storage
            .get_all::<SignalOutcome>(OUTCOMES_TABLE)?
            .into_iter()
            .map(|(_, v)| v)
            .filter(|o| !o.fully_resolved)
            .collect())
    }

    /// Groups unresolved outcomes by symbol, pulls one bounded batch of 1h
    /// candles per symbol covering the oldest signal in that group through
    /// now, then updates each outcome's checkpoints, MFE/MAE, TP/SL hits and
    /// verdict.
    pub async fn update_unresolved_outcomes(&self, broker: &dyn Broker, now: DateTime<Utc>) -> Result<usize> {
        let unresolved = self.unresolved()?;
        let mut updated = 0;

        let grouped: HashMap<String, Vec<SignalOutcome>> =
            unresolved.into_iter().into_group_map_by(|o| o.symbol.clone());

        for (symbol, outcomes) in grouped {
            let oldest = outcomes.iter().map(|o| o.signal_created_at).min().unwrap_or(now);
            let hours_needed = (now - oldest).num_hours() + 2;
            let candle_limit = hours_needed.clamp(1, 500) as usize;

            let candles = broker.fetch_ohlcv(&symbol, Timeframe::H1, candle_limit).await?;

            for mut outcome in outcomes {
                let relevant: Vec<&Candle> = candles.iter().filter(|c| c.open_time > outcome.signal_created_at).collect();
                if relevant.is_empty() {
                    continue;
                }
                if Self::process_single_outcome(&mut outcome, &relevant, now) {
                    updated += 1;
                }
                self.storage.put(OUTCOMES_TABLE, &outcome.signal_id.to_string(), &outcome)?;
            }
        }

        Ok(updated)
    }

    /// Returns true if anything about the outcome changed.
    fn process_single_outcome(outcome: &mut SignalOutcome, candles: &[&Candle], now: DateTime<Utc>) -> bool {
        let mut changed = false;

        for checkpoint in Checkpoint::ALL {
            if Self::checkpoint_already_filled(outcome, checkpoint) {
                continue;
            }
            let target = outcome.signal_created_at + ChronoDuration::hours(checkpoint.hours());
            if now < target {
                continue;
            }
            if let Some(candle) = Self::find_closest_candle(candles, target) {
                let price = candle.close;
                let ret = Self::pct_return(outcome.entry_price, price, outcome.direction);
                Self::fill_checkpoint(outcome, checkpoint, price, ret);
                changed = true;
            }
        }

        for candle in candles {
            changed |= Self::accumulate_extremes(outcome, candle);
            changed |= Self::check_tp_sl(outcome, candle);
        }

        let new_verdict = Self::compute_verdict(outcome);
        if new_verdict != outcome.verdict {
            outcome.verdict = new_verdict;
            changed = true;
        }

        let elapsed = now - outcome.signal_created_at;
        let should_resolve = elapsed >= ChronoDuration::hours(24);
        if should_resolve && !outcome.fully_resolved {
            outcome.fully_resolved = true;
            changed = true;
        }

        changed
    }

    fn checkpoint_already_filled(outcome: &SignalOutcome, checkpoint: Checkpoint) -> bool {
        match checkpoint {
            Checkpoint::H1 => outcome.price_1h.is_some(),
            Checkpoint::H4 => outcome.price_4h.is_some(),
            Checkpoint::H12 => outcome.price_12h.is_some(),
            Checkpoint::H24 => outcome.price_24h.is_some(),
        }
    }

    fn fill_checkpoint(outcome: &mut SignalOutcome, checkpoint: Checkpoint, price: Decimal, ret: Decimal) {
        match checkpoint {
            Checkpoint::H1 => {
                outcome.price_1h = Some(price);
                outcome.return_1h = Some(ret);
            }
            Checkpoint::H4 => {
                outcome.price_4h = Some(price);
                outcome.return_4h = Some(ret);
            }
            Checkpoint::H12 => {
                outcome.price_12h = Some(price);
                outcome.return_12h = Some(ret);
            }
            Checkpoint::H24 => {
                outcome.price_24h = Some(price);
                outcome.return_24h = Some(ret);
            }
        }
    }

    /// The candle whose open time is nearest the target timestamp, on either side.
    fn find_closest_candle<'a>(candles: &[&'a Candle], target: DateTime<Utc>) -> Option<&'a Candle> {
        candles
            .iter()
            .min_by_key(|c| (c.open_time - target).num_seconds().abs())
            .copied()
    }

    fn pct_return(entry: Decimal, price: Decimal, direction: SignalDirection) -> Decimal {
        if entry.is_zero() {
            return Decimal::ZERO;
        }
        ((price - entry) / entry) * Decimal::ONE_HUNDRED * direction.sign()
    }

    /// Tracks the best (MFE) and worst (MAE) excursion seen so far; both are
    /// monotonic — once recorded they only ever improve/worsen, never reset.
    fn accumulate_extremes(outcome: &mut SignalOutcome, candle: &Candle) -> bool {
        let (favorable_price, adverse_price) = match outcome.direction {
            SignalDirection::Long => (candle.high, candle.low),
            SignalDirection::Short => (candle.low, candle.high),
        };
        let favorable_pct = Self::pct_return(outcome.entry_price, favorable_price, outcome.direction);
        let adverse_pct = Self::pct_return(outcome.entry_price, adverse_price, outcome.direction);

        let mut changed = false;
        let improves_favorable = match outcome.max_favorable_pct {
            Some(cur) => favorable_pct > cur,
            None => true,
        };
        if improves_favorable {
            outcome.max_favorable_price = Some(favorable_price);
            outcome.max_favorable_pct = Some(favorable_pct);
            changed = true;
        }
        let worsens_adverse = match outcome.max_adverse_pct {
            Some(cur) => adverse_pct < cur,
            None => true,
        };
        if worsens_adverse {
            outcome.max_adverse_price = Some(adverse_price);
            outcome.max_adverse_pct = Some(adverse_pct);
            changed = true;
        }
        changed
    }

    /// TP/SL hits are sticky: once a candle's range crosses a level the flag
    /// latches for good, even if price later reverses past it.
    fn check_tp_sl(outcome: &mut SignalOutcome, candle: &Candle) -> bool {
        let mut changed = false;
        let crosses = |level: Decimal| match outcome.direction {
            SignalDirection::Long => candle.high >= level,
            SignalDirection::Short => candle.low <= level,
        };
        let crosses_against = |level: Decimal| match outcome.direction {
            SignalDirection::Long => candle.low <= level,
            SignalDirection::Short => candle.high >= level,
        };

        if !outcome.tp1_hit {
            if let Some(tp1) = outcome.take_profit_1 {
                if crosses(tp1) {
                    outcome.tp1_hit = true;
                    outcome.tp1_hit_at = Some(candle.open_time);
                    changed = true;
                }
            }
        }
        if !outcome.tp2_hit {
            if let Some(tp2) = outcome.take_profit_2 {
                if crosses(tp2) {
                    outcome.tp2_hit = true;
                    outcome.tp2_hit_at = Some(candle.open_time);
                    changed = true;
                }
            }
        }
        if !outcome.tp3_hit {
            if let Some(tp3) = outcome.take_profit_3 {
                if crosses(tp3) {
                    outcome.tp3_hit = true;
                    outcome.tp3_hit_at = Some(candle.open_time);
                    changed = true;
                }
            }
        }
        if !outcome.sl_hit {
            if let Some(sl) = outcome.stop_loss {
                if crosses_against(sl) {
                    outcome.sl_hit = true;
                    outcome.sl_hit_at = Some(candle.open_time);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Verdict precedence: TP1 and SL both hit is `partial`
    /// (target reached before stop, but stop eventually came back); TP1
    /// alone is `correct`; SL alone is `incorrect`; otherwise fall back to
    /// the 24h return against the noise band, else stay `pending`.
    fn compute_verdict(outcome: &SignalOutcome) -> Verdict {
        if outcome.tp1_hit && outcome.sl_hit {
            return Verdict::Partial;
        }
        if outcome.tp1_hit {
            return Verdict::Correct;
        }
        if outcome.sl_hit {
            return Verdict::Incorrect;
        }
        if let Some(ret_24h) = outcome.return_24h {
            let ret = ret_24h.to_f64().unwrap_or(0.0);
            return if ret >= CORRECT_THRESHOLD_PCT {
                Verdict::Correct
            } else if ret <= INCORRECT_THRESHOLD_PCT {
                Verdict::Incorrect
            } else {
                Verdict::Partial
            };
        }
        Verdict::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::MemoryKVStore;
    use uuid::Uuid;

    fn candle(hour: i64, open: &str, high: &str, low: &str, close: &str) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::hours(hour),
            open: open.parse().unwrap(),
            high: high.parse().unwrap(),
            low: low.parse().unwrap(),
            close: close.parse().unwrap(),
            volume: Decimal::ONE,
        }
    }

    fn base_outcome() -> SignalOutcome {
        let mut o = SignalOutcome::new(
            Uuid::new_v4(),
            "BTCUSDT",
            SignalDirection::Long,
            Decimal::from(100),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        );
        o.take_profit_1 = Some(Decimal::from(110));
        o.stop_loss = Some(Decimal::from(95));
        o
    }

    #[test]
    fn accumulates_favorable_and_adverse_extremes() {
        let mut o = base_outcome();
        OutcomeTracker::accumulate_extremes(&mut o, &candle(1, "100", "105", "98", "102"));
        OutcomeTracker::accumulate_extremes(&mut o, &candle(2, "102", "103", "90", "95"));
        assert_eq!(o.max_favorable_price, Some(Decimal::from(105)));
        assert_eq!(o.max_adverse_price, Some(Decimal::from(90)));
    }

    #[test]
    fn tp_hit_is_sticky_even_after_price_recovers() {
        let mut o = base_outcome();
        OutcomeTracker::check_tp_sl(&mut o, &candle(1, "100", "111", "100", "105"));
        assert!(o.tp1_hit);
        OutcomeTracker::check_tp_sl(&mut o, &candle(2, "105", "106", "104", "105"));
        assert!(o.tp1_hit, "tp1 flag must not reset once set");
    }

    #[test]
    fn tp1_and_sl_both_hit_is_partial() {
        let mut o = base_outcome();
        o.tp1_hit = true;
        o.sl_hit = true;
        assert_eq!(OutcomeTracker::compute_verdict(&o), Verdict::Partial);
    }

    #[test]
    fn falls_back_to_24h_return_band_when_no_levels_hit() {
        let mut o = base_outcome();
        o.return_24h = Some(Decimal::from(1));
        assert_eq!(OutcomeTracker::compute_verdict(&o), Verdict::Correct);

        o.return_24h = Some(Decimal::from(-1));
        assert_eq!(OutcomeTracker::compute_verdict(&o), Verdict::Incorrect);

        o.return_24h = Some(Decimal::ZERO);
        assert_eq!(OutcomeTracker::compute_verdict(&o), Verdict::Partial);
    }

    #[test]
    fn find_closest_candle_picks_nearest_timestamp() {
        let candles = vec![candle(1, "1", "1", "1", "1"), candle(3, "1", "1", "1", "1"), candle(5, "1", "1", "1", "1")];
        let refs: Vec<&Candle> = candles.iter().collect();
        let target = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::hours(4);
        let closest = OutcomeTracker::find_closest_candle(&refs, target).unwrap();
        assert_eq!(closest.open_time, candles[2].open_time);
    }

    #[test]
    fn create_missing_outcomes_skips_existing_rows() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryKVStore::new());
        let tracker = OutcomeTracker::new(storage);
        let o = base_outcome();
        assert_eq!(tracker.create_missing_outcomes(&[o.clone()]).unwrap(), 1);
        assert_eq!(tracker.create_missing_outcomes(&[o]).unwrap(), 0);
    }
}
