//! PnL and fee arithmetic shared by the signal path and the position
//! monitor. Kept separate from `types::Position` so the
//! monitor can unit-test the maths without a broker or a store.
use broker_core::types::OrderSide;
use rust_decimal::Decimal;

/// `fee_rate = 0` for spread-based venues; otherwise
/// `(entry + exit) * quantity * fee_rate` per close event.
pub fn close_fee(entry_price: Decimal, exit_price: Decimal, quantity: Decimal, fee_rate: Decimal) -> Decimal {
    (entry_price + exit_price) * quantity * fee_rate
}

/// Realised PnL for closing `quantity` of a position at `exit_price`, net
/// of the close fee.
pub fn realized_pnl(side: OrderSide, entry_price: Decimal, exit_price: Decimal, quantity: Decimal, fee_rate: Decimal) -> Decimal {
    let gross = match side {
        OrderSide::Buy => (exit_price - entry_price) * quantity,
        OrderSide::Sell => (entry_price - exit_price) * quantity,
    };
    gross - close_fee(entry_price, exit_price, quantity, fee_rate)
}

/// `|tp - entry| / |entry - stop|` (GLOSSARY R:R).
pub fn risk_reward(entry_price: Decimal, stop_loss: Decimal, take_profit: Decimal) -> Decimal {
    let risk = (entry_price - stop_loss).abs();
    if risk.is_zero() {
        return Decimal::ZERO;
    }
    (take_profit - entry_price).abs() / risk
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn long_profit_is_exit_minus_entry_times_quantity_net_of_fees() {
        let pnl = realized_pnl(OrderSide::Buy, d("100"), d("110"), d("2"), d("0.001"));
        // gross = 20, fee = (100 + 110) * 2 * 0.001 = 0.42
        assert_eq!(pnl, d("19.58"));
    }

    #[test]
    fn short_profit_is_entry_minus_exit_times_quantity() {
        let pnl = realized_pnl(OrderSide::Sell, d("100"), d("90"), d("1"), d("0"));
        assert_eq!(pnl, d("10"));
    }

    #[test]
    fn risk_reward_is_reward_over_risk() {
        let rr = risk_reward(d("100"), d("95"), d("110"));
        assert_eq!(rr, d("2"));
    }

    #[test]
    fn risk_reward_is_zero_when_stop_equals_entry() {
        assert_eq!(risk_reward(d("100"), d("100"), d("110")), Decimal::ZERO);
    }
}
