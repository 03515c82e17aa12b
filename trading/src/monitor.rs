//! Position monitor: runs at a cadence at least twice as
//! fast as the analysis cycle, driving every non-terminal order through
//! fill confirmation, trailing-stop progression, and TP/SL-triggered closes.
use crate::position::realized_pnl;
use crate::types::{Order, OrderState, TradingMode};
use brokers::BrokerRouter;
use chrono::Utc;
use db::{Storage, StorageExt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use util::alerts::{AlertLevel, AlertSink, TracingAlertSink};

const ORDERS_TABLE: &str = "orders";

pub struct PositionMonitor {
    pub router: BrokerRouter,
    pub store: Arc<dyn Storage>,
    pub mode: TradingMode,
    pub fee_rate: Decimal,
    pub alerts: Arc<dyn AlertSink>,
}

impl PositionMonitor {
    pub fn new(router: BrokerRouter, store: Arc<dyn Storage>, mode: TradingMode, fee_rate: Decimal) -> Self {
        Self { router, store, mode, fee_rate, alerts: Arc::new(TracingAlertSink) }
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    fn non_terminal_orders(&self) -> crate::error::Result<Vec<Order>> {
        Ok(self
            .store
            .get_all::<Order>(ORDERS_TABLE)?
            .into_iter()
            .map(|(_, o)| o)
            .filter(|o| !o.state.is_terminal())
            .collect())
    }

    /// One monitor pass: fetch each distinct symbol's ticker once, then
    /// drive every open order through fill confirmation and trailing logic.
    pub async fn run(&self) -> crate::error::Result<usize> {
        let mut orders = self.non_terminal_orders()?;
        if orders.is_empty() {
            return Ok(0);
        }

        let mut tickers: HashMap<(String, String), rust_decimal::Decimal> = HashMap::new();
        for order in &orders {
            let key = (order.broker_id.clone(), order.symbol.clone());
            if tickers.contains_key(&key) {
                continue;
            }
            let Some(broker) = self.router.get(&order.broker_id) else { continue };
            match broker.fetch_ticker(&order.symbol).await {
                Ok(ticker) => {
                    tickers.insert(key, ticker.last);
                }
                Err(err) => warn!(%err, symbol = %order.symbol, "position monitor: ticker fetch failed, skipping symbol this pass"),
            }
        }

        let mut touched = 0;
        for order in orders.iter_mut() {
            let key = (order.broker_id.clone(), order.symbol.clone());
            let Some(&current) = tickers.get(&key) else { continue };
            if self.step(order, current) {
                touched += 1;
                self.store.put(ORDERS_TABLE, &order.id.to_string(), order)?;
            }
        }
        Ok(touched)
    }

    /// Advances a single order one monitor tick. Returns true if the order
    /// was mutated (and so needs to be persisted).
    fn step(&self, order: &mut Order, current: Decimal) -> bool {
        if order.state == OrderState::Submitted {
            order.transition(OrderState::Filled);
            return true;
        }
        if order.state != OrderState::Filled {
            return false;
        }

        match order.tp_stage {
            0 => self.step_stage0(order, current),
            _ => self.step_stage1(order, current),
        }
    }

    fn progress(order: &Order, current: Decimal, target: Decimal) -> Decimal {
        let denom = target - order.entry_price;
        if denom.is_zero() {
            return Decimal::ZERO;
        }
        let raw = (current - order.entry_price) / denom;
        if order.is_long() {
            raw
        } else {
            -raw
        }
    }

    fn is_sl_hit(order: &Order, current: Decimal) -> bool {
        if order.is_long() {
            current <= order.stop_loss
        } else {
            current >= order.stop_loss
        }
    }

    fn is_tp_hit(order: &Order, current: Decimal, level: Decimal) -> bool {
        if order.is_long() {
            current >= level
        } else {
            current <= level
        }
    }

    fn close_remaining(&self, order: &mut Order, exit_price: Decimal) {
        let pnl = realized_pnl(order.side, order.entry_price, exit_price, order.remaining_quantity, self.fee_rate);
        order.realized_pnl += pnl;
        order.remaining_quantity = Decimal::ZERO;
        order.transition(OrderState::Closed);
        info!(order_id = %order.id, realized_pnl = %pnl, "position closed");
        self.alerts.send(AlertLevel::Info, &format!("closed {} {:?} pnl {pnl}", order.symbol, order.side));
    }

    /// Full position, pre-TP1.
    fn step_stage0(&self, order: &mut Order, current: Decimal) -> bool {
        if Self::is_sl_hit(order, current) {
            self.close_remaining(order, current);
            return true;
        }

        // Pre-TP1 trailing only applies when partial closes are disabled
        // (tp1_close_pct == 0); otherwise TP1 itself carries the first
        // protective move to breakeven.
        let mut changed = false;
        if order.tp1_close_pct.is_zero() {
            let progress = Self::progress(order, current, order.take_profit_1);
            if progress >= Decimal::new(50, 2) && order.sl_trail_stage < 1 {
                order.stop_loss = order.entry_price;
                order.sl_trail_stage = 1;
                changed = true;
                info!(order_id = %order.id, "trailing stop moved to breakeven");
            }
            if progress >= Decimal::new(75, 2) && order.sl_trail_stage < 2 {
                let offset = Decimal::new(25, 2) * (order.take_profit_1 - order.entry_price);
                order.stop_loss = order.entry_price + offset;
                order.sl_trail_stage = 2;
                changed = true;
                info!(order_id = %order.id, "trailing stop advanced past breakeven");
            }
        }

        if Self::is_tp_hit(order, current, order.take_profit_1) {
            if order.tp1_close_pct > Decimal::ZERO && order.take_profit_2.is_some() {
                let close_qty = order.tp1_close_pct * order.remaining_quantity;
                let pnl = realized_pnl(order.side, order.entry_price, current, close_qty, self.fee_rate);
                order.realized_pnl += pnl;
                order.remaining_quantity -= close_qty;
                order.stop_loss = order.entry_price;
                order.tp_stage = 1;
                info!(order_id = %order.id, %close_qty, "partial close at take-profit 1");
                self.alerts.send(AlertLevel::Info, &format!("partial close {} qty {close_qty} at tp1, breakeven set", order.symbol));
            } else {
                self.close_remaining(order, current);
            }
            return true;
        }

        changed
    }

    /// Runner toward TP2, after a partial TP1 close.
    fn step_stage1(&self, order: &mut Order, current: Decimal) -> bool {
        if Self::is_sl_hit(order, current) {
            self.close_remaining(order, current);
            return true;
        }

        let Some(tp2) = order.take_profit_2 else { return false };

        let mut changed = false;
        let progress = Self::progress(order, current, tp2);
        let improves = |new_sl: Decimal, order: &Order| if order.is_long() { new_sl > order.stop_loss } else { new_sl < order.stop_loss };

        if progress >= Decimal::new(50, 2) {
            let candidate = order.take_profit_1;
            if improves(candidate, order) {
                order.stop_loss = candidate;
                changed = true;
            }
        }
        if progress >= Decimal::new(75, 2) {
            let offset = Decimal::new(25, 2) * (tp2 - order.take_profit_1);
            let candidate = order.take_profit_1 + offset;
            if improves(candidate, order) {
                order.stop_loss = candidate;
                changed = true;
            }
        }

        if Self::is_tp_hit(order, current, tp2) {
            self.close_remaining(order, current);
            return true;
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::types::{OrderSide, Timeframe};
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn long_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            broker_id: "binance".into(),
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::H1,
            side: OrderSide::Buy,
            state: OrderState::Filled,
            entry_price: d("100"),
            stop_loss: d("95"),
            take_profit_1: d("110"),
            take_profit_2: Some(d("120")),
            take_profit_3: None,
            quantity: d("10"),
            remaining_quantity: d("10"),
            tp_stage: 0,
            sl_trail_stage: 0,
            tp1_close_pct: Decimal::ZERO,
            venue_order_id: Some("x".into()),
            venue_stop_order_id: None,
            realized_pnl: Decimal::ZERO,
            signal_id: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    fn monitor() -> PositionMonitor {
        PositionMonitor::new(BrokerRouter::new(), Arc::new(db::MemoryKVStore::new()), TradingMode::Paper, Decimal::ZERO)
    }

    #[test]
    fn submitted_order_transitions_to_filled_on_first_tick() {
        let mon = monitor();
        let mut order = long_order();
        order.state = OrderState::Submitted;
        assert!(mon.step(&mut order, d("100")));
        assert_eq!(order.state, OrderState::Filled);
    }

    #[test]
    fn moves_stop_to_breakeven_at_half_progress_to_tp1() {
        let mon = monitor();
        let mut order = long_order();
        assert!(mon.step(&mut order, d("105")));
        assert_eq!(order.stop_loss, d("100"));
        assert_eq!(order.sl_trail_stage, 1);
    }

    #[test]
    fn stop_loss_hit_closes_full_position() {
        let mon = monitor();
        let mut order = long_order();
        assert!(mon.step(&mut order, d("94")));
        assert_eq!(order.state, OrderState::Closed);
        assert_eq!(order.remaining_quantity, Decimal::ZERO);
    }

    #[test]
    fn tp1_hit_without_partial_close_config_closes_everything() {
        let mon = monitor();
        let mut order = long_order();
        assert!(mon.step(&mut order, d("111")));
        assert_eq!(order.state, OrderState::Closed);
    }

    #[test]
    fn tp1_hit_with_partial_close_configured_leaves_runner_open() {
        let mon = monitor();
        let mut order = long_order();
        order.tp1_close_pct = d("0.5");
        assert!(mon.step(&mut order, d("111")));
        assert_eq!(order.state, OrderState::Filled);
        assert_eq!(order.tp_stage, 1);
        assert_eq!(order.remaining_quantity, d("5"));
        assert_eq!(order.stop_loss, d("100"));
    }

    #[test]
    fn stage1_trailing_stop_never_moves_backward() {
        let mon = monitor();
        let mut order = long_order();
        order.tp_stage = 1;
        order.remaining_quantity = d("5");
        order.stop_loss = d("112");
        mon.step(&mut order, d("113"));
        assert_eq!(order.stop_loss, d("112"), "candidate of 110 is worse than the existing 112 floor and must not replace it");
    }

    #[test]
    fn stage1_trailing_stop_advances_toward_tp2() {
        let mon = monitor();
        let mut order = long_order();
        order.tp_stage = 1;
        order.remaining_quantity = d("5");
        order.stop_loss = d("100");
        assert!(mon.step(&mut order, d("113")));
        assert_eq!(order.stop_loss, d("110"));
    }
}
