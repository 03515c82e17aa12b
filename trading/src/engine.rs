//! Execution Engine: the signal path that turns an approved
//! `Signal` into a live or simulated `Order`, persisted through `db::Storage`.
use crate::position::realized_pnl;
use crate::types::{Order, OrderState, TradingMode};
use async_trait::async_trait;
use brokers::BrokerRouter;
use chrono::Utc;
use db::{Storage, StorageExt};
use rust_decimal::Decimal;
use signals::Signal;
use std::sync::Arc;
use util::alerts::{AlertLevel, AlertSink, TracingAlertSink};
use uuid::Uuid;

const ORDERS_TABLE: &str = "orders";

/// Outcome of the Risk Manager's admission check. Kept as a
/// typed enum rather than a bare reason string; `ApprovedReversal` still
/// carries the closing order id that a `REVERSAL:<order_id>` close reason
/// encodes.
#[derive(Debug, Clone)]
pub enum AdmissionDecision {
    Approved,
    ApprovedReversal { closing_order_id: Uuid },
    Rejected { reason: String },
}

/// Implemented by the Risk Manager (`portfolio` crate); kept as a trait here
/// so the engine has no dependency on that crate.
#[async_trait]
pub trait RiskGate: Send + Sync {
    async fn check_entry(&self, signal: &Signal, broker_id: &str) -> AdmissionDecision;

    /// Position size in base units; `<= 0` means the signal is dropped
    /// after admission.
    async fn position_size(&self, signal: &Signal, broker_id: &str, entry_price: Decimal) -> Decimal;

    /// Reconstructs portfolio state for `broker_id`, writing a
    /// `portfolio_snapshots` row as a side effect.
    fn snapshot(&self, broker_id: &str) -> anyhow::Result<()>;
}

pub struct ExecutionEngine {
    pub router: BrokerRouter,
    pub risk: Arc<dyn RiskGate>,
    pub store: Arc<dyn Storage>,
    pub mode: TradingMode,
    pub fee_rate: Decimal,
    /// Fraction of the remaining position closed at TP1 when a TP2 level is
    /// present; `0` disables partial closing and
    /// TP1 instead closes the whole position.
    pub tp1_close_pct: Decimal,
    pub alerts: Arc<dyn AlertSink>,
}

impl ExecutionEngine {
    pub fn new(router: BrokerRouter, risk: Arc<dyn RiskGate>, store: Arc<dyn Storage>, mode: TradingMode, fee_rate: Decimal, tp1_close_pct: Decimal) -> Self {
        Self { router, risk, store, mode, fee_rate, tp1_close_pct, alerts: Arc::new(TracingAlertSink) }
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Routes the signal to its broker, admits it through the risk gate,
    /// sizes and constructs the order, and submits it. Returns the
    /// persisted order, or `None` when the signal was rejected or sized to
    /// nothing.
    pub async fn execute_signal(&self, signal: &Signal, broker_id: &str, signal_id: Uuid) -> crate::error::Result<Option<Order>> {
        let Some(broker) = self.router.get(broker_id) else {
            warn!(broker_id, "execute_signal: unknown broker, dropping signal");
            return Ok(None);
        };

        let Some(direction) = signal.direction else { return Ok(None) };

        let decision = self.risk.check_entry(signal, broker_id).await;
        let closing_order_id = match decision {
            AdmissionDecision::Rejected { reason } => {
                info!(symbol = %signal.symbol, reason, "signal rejected by risk manager");
                return Ok(None);
            }
            AdmissionDecision::Approved => None,
            AdmissionDecision::ApprovedReversal { closing_order_id } => Some(closing_order_id),
        };

        if let Some(old_id) = closing_order_id {
            if let Err(err) = self.close_for_reversal(&*broker, old_id).await {
                warn!(%err, order_id = %old_id, "failed to close position for reversal, continuing with new entry");
            }
        }

        let Some(entry_price) = signal.entry_price else { return Ok(None) };
        let Some(stop_loss) = signal.stop_loss else { return Ok(None) };
        let Some(take_profit_1) = signal.take_profit_1 else { return Ok(None) };

        let quantity = self.risk.position_size(signal, broker_id, entry_price).await;
        if quantity <= Decimal::ZERO {
            info!(symbol = %signal.symbol, "position size non-positive, dropping signal");
            return Ok(None);
        }

        let side: broker_core::types::OrderSide = direction.into();
        let mut order = Order {
            id: Uuid::new_v4(),
            broker_id: broker_id.to_string(),
            symbol: signal.symbol.clone(),
            timeframe: signal.timeframe,
            side,
            state: OrderState::Pending,
            entry_price,
            stop_loss,
            take_profit_1,
            take_profit_2: signal.take_profit_2,
            take_profit_3: signal.take_profit_3,
            quantity,
            remaining_quantity: quantity,
            tp_stage: 0,
            sl_trail_stage: 0,
            tp1_close_pct: self.tp1_close_pct,
            venue_order_id: None,
            venue_stop_order_id: None,
            realized_pnl: Decimal::ZERO,
            signal_id: Some(signal_id),
            opened_at: Utc::now(),
            closed_at: None,
        };

        match self.mode {
            TradingMode::Dev => {
                info!(symbol = %signal.symbol, %quantity, "dev mode: would submit order, not persisting");
                return Ok(None);
            }
            TradingMode::Paper => {
                order.venue_order_id = Some(format!("paper-{}", order.id));
                order.transition(OrderState::Submitted);
            }
            TradingMode::Live => {
                match broker.create_limit_order(&order.symbol, side, quantity, entry_price).await {
                    Ok(ack) => {
                        order.venue_order_id = Some(ack.venue_order_id);
                        match broker.create_stop_order(&order.symbol, side.opposite(), quantity, stop_loss).await {
                            Ok(stop_ack) => {
                                order.venue_stop_order_id = Some(stop_ack.venue_order_id);
                                order.transition(OrderState::Submitted);
                            }
                            Err(err) => {
                                order.transition(OrderState::Error);
                                error!(%err, symbol = %signal.symbol, "protective stop submission failed");
                            }
                        }
                    }
                    Err(err) => {
                        order.transition(OrderState::Error);
                        error!(%err, symbol = %signal.symbol, "entry order submission failed");
                    }
                }
            }
        }

        self.persist(&order)?;
        if order.state == OrderState::Error {
            self.alerts.send(AlertLevel::Warning, &format!("order {} for {} entered Error state", order.id, order.symbol));
            return Ok(None);
        }
        info!(order_id = %order.id, symbol = %order.symbol, %quantity, "order opened");
        self.alerts.send(AlertLevel::Info, &format!("opened {:?} {} qty {quantity} @ {entry_price}", direction, order.symbol));
        Ok(Some(order))
    }

    async fn close_for_reversal(&self, broker: &(dyn brokers::Broker), old_order_id: Uuid) -> crate::error::Result<()> {
        let mut order: Order = self.store.get(ORDERS_TABLE, &old_order_id.to_string())?;
        let ticker = broker.fetch_ticker(&order.symbol).await?;
        let mid = (ticker.bid + ticker.ask) / Decimal::from(2);
        let pnl = realized_pnl(order.side, order.entry_price, mid, order.remaining_quantity, self.fee_rate);
        order.realized_pnl += pnl;
        order.remaining_quantity = Decimal::ZERO;
        order.transition(OrderState::Closed);
        self.persist(&order)?;
        info!(order_id = %order.id, realized_pnl = %pnl, "position closed for reversal");
        self.alerts.send(AlertLevel::Info, &format!("closed {} for reversal, pnl {pnl}", order.symbol));
        Ok(())
    }

    fn persist(&self, order: &Order) -> crate::error::Result<()> {
        self.store.ensure_table(ORDERS_TABLE)?;
        self.store.put(ORDERS_TABLE, &order.id.to_string(), order)?;
        Ok(())
    }
}

trait OrderSideExt {
    fn opposite(self) -> broker_core::types::OrderSide;
}

impl OrderSideExt for broker_core::types::OrderSide {
    fn opposite(self) -> broker_core::types::OrderSide {
        match self {
            broker_core::types::OrderSide::Buy => broker_core::types::OrderSide::Sell,
            broker_core::types::OrderSide::Sell => broker_core::types::OrderSide::Buy,
        }
    }
}

impl From<signals::SignalDirection> for broker_core::types::OrderSide {
    fn from(direction: signals::SignalDirection) -> Self {
        match direction {
            signals::SignalDirection::Long => broker_core::types::OrderSide::Buy,
            signals::SignalDirection::Short => broker_core::types::OrderSide::Sell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_core::types::{Balance, Candle, OrderAck, OrderSide, Ticker};
    use signals::SignalDirection;
    use std::str::FromStr;
    use std::sync::Mutex;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct MockBroker {
        id: String,
        mid: Decimal,
    }

    #[async_trait]
    impl brokers::Broker for MockBroker {
        fn broker_id(&self) -> &str {
            &self.id
        }

        async fn fetch_ohlcv(&self, _symbol: &str, _timeframe: broker_core::types::Timeframe, _limit: usize) -> broker_core::error::Result<Vec<Candle>> {
            Ok(vec![])
        }

        async fn fetch_ticker(&self, _symbol: &str) -> broker_core::error::Result<Ticker> {
            Ok(Ticker { last: self.mid, bid: self.mid, ask: self.mid })
        }

        async fn fetch_balance(&self, _currency: &str) -> broker_core::error::Result<Balance> {
            Ok(Balance { total: d("10000"), free: d("10000"), used: Decimal::ZERO })
        }

        async fn create_limit_order(&self, _symbol: &str, _side: OrderSide, _quantity: Decimal, _price: Decimal) -> broker_core::error::Result<OrderAck> {
            unreachable!("paper mode never calls the adapter")
        }

        async fn create_stop_order(&self, _symbol: &str, _side: OrderSide, _quantity: Decimal, _stop_price: Decimal) -> broker_core::error::Result<OrderAck> {
            unreachable!("paper mode never calls the adapter")
        }

        async fn cancel_order(&self, _symbol: &str, _venue_order_id: &str) -> broker_core::error::Result<()> {
            Ok(())
        }

        async fn check_connectivity(&self) -> broker_core::error::Result<()> {
            Ok(())
        }

        async fn close(&self) -> broker_core::error::Result<()> {
            Ok(())
        }
    }

    /// A `RiskGate` whose decision is scripted per test and which records
    /// the size requested.
    struct ScriptedRisk {
        decision: Mutex<Option<AdmissionDecision>>,
        size: Decimal,
    }

    #[async_trait]
    impl RiskGate for ScriptedRisk {
        async fn check_entry(&self, _signal: &signals::Signal, _broker_id: &str) -> AdmissionDecision {
            self.decision.lock().unwrap().take().unwrap_or(AdmissionDecision::Rejected { reason: "no decision scripted".into() })
        }

        async fn position_size(&self, _signal: &signals::Signal, _broker_id: &str, _entry_price: Decimal) -> Decimal {
            self.size
        }

        fn snapshot(&self, _broker_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn long_signal() -> signals::Signal {
        let mut s = signals::Signal::none("BTCUSDT", broker_core::types::Timeframe::H1);
        s.divergence_detected = true;
        s.direction = Some(SignalDirection::Short);
        s.entry_price = Some(d("102"));
        s.stop_loss = Some(d("108"));
        s.take_profit_1 = Some(d("90"));
        s.confidence = 0.8;
        s
    }

    fn existing_long_order(id: Uuid) -> Order {
        Order {
            id,
            broker_id: "binance".into(),
            symbol: "BTCUSDT".into(),
            timeframe: broker_core::types::Timeframe::H1,
            side: OrderSide::Buy,
            state: OrderState::Filled,
            entry_price: d("100"),
            stop_loss: d("95"),
            take_profit_1: d("110"),
            take_profit_2: None,
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

    /// An opposite-direction signal on an already-positioned symbol closes
    /// the existing order at the current ticker midpoint with fee-net PnL,
    /// then opens the new one; exactly two orders remain.
    #[tokio::test]
    async fn reversal_closes_old_position_and_opens_new_one() {
        let mut router = BrokerRouter::new();
        router.register(Arc::new(MockBroker { id: "binance".into(), mid: d("102") }));

        let store: Arc<dyn Storage> = Arc::new(db::MemoryKVStore::new());
        let old_id = Uuid::new_v4();
        let old_order = existing_long_order(old_id);
        store.ensure_table(ORDERS_TABLE).unwrap();
        store.put(ORDERS_TABLE, &old_id.to_string(), &old_order).unwrap();

        let risk = Arc::new(ScriptedRisk {
            decision: Mutex::new(Some(AdmissionDecision::ApprovedReversal { closing_order_id: old_id })),
            size: d("8"),
        });

        let engine = ExecutionEngine::new(router, risk, store.clone(), TradingMode::Paper, Decimal::ZERO, Decimal::ZERO);

        let new_order = engine.execute_signal(&long_signal(), "binance", Uuid::new_v4()).await.unwrap();
        let new_order = new_order.expect("reversal entry should open a new order");
        assert_eq!(new_order.side, OrderSide::Sell);
        assert_eq!(new_order.quantity, d("8"));
        assert_eq!(new_order.state, OrderState::Submitted);

        let closed: Order = store.get(ORDERS_TABLE, &old_id.to_string()).unwrap();
        assert_eq!(closed.state, OrderState::Closed);
        assert_eq!(closed.remaining_quantity, Decimal::ZERO);
        assert_eq!(closed.realized_pnl, d("20"), "(102 - 100) * 10 with zero fees");

        let all: Vec<(String, Order)> = store.get_all(ORDERS_TABLE).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn rejected_admission_opens_nothing() {
        let mut router = BrokerRouter::new();
        router.register(Arc::new(MockBroker { id: "binance".into(), mid: d("102") }));
        let store: Arc<dyn Storage> = Arc::new(db::MemoryKVStore::new());
        let risk = Arc::new(ScriptedRisk {
            decision: Mutex::new(Some(AdmissionDecision::Rejected { reason: "daily breaker tripped".into() })),
            size: d("8"),
        });
        let engine = ExecutionEngine::new(router, risk, store, TradingMode::Paper, Decimal::ZERO, Decimal::ZERO);
        let result = engine.execute_signal(&long_signal(), "binance", Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn zero_size_drops_signal_after_approval() {
        let mut router = BrokerRouter::new();
        router.register(Arc::new(MockBroker { id: "binance".into(), mid: d("102") }));
        let store: Arc<dyn Storage> = Arc::new(db::MemoryKVStore::new());
        let risk = Arc::new(ScriptedRisk { decision: Mutex::new(Some(AdmissionDecision::Approved)), size: Decimal::ZERO });
        let engine = ExecutionEngine::new(router, risk, store, TradingMode::Paper, Decimal::ZERO, Decimal::ZERO);
        let result = engine.execute_signal(&long_signal(), "binance", Uuid::new_v4()).await.unwrap();
        assert!(result.is_none());
    }
}
