//! Risk Manager: admission control, position sizing, circuit breakers, and
//! portfolio reconstruction. Portfolio state is never held
//! canonically in memory — every check starts from `get_portfolio_state`,
//! which replays the orders ledger.
use crate::error::Result;
use crate::types::{quote_to_aud_rate, CircuitBreakerState, PortfolioState, RiskConfig};
use async_trait::async_trait;
use broker_core::instrument::{AssetClass, InstrumentRegistry};
use broker_core::types::OrderSide;
use chrono::Utc;
use db::{Storage, StorageExt};
use metrics::Metrics;
use rust_decimal::Decimal;
use signals::Signal;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use trading::engine::{AdmissionDecision, RiskGate};
use trading::types::{Order, OrderState, Position};
use util::alerts::{AlertLevel, AlertSink, TracingAlertSink};

const ORDERS_TABLE: &str = "orders";
const BREAKERS_TABLE: &str = "circuit_breaker_state";
const BREAKER_EVENTS_TABLE: &str = "circuit_breaker_events";
const SNAPSHOTS_TABLE: &str = "portfolio_snapshots";
const PEAK_EQUITY_TABLE: &str = "portfolio_peak_equity";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CircuitBreakerEvent {
    broker_id: String,
    kind: &'static str,
    at: chrono::DateTime<Utc>,
    detail: String,
}

pub struct RiskManager {
    store: Arc<dyn Storage>,
    instruments: Arc<InstrumentRegistry>,
    config: RiskConfig,
    breakers: RwLock<std::collections::HashMap<String, CircuitBreakerState>>,
    alerts: Arc<dyn AlertSink>,
    metrics: Option<Arc<Metrics>>,
}

impl RiskManager {
    pub fn new(store: Arc<dyn Storage>, instruments: Arc<InstrumentRegistry>, config: RiskConfig) -> Result<Self> {
        for table in [ORDERS_TABLE, BREAKERS_TABLE, BREAKER_EVENTS_TABLE, SNAPSHOTS_TABLE, PEAK_EQUITY_TABLE] {
            store.ensure_table(table)?;
        }
        Ok(Self {
            store,
            instruments,
            config,
            breakers: RwLock::new(std::collections::HashMap::new()),
            alerts: Arc::new(TracingAlertSink),
            metrics: None,
        })
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record_trip(&self, broker_id: &str, kind: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.circuit_breaker_trips.with_label_values(&[broker_id, kind]).inc();
        }
    }

    fn load_breaker(&self, broker_id: &str) -> CircuitBreakerState {
        if let Some(state) = self.breakers.read().unwrap().get(broker_id) {
            return *state;
        }
        let state: CircuitBreakerState = self.store.get(BREAKERS_TABLE, broker_id).unwrap_or_default();
        self.breakers.write().unwrap().insert(broker_id.to_string(), state);
        state
    }

    fn store_breaker(&self, broker_id: &str, state: CircuitBreakerState) -> Result<()> {
        self.store.put(BREAKERS_TABLE, broker_id, &state)?;
        self.breakers.write().unwrap().insert(broker_id.to_string(), state);
        Ok(())
    }

    fn record_breaker_event(&self, broker_id: &str, kind: &'static str, detail: impl Into<String>) -> Result<()> {
        let event = CircuitBreakerEvent {
            broker_id: broker_id.to_string(),
            kind,
            at: Utc::now(),
            detail: detail.into(),
        };
        let key = format!("{broker_id}:{}", event.at.timestamp_nanos_opt().unwrap_or_default());
        self.store.put(BREAKER_EVENTS_TABLE, &key, &event)?;
        Ok(())
    }

    fn orders_for_broker(&self, broker_id: &str) -> Result<Vec<Order>> {
        Ok(self
            .store
            .get_all::<Order>(ORDERS_TABLE)?
            .into_iter()
            .map(|(_, order)| order)
            .filter(|o| o.broker_id == broker_id)
            .collect())
    }

    /// Reconstructs portfolio state: starting equity + cumulative realised
    /// PnL across closed orders, open positions, daily PnL since UTC
    /// day-start, and the peak-to-trough drawdown check.
    pub fn get_portfolio_state(&self, broker_id: &str) -> Result<PortfolioState> {
        let orders = self.orders_for_broker(broker_id)?;
        let today = util::time::now().date_naive();

        let realized_total: Decimal = orders
            .iter()
            .filter(|o| o.state == OrderState::Closed)
            .map(|o| o.realized_pnl)
            .sum();
        let total_equity = self.config.starting_equity(broker_id) + realized_total;

        let daily_pnl: Decimal = orders
            .iter()
            .filter(|o| o.state == OrderState::Closed)
            .filter(|o| o.closed_at.map(|t| t.date_naive() == today).unwrap_or(false))
            .map(|o| o.realized_pnl)
            .sum();

        let open_positions: Vec<Position> = orders
            .iter()
            .filter(|o| !o.state.is_terminal())
            .map(|o| Position {
                order_id: o.id,
                broker_id: o.broker_id.clone(),
                symbol: o.symbol.clone(),
                side: o.side,
                quantity: o.remaining_quantity,
                entry_price: o.entry_price,
                stop_loss: o.stop_loss,
                unrealized_pnl: Decimal::ZERO,
                opened_at: o.opened_at,
            })
            .collect();

        let stored_peak: Decimal = self.store.get(PEAK_EQUITY_TABLE, broker_id).unwrap_or(total_equity);
        let peak_equity = stored_peak.max(total_equity);
        if peak_equity != stored_peak {
            self.store.put(PEAK_EQUITY_TABLE, broker_id, &peak_equity)?;
        }

        if peak_equity > Decimal::ZERO {
            let drawdown_pct = (peak_equity - total_equity) / peak_equity * Decimal::from(100);
            if drawdown_pct >= self.config.max_drawdown_pct {
                let mut breaker = self.load_breaker(broker_id);
                if !breaker.drawdown_tripped {
                    breaker.trip_drawdown();
                    self.store_breaker(broker_id, breaker)?;
                    self.record_breaker_event(
                        broker_id,
                        "drawdown",
                        format!("drawdown {drawdown_pct:.2}% >= {}%, manual reset required", self.config.max_drawdown_pct),
                    )?;
                    warn!(broker_id, %drawdown_pct, "drawdown kill switch tripped");
                    self.alerts.send(
                        AlertLevel::Critical,
                        &format!("{broker_id}: drawdown kill switch tripped at {drawdown_pct:.2}%, manual reset required"),
                    );
                    self.record_trip(broker_id, "drawdown");
                }
            }
        }

        self.store.put(
            SNAPSHOTS_TABLE,
            &format!("{broker_id}:{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()),
            &(broker_id, total_equity, daily_pnl, open_positions.len()),
        )?;

        Ok(PortfolioState {
            broker_id: broker_id.to_string(),
            total_equity,
            daily_pnl,
            open_positions,
            peak_equity,
        })
    }

    fn find_position<'a>(positions: &'a [Position], symbol: &str) -> Option<&'a Position> {
        positions.iter().find(|p| p.symbol == symbol)
    }

    fn correlated_count(&self, positions: &[Position], broker_id: &str, asset_class: AssetClass, side: OrderSide) -> usize {
        positions
            .iter()
            .filter(|p| p.side == side)
            .filter(|p| self.instruments.get(broker_id, &p.symbol).asset_class == asset_class)
            .count()
    }
}

#[async_trait]
impl RiskGate for RiskManager {
    async fn check_entry(&self, signal: &Signal, broker_id: &str) -> AdmissionDecision {
        let Some(direction) = signal.direction else {
            return AdmissionDecision::Rejected { reason: "no direction on signal".to_string() };
        };
        let side: OrderSide = direction.into();

        let portfolio = match self.get_portfolio_state(broker_id) {
            Ok(p) => p,
            Err(err) => return AdmissionDecision::Rejected { reason: format!("portfolio reconstruction failed: {err}") },
        };

        let today = util::time::now().date_naive();
        let mut breaker = self.load_breaker(broker_id);
        breaker.maybe_reset_daily(today);
        let _ = self.store_breaker(broker_id, breaker);

        if breaker.blocked() {
            return AdmissionDecision::Rejected { reason: "circuit breaker tripped".to_string() };
        }

        if portfolio.total_equity > Decimal::ZERO && portfolio.daily_pnl < Decimal::ZERO {
            let loss_pct = (-portfolio.daily_pnl) / portfolio.total_equity * Decimal::from(100);
            if loss_pct >= self.config.max_daily_loss_pct {
                breaker.trip_daily(today);
                let _ = self.store_breaker(broker_id, breaker);
                let _ = self.record_breaker_event(broker_id, "daily_loss", format!("daily loss {loss_pct:.2}%"));
                self.alerts.send(AlertLevel::Critical, &format!("{broker_id}: daily loss circuit breaker tripped at {loss_pct:.2}%"));
                self.record_trip(broker_id, "daily_loss");
                return AdmissionDecision::Rejected { reason: "daily loss circuit breaker tripped".to_string() };
            }
        }

        if let Some(existing) = Self::find_position(&portfolio.open_positions, &signal.symbol) {
            if existing.side == side {
                return AdmissionDecision::Rejected { reason: "already positioned in this direction".to_string() };
            }
            return AdmissionDecision::ApprovedReversal { closing_order_id: existing.order_id };
        }

        if portfolio.open_positions.len() >= self.config.get_max_open_positions(broker_id) {
            return AdmissionDecision::Rejected { reason: "per-broker open position cap reached".to_string() };
        }

        let asset_class = self.instruments.get(broker_id, &signal.symbol).asset_class;
        let correlated = self.correlated_count(&portfolio.open_positions, broker_id, asset_class, side);
        if correlated >= self.config.correlation_limit(broker_id, asset_class) {
            return AdmissionDecision::Rejected { reason: "correlation limit reached for asset class".to_string() };
        }

        AdmissionDecision::Approved
    }

    async fn position_size(&self, signal: &Signal, broker_id: &str, entry_price: Decimal) -> Decimal {
        let Some(stop_loss) = signal.stop_loss else { return Decimal::ZERO };
        let stop_distance = (entry_price - stop_loss).abs();
        if stop_distance.is_zero() || entry_price.is_zero() {
            return Decimal::ZERO;
        }

        let portfolio = match self.get_portfolio_state(broker_id) {
            Ok(p) => p,
            Err(_) => return Decimal::ZERO,
        };
        let equity = portfolio.total_equity;
        let risk_amount = equity * self.config.max_position_pct / Decimal::from(100);
        let instrument = self.instruments.get(broker_id, &signal.symbol);

        if instrument.asset_class == AssetClass::Crypto {
            let size = risk_amount / stop_distance;
            let cap = Decimal::from_str("0.10").unwrap() * equity / entry_price;
            return size.min(cap).max(Decimal::ZERO);
        }

        let Some(quote_to_aud) = quote_to_aud_rate(&instrument.quote_currency) else {
            warn!(quote = %instrument.quote_currency, "no quote-to-AUD rate, dropping signal");
            return Decimal::ZERO;
        };
        let stop_pips = stop_distance / instrument.pip_size;
        if stop_pips.is_zero() {
            return Decimal::ZERO;
        }
        let pip_value_aud = instrument.pip_value_per_unit * quote_to_aud;
        if pip_value_aud.is_zero() {
            return Decimal::ZERO;
        }
        let units = risk_amount / (stop_pips * pip_value_aud);
        let cap = (equity * self.config.max_leverage) / (entry_price * quote_to_aud);
        units.min(cap).max(Decimal::ZERO).floor()
    }

    fn snapshot(&self, broker_id: &str) -> anyhow::Result<()> {
        self.get_portfolio_state(broker_id)?;
        Ok(())
    }
}
