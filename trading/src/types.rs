//! Order lifecycle FSM and the `Order`/`Position`/`ActiveSetup` shapes that
//! flow through the Execution Engine.
use broker_core::types::{OrderSide, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Terminal: `Closed`, `Cancelled`, `Rejected`. `Error` can recover to
/// `Pending` exactly once; every other illegal transition panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OrderState {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Closed,
    Cancelled,
    Rejected,
    Error,
}

impl OrderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderState::Closed | OrderState::Cancelled | OrderState::Rejected)
    }

    /// Whether `self -> next` is one of the declared transition edges.
    pub fn can_transition(self, next: OrderState) -> bool {
        use OrderState::*;
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Submitted, PartiallyFilled)
                | (Submitted, Filled)
                | (Submitted, Cancelled)
                | (Submitted, Rejected)
                | (Submitted, Error)
                | (PartiallyFilled, Filled)
                | (PartiallyFilled, Cancelled)
                | (PartiallyFilled, Error)
                | (Filled, Closed)
                | (Filled, Error)
                | (Error, Pending)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
pub enum TradingMode {
    #[default]
    Dev,
    Paper,
    Live,
}

/// A live or simulated order, tracked through `OrderState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub broker_id: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub side: OrderSide,
    pub state: OrderState,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit_1: Decimal,
    pub take_profit_2: Option<Decimal>,
    pub take_profit_3: Option<Decimal>,
    pub quantity: Decimal,
    pub remaining_quantity: Decimal,
    /// 0 = full position pre-TP1, 1 = runner toward TP2.
    pub tp_stage: u8,
    pub sl_trail_stage: u8,
    pub tp1_close_pct: Decimal,
    pub venue_order_id: Option<String>,
    pub venue_stop_order_id: Option<String>,
    pub realized_pnl: Decimal,
    pub signal_id: Option<Uuid>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn transition(&mut self, next: OrderState) {
        if !self.state.can_transition(next) {
            panic!("illegal order transition from {:?} to {next:?}", self.state);
        }
        self.state = next;
        if next == OrderState::Closed {
            self.closed_at = Some(Utc::now());
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self.side, OrderSide::Buy)
    }
}

/// Reconstructed open position for portfolio/risk purposes; one per open
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub order_id: Uuid,
    pub broker_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub unrealized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
}

/// A 4h-validated signal retained until a same-direction 1h signal confirms
/// it, or until `expires_at` elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSetup {
    pub symbol: String,
    pub broker_id: String,
    pub signal_id: Uuid,
    pub direction: signals::SignalDirection,
    pub stop_loss: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
