//! OANDA v20 REST API response shapes (subset actually consumed).
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CandlesResponse {
    pub candles: Vec<OandaCandle>,
}

#[derive(Debug, Deserialize)]
pub struct OandaCandle {
    pub time: String,
    pub complete: bool,
    pub mid: Option<OandaOhlc>,
    pub volume: i64,
}

#[derive(Debug, Deserialize)]
pub struct OandaOhlc {
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
}

#[derive(Debug, Deserialize)]
pub struct PricingResponse {
    pub prices: Vec<OandaPrice>,
}

#[derive(Debug, Deserialize)]
pub struct OandaPrice {
    pub instrument: String,
    pub bids: Vec<OandaPriceLevel>,
    pub asks: Vec<OandaPriceLevel>,
}

#[derive(Debug, Deserialize)]
pub struct OandaPriceLevel {
    pub price: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountSummaryResponse {
    pub account: AccountSummary,
}

#[derive(Debug, Deserialize)]
pub struct AccountSummary {
    #[serde(rename = "NAV")]
    pub nav: String,
    pub balance: String,
    #[serde(rename = "marginUsed")]
    pub margin_used: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    pub order: OrderRequestBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestBody {
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub instrument: String,
    pub units: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub time_in_force: &'static str,
    pub position_fill: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderResponse {
    #[serde(rename = "orderFillTransaction")]
    pub order_fill_transaction: Option<OrderFillTransaction>,
    #[serde(rename = "orderCreateTransaction")]
    pub order_create_transaction: OrderCreateTransaction,
}

#[derive(Debug, Deserialize)]
pub struct OrderCreateTransaction {
    pub id: String,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderFillTransaction {
    pub price: String,
    pub units: String,
}
