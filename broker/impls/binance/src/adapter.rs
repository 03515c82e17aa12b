use crate::convert::{kline_to_candle, timeframe_to_interval};
use async_trait::async_trait;
use binance::account::Account;
use binance::api::Binance;
use binance::config::Config;
use binance::general::General;
use binance::market::Market;
use broker_core::error::{Error, Result};
use broker_core::rate_limit::{EndpointCategory, RateLimiter};
use broker_core::retry::with_retry;
use broker_core::types::{Balance, Candle, OrderAck, OrderKind, OrderSide, Ticker, Timeframe};
use broker_core::Broker;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// REST-only Binance spot adapter. Always talks to live market data
/// endpoints; whether orders submitted through it are paper or real is
/// decided by the execution engine, not here.
pub struct BinanceBroker {
    market: Market,
    account: Account,
    general: General,
    rate_limiter: RateLimiter,
}

impl BinanceBroker {
    pub fn new(api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self::with_config(api_key, api_secret, Config::default())
    }

    pub fn new_testnet(api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self::with_config(api_key, api_secret, Config::testnet())
    }

    fn with_config(api_key: Option<String>, api_secret: Option<String>, config: Config) -> Self {
        let market = Binance::new_with_config(api_key.clone(), api_secret.clone(), &config);
        let account = Binance::new_with_config(api_key.clone(), api_secret.clone(), &config);
        let general = Binance::new_with_config(api_key, api_secret, &config);
        Self { market, account, general, rate_limiter: RateLimiter::new() }
    }

    fn map_binance_error(err: binance::errors::Error) -> Error {
        let msg = err.to_string();
        if msg.contains("429") || msg.contains("rate limit") {
            Error::RateLimited
        } else if msg.contains("timed out") {
            Error::Timeout(std::time::Duration::from_secs(10))
        } else if msg.contains("-2010") || msg.contains("-1013") || msg.contains("400") {
            Error::InvalidRequest(msg)
        } else if msg.contains("401") || msg.contains("signature") {
            Error::AuthFailed(msg)
        } else {
            Error::ServerError(msg)
        }
    }
}

#[async_trait]
impl Broker for BinanceBroker {
    fn broker_id(&self) -> &str {
        "binance"
    }

    async fn fetch_ohlcv(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let symbol = symbol.to_string();
        let interval = timeframe_to_interval(timeframe);
        with_retry("binance_fetch_ohlcv", || async {
            self.rate_limiter.acquire(EndpointCategory::MarketData).await;
            let summaries = self
                .market
                .get_klines(symbol.clone(), interval, limit as u16, None, None)
                .await
                .map_err(Self::map_binance_error)?;
            let candles = match summaries {
                binance::rest_model::KlineSummaries::AllKlineSummaries(ks) => {
                    ks.iter().map(kline_to_candle).collect()
                }
            };
            Ok(candles)
        })
        .await
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let symbol = symbol.to_string();
        with_retry("binance_fetch_ticker", || async {
            self.rate_limiter.acquire(EndpointCategory::MarketData).await;
            let book = self.market.get_book_ticker(symbol.clone()).await.map_err(Self::map_binance_error)?;
            let bid = Decimal::from_str(&book.bid_price.to_string()).unwrap_or_default();
            let ask = Decimal::from_str(&book.ask_price.to_string()).unwrap_or_default();
            let last = (bid + ask) / Decimal::from(2);
            Ok(Ticker { last, bid, ask })
        })
        .await
    }

    async fn fetch_balance(&self, currency: &str) -> Result<Balance> {
        let currency = currency.to_string();
        with_retry("binance_fetch_balance", || async {
            self.rate_limiter.acquire(EndpointCategory::Trading).await;
            let info = self.account.get_account().await.map_err(Self::map_binance_error)?;
            let balance = info
                .balances
                .into_iter()
                .find(|b| b.asset.eq_ignore_ascii_case(&currency))
                .ok_or_else(|| Error::UnsupportedSymbol(currency.clone()))?;
            let free = Decimal::from_str(&balance.free).unwrap_or_default();
            let locked = Decimal::from_str(&balance.locked).unwrap_or_default();
            Ok(Balance { total: free + locked, free, used: locked })
        })
        .await
    }

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderAck> {
        let symbol = symbol.to_string();
        let qty = quantity.to_f64().unwrap_or_default();
        let px = price.to_f64().unwrap_or_default();
        with_retry("binance_create_limit_order", || async {
            self.rate_limiter.acquire(EndpointCategory::Trading).await;
            let tr = match side {
                OrderSide::Buy => self.account.limit_buy(symbol.clone(), qty, px).await,
                OrderSide::Sell => self.account.limit_sell(symbol.clone(), qty, px).await,
            }
            .map_err(Self::map_binance_error)?;
            Ok(OrderAck {
                venue_order_id: tr.order_id.to_string(),
                side,
                kind: OrderKind::Limit,
                quantity,
                price: Some(price),
                filled_quantity: Decimal::from_str(&tr.executed_qty).ok(),
                avg_fill_price: None,
                submitted_at: Utc::now(),
            })
        })
        .await
    }

    async fn create_stop_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Result<OrderAck> {
        let symbol = symbol.to_string();
        let qty = quantity.to_f64().unwrap_or_default();
        let stop = stop_price.to_f64().unwrap_or_default();
        with_retry("binance_create_stop_order", || async {
            self.rate_limiter.acquire(EndpointCategory::Trading).await;
            let tr = match side {
                OrderSide::Buy => self.account.stop_limit_buy(symbol.clone(), qty, stop, stop, binance::account::TimeInForce::GTC).await,
                OrderSide::Sell => self.account.stop_limit_sell(symbol.clone(), qty, stop, stop, binance::account::TimeInForce::GTC).await,
            }
            .map_err(Self::map_binance_error)?;
            Ok(OrderAck {
                venue_order_id: tr.order_id.to_string(),
                side,
                kind: OrderKind::Stop,
                quantity,
                price: Some(stop_price),
                filled_quantity: Decimal::from_str(&tr.executed_qty).ok(),
                avg_fill_price: None,
                submitted_at: Utc::now(),
            })
        })
        .await
    }

    async fn cancel_order(&self, symbol: &str, venue_order_id: &str) -> Result<()> {
        let symbol = symbol.to_string();
        let order_id: u64 = venue_order_id.parse().map_err(|_| Error::InvalidRequest(format!("bad order id {venue_order_id}")))?;
        with_retry("binance_cancel_order", || async {
            self.rate_limiter.acquire(EndpointCategory::Trading).await;
            self.account.cancel_order(symbol.clone(), order_id).await.map_err(Self::map_binance_error)?;
            Ok(())
        })
        .await
    }

    async fn check_connectivity(&self) -> Result<()> {
        self.general.ping().await.map_err(Self::map_binance_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
