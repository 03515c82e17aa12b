use crate::convert::{timeframe_to_granularity, to_oanda_instrument};
use crate::wire::{
    AccountSummaryResponse, CandlesResponse, CreateOrderRequest, CreateOrderResponse, OrderRequestBody,
    PricingResponse,
};
use async_trait::async_trait;
use broker_core::error::{Error, Result};
use broker_core::rate_limit::{EndpointCategory, RateLimiter};
use broker_core::retry::with_retry;
use broker_core::session::{TokenRefresher, TokenSession};
use broker_core::types::{Balance, Candle, OrderAck, OrderKind, OrderSide, Ticker, Timeframe};
use broker_core::Broker;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use std::str::FromStr;

const PRACTICE_BASE_URL: &str = "https://api-fxpractice.oanda.com";
const LIVE_BASE_URL: &str = "https://api-fxtrade.oanda.com";

/// OANDA personal access tokens are long-lived and not reissued by an
/// authenticate call; `StaticTokenRefresher` just hands the configured
/// token back so the venue still goes through [`TokenSession`]'s
/// lock-guarded path on a 401, even though there's no real
/// refresh to perform.
struct StaticTokenRefresher(String);

#[async_trait]
impl TokenRefresher for StaticTokenRefresher {
    async fn authenticate(&self) -> Result<(String, std::time::Duration)> {
        Ok((self.0.clone(), std::time::Duration::MAX))
    }
}

/// REST-only OANDA v20 adapter for FX and CFD instruments. There is no
/// maintained, current OANDA client crate to build on, so this talks to the
/// v20 REST API directly via `reqwest`.
pub struct OandaBroker {
    client: Client,
    base_url: &'static str,
    account_id: String,
    session: TokenSession,
    rate_limiter: RateLimiter,
}

impl OandaBroker {
    pub fn new(account_id: String, token: String, live: bool) -> Self {
        let refresher = std::sync::Arc::new(StaticTokenRefresher(token.clone()));
        Self {
            client: Client::new(),
            base_url: if live { LIVE_BASE_URL } else { PRACTICE_BASE_URL },
            account_id,
            session: TokenSession::from_static_token(refresher, token),
            rate_limiter: RateLimiter::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v3/accounts/{}{}", self.base_url, self.account_id, path)
    }

    /// Builds and sends one request via `build` (a factory taking the
    /// current bearer token), retrying exactly once with a freshly
    /// re-authenticated token if the venue answers 401/403.
    async fn send_authed(&self, build: impl Fn(&str) -> reqwest::RequestBuilder) -> Result<Response> {
        let token = self.session.token().await?;
        let resp = build(&token).send().await.map_err(Error::Network)?;
        if resp.status() != StatusCode::UNAUTHORIZED && resp.status() != StatusCode::FORBIDDEN {
            return Ok(resp);
        }
        warn!("oanda: 401/403 on request, re-authenticating");
        let token = self.session.reauthenticate().await?;
        build(&token).send().await.map_err(Error::Network)
    }

    fn map_status(status: reqwest::StatusCode, body: String) -> Error {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Error::RateLimited
        } else if status.is_server_error() {
            Error::ServerError(body)
        } else if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            Error::AuthFailed(body)
        } else if status.is_client_error() {
            Error::InvalidRequest(body)
        } else {
            Error::Other(body)
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap_or_default()
    }
}

#[async_trait]
impl Broker for OandaBroker {
    fn broker_id(&self) -> &str {
        "oanda"
    }

    async fn fetch_ohlcv(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let instrument = to_oanda_instrument(symbol);
        let granularity = timeframe_to_granularity(timeframe);
        with_retry("oanda_fetch_ohlcv", || async {
            self.rate_limiter.acquire(EndpointCategory::MarketData).await;
            let url = format!("{}/v3/instruments/{}/candles", self.base_url, instrument);
            let resp = self
                .send_authed(|token| {
                    self.client
                        .get(&url)
                        .bearer_auth(token)
                        .query(&[("granularity", granularity), ("count", &limit.to_string()), ("price", "M")])
                })
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status(status, body));
            }
            let parsed: CandlesResponse = resp.json().await.map_err(Error::Network)?;
            let candles = parsed
                .candles
                .into_iter()
                .filter(|c| c.complete)
                .filter_map(|c| {
                    let mid = c.mid?;
                    let open_time = DateTime::parse_from_rfc3339(&c.time).ok()?.with_timezone(&Utc);
                    Some(Candle {
                        open_time,
                        open: Self::dec(&mid.o),
                        high: Self::dec(&mid.h),
                        low: Self::dec(&mid.l),
                        close: Self::dec(&mid.c),
                        volume: Decimal::from(c.volume),
                    })
                })
                .collect();
            Ok(candles)
        })
        .await
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let instrument = to_oanda_instrument(symbol);
        with_retry("oanda_fetch_ticker", || async {
            self.rate_limiter.acquire(EndpointCategory::MarketData).await;
            let url = self.url("/pricing");
            let resp = self
                .send_authed(|token| self.client.get(&url).bearer_auth(token).query(&[("instruments", &instrument)]))
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status(status, body));
            }
            let parsed: PricingResponse = resp.json().await.map_err(Error::Network)?;
            let price = parsed
                .prices
                .into_iter()
                .next()
                .ok_or_else(|| Error::UnsupportedSymbol(instrument.clone()))?;
            let bid = price.bids.first().map(|p| Self::dec(&p.price)).unwrap_or_default();
            let ask = price.asks.first().map(|p| Self::dec(&p.price)).unwrap_or_default();
            Ok(Ticker { last: (bid + ask) / Decimal::from(2), bid, ask })
        })
        .await
    }

    async fn fetch_balance(&self, _currency: &str) -> Result<Balance> {
        with_retry("oanda_fetch_balance", || async {
            self.rate_limiter.acquire(EndpointCategory::Trading).await;
            let url = self.url("/summary");
            let resp = self.send_authed(|token| self.client.get(&url).bearer_auth(token)).await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status(status, body));
            }
            let parsed: AccountSummaryResponse = resp.json().await.map_err(Error::Network)?;
            let total = Self::dec(&parsed.account.nav);
            let used = Self::dec(&parsed.account.margin_used);
            Ok(Balance { total, used, free: total - used })
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
        self.submit_order(symbol, side, quantity, Some(price), "LIMIT", OrderKind::Limit).await
    }

    async fn create_stop_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Result<OrderAck> {
        self.submit_order(symbol, side, quantity, Some(stop_price), "STOP", OrderKind::Stop).await
    }

    async fn cancel_order(&self, _symbol: &str, venue_order_id: &str) -> Result<()> {
        let venue_order_id = venue_order_id.to_string();
        with_retry("oanda_cancel_order", || async {
            self.rate_limiter.acquire(EndpointCategory::Trading).await;
            let url = self.url(&format!("/orders/{venue_order_id}/cancel"));
            let resp = self.send_authed(|token| self.client.put(&url).bearer_auth(token)).await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status(status, body));
            }
            Ok(())
        })
        .await
    }

    async fn check_connectivity(&self) -> Result<()> {
        let url = self.url("/summary");
        let resp = self.send_authed(|token| self.client.get(&url).bearer_auth(token)).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::map_status(resp.status(), resp.text().await.unwrap_or_default()))
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl OandaBroker {
    async fn submit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Option<Decimal>,
        order_type: &'static str,
        kind: OrderKind,
    ) -> Result<OrderAck> {
        let instrument = to_oanda_instrument(symbol);
        let signed_units = match side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        let body = CreateOrderRequest {
            order: OrderRequestBody {
                order_type,
                instrument: instrument.clone(),
                units: signed_units.to_string(),
                price: price.map(|p| p.to_string()),
                time_in_force: "GTC",
                position_fill: "DEFAULT",
            },
        };
        with_retry("oanda_submit_order", || async {
            self.rate_limiter.acquire(EndpointCategory::Trading).await;
            let url = self.url("/orders");
            let resp = self.send_authed(|token| self.client.post(&url).bearer_auth(token).json(&body)).await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Self::map_status(status, body));
            }
            let parsed: CreateOrderResponse = resp.json().await.map_err(Error::Network)?;
            let submitted_at = DateTime::parse_from_rfc3339(&parsed.order_create_transaction.time)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            let (filled_quantity, avg_fill_price) = match &parsed.order_fill_transaction {
                Some(fill) => (Some(Self::dec(&fill.units).abs()), Some(Self::dec(&fill.price))),
                None => (None, None),
            };
            Ok(OrderAck {
                venue_order_id: parsed.order_create_transaction.id,
                side,
                kind,
                quantity,
                price,
                filled_quantity,
                avg_fill_price,
                submitted_at,
            })
        })
        .await
    }
}
