//! Analysis Cycle: the scheduler's primary job. Walks every
//! `(broker, symbol, timeframe)` target once per invocation, runs the
//! divergence detector, validates, persists, and dispatches to the
//! Execution Engine. Owns the process-local candle-dedup caches and the
//! `ActiveSetup` store — nothing else may touch them.
use broker_core::instrument::InstrumentRegistry;
use broker_core::types::{Candle, Timeframe};
use brokers::BrokerRouter;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use db::{Storage, StorageExt};
use metrics::Metrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use signals::detector::DivergenceDetector;
use signals::{validate, Signal, SignalDirection, ValidatorConfig};
use stats::IndicatorPeriods;
use std::collections::HashMap;
use std::sync::Arc;
use trading::active_setup::ActiveSetupStore;
use trading::engine::ExecutionEngine;
use trading::types::ActiveSetup;
use util::alerts::{AlertLevel, AlertSink, TracingAlertSink};
use uuid::Uuid;

pub const SIGNALS_TABLE: &str = "signals";
pub const CYCLES_TABLE: &str = "analysis_cycles";
pub const CANDLES_TABLE: &str = "candles";

/// One `(broker_id, symbol, timeframe)` combination analysed every cycle.
#[derive(Debug, Clone)]
pub struct AnalysisTarget {
    pub broker_id: String,
    pub symbol: String,
    pub timeframe: Timeframe,
}

/// A persisted signal row: the detector's raw
/// `Signal` plus the validation verdict and provenance. `timeframe_label`
/// carries the schema's free-form `timeframe` column value; it is usually
/// just `timeframe`'s own display form, except for a multi-TF confirmed
/// signal, which is recorded as `"4h+1h"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSignal {
    pub id: Uuid,
    pub broker_id: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timeframe_label: String,
    pub signal: Signal,
    pub validated: bool,
    pub validation_reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisCycleResult {
    pub id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub symbols_analyzed: Vec<String>,
    pub signals_found: usize,
    pub signals_validated: usize,
    pub orders_placed: usize,
    pub errors: Vec<String>,
    pub duration_ms: i64,
}

pub struct AnalysisCycleConfig {
    pub targets: Vec<AnalysisTarget>,
    pub lookback_candles: usize,
    pub periods: IndicatorPeriods,
    pub validator: ValidatorConfig,
    pub multi_tf_enabled: bool,
    pub setup_expiry_hours: i64,
    pub risk_reward: Decimal,
}

pub struct AnalysisCycle {
    config: AnalysisCycleConfig,
    router: BrokerRouter,
    detector: Arc<dyn DivergenceDetector>,
    engine: Arc<ExecutionEngine>,
    store: Arc<dyn Storage>,
    instruments: Arc<InstrumentRegistry>,
    min_confidence_for: Box<dyn Fn(&str) -> f64 + Send + Sync>,
    min_risk_reward_for: Box<dyn Fn(&str) -> f64 + Send + Sync>,
    last_candle_times: HashMap<String, DateTime<Utc>>,
    signaled_candles: HashMap<String, DateTime<Utc>>,
    active_setups: ActiveSetupStore,
    alerts: Arc<dyn AlertSink>,
    metrics: Option<Arc<Metrics>>,
}

impl AnalysisCycle {
    pub fn new(
        config: AnalysisCycleConfig,
        router: BrokerRouter,
        detector: Arc<dyn DivergenceDetector>,
        engine: Arc<ExecutionEngine>,
        store: Arc<dyn Storage>,
        instruments: Arc<InstrumentRegistry>,
        min_confidence_for: Box<dyn Fn(&str) -> f64 + Send + Sync>,
        min_risk_reward_for: Box<dyn Fn(&str) -> f64 + Send + Sync>,
    ) -> Self {
        store.ensure_table(SIGNALS_TABLE).expect("signals table must be creatable");
        store.ensure_table(CYCLES_TABLE).expect("analysis_cycles table must be creatable");
        store.ensure_table(CANDLES_TABLE).expect("candles table must be creatable");
        Self {
            config,
            router,
            detector,
            engine,
            store,
            instruments,
            min_confidence_for,
            min_risk_reward_for,
            last_candle_times: HashMap::new(),
            signaled_candles: HashMap::new(),
            active_setups: ActiveSetupStore::new(),
            alerts: Arc::new(TracingAlertSink),
            metrics: None,
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn cache_key(broker_id: &str, symbol: &str, timeframe: Timeframe) -> String {
        format!("{broker_id}:{symbol}/{timeframe}")
    }

    /// Primes `_last_candle_times` with one limit=1 fetch per target so the
    /// first scheduled cycle doesn't treat the prevailing candle as newly
    /// closed.
    pub async fn seed_candle_cache(&mut self) {
        let targets = self.config.targets.clone();
        for target in &targets {
            let Some(broker) = self.router.get(&target.broker_id) else { continue };
            match broker.fetch_ohlcv(&target.symbol, target.timeframe, 1).await {
                Ok(candles) => {
                    if let Some(last) = candles.last() {
                        let key = Self::cache_key(&target.broker_id, &target.symbol, target.timeframe);
                        self.last_candle_times.insert(key, last.open_time);
                    }
                }
                Err(err) => warn!(%err, broker_id = %target.broker_id, symbol = %target.symbol, "candle cache seeding: fetch failed"),
            }
        }
    }

    pub async fn run(&mut self) -> AnalysisCycleResult {
        let started_at = Utc::now();
        let mut result = AnalysisCycleResult { id: Uuid::new_v4(), started_at: Some(started_at), ..Default::default() };
        if let Some(metrics) = &self.metrics {
            metrics.cycles_run.inc();
        }

        for broker_id in self.distinct_broker_ids() {
            match self.snapshot_portfolio(&broker_id) {
                Ok(()) => {}
                Err(err) => result.errors.push(format!("{broker_id}: portfolio snapshot failed: {err}")),
            }
        }

        self.active_setups.expire();

        let mut traded_symbols: std::collections::HashSet<String> = std::collections::HashSet::new();
        let targets = self.config.targets.clone();

        for target in &targets {
            if let Err(err) = self.process_target(target, &mut traded_symbols, &mut result).await {
                result.errors.push(format!("{}/{}: {err}", target.symbol, target.timeframe));
            }
        }

        let completed_at = Utc::now();
        result.completed_at = Some(completed_at);
        result.duration_ms = (completed_at - started_at).num_milliseconds();

        if let Err(err) = self.store.put(CYCLES_TABLE, &result.id.to_string(), &result) {
            warn!(%err, "failed to persist analysis cycle result");
        }

        result
    }

    fn distinct_broker_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.config.targets.iter().map(|t| t.broker_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn snapshot_portfolio(&self, broker_id: &str) -> anyhow::Result<()> {
        self.engine.risk.snapshot(broker_id)
    }

    async fn process_target(
        &mut self,
        target: &AnalysisTarget,
        traded_symbols: &mut std::collections::HashSet<String>,
        result: &mut AnalysisCycleResult,
    ) -> anyhow::Result<()> {
        result.symbols_analyzed.push(target.symbol.clone());

        let Some(broker) = self.router.get(&target.broker_id) else {
            anyhow::bail!("unknown broker {}", target.broker_id);
        };

        let candles = broker.fetch_ohlcv(&target.symbol, target.timeframe, self.config.lookback_candles).await?;
        if candles.len() < self.config.lookback_candles / 2 {
            warn!(symbol = %target.symbol, timeframe = %target.timeframe, "insufficient_data");
            return Ok(());
        }

        self.persist_candles(&target.broker_id, &target.symbol, target.timeframe, &candles)?;

        let indicators = stats::compute(&candles, &self.config.periods);
        let key = Self::cache_key(&target.broker_id, &target.symbol, target.timeframe);
        let latest_ts = candles.last().map(|c| c.open_time).unwrap_or(started_epoch());

        let newly_closed = self.last_candle_times.get(&key).map(|t| *t != latest_ts).unwrap_or(true);
        if newly_closed {
            self.last_candle_times.insert(key.clone(), latest_ts);
            self.signaled_candles.remove(&key);
        }

        if self.signaled_candles.get(&key) == Some(&latest_ts) {
            return Ok(());
        }

        let signal = self.detector.detect(&target.symbol, target.timeframe, &indicators).await;
        if !signal.divergence_detected {
            return Ok(());
        }
        result.signals_found += 1;
        self.signaled_candles.insert(key, latest_ts);
        if let Some(metrics) = &self.metrics {
            metrics.signals_found.inc();
        }

        let min_confidence = (self.min_confidence_for)(&target.broker_id);
        let min_risk_reward = (self.min_risk_reward_for)(&target.broker_id);
        let mut validator_config = self.config.validator;
        validator_config.min_confidence = validator_config.min_confidence.max(min_confidence);
        validator_config.min_risk_reward = validator_config.min_risk_reward.max(min_risk_reward);
        let asset_class = self.instruments.get(&target.broker_id, &target.symbol).asset_class;
        let verdict = validate(&signal, &indicators, &validator_config, asset_class);
        if verdict.validated {
            result.signals_validated += 1;
            if let Some(metrics) = &self.metrics {
                metrics.signals_validated.inc();
            }
        }

        let signal_id = Uuid::new_v4();
        let persisted = PersistedSignal {
            id: signal_id,
            broker_id: target.broker_id.clone(),
            symbol: target.symbol.clone(),
            timeframe: target.timeframe,
            timeframe_label: target.timeframe.to_string(),
            signal: signal.clone(),
            validated: verdict.validated,
            validation_reason: verdict.reason.clone(),
            created_at: Utc::now(),
        };
        self.store.put(SIGNALS_TABLE, &signal_id.to_string(), &persisted)?;

        if !verdict.validated {
            return Ok(());
        }

        let dispatch = if self.config.multi_tf_enabled {
            self.multi_tf_dispatch(target, &signal, signal_id)?
        } else {
            Some((signal, signal_id))
        };

        let Some((exec_signal, exec_signal_id)) = dispatch else { return Ok(()) };

        if traded_symbols.contains(&target.symbol) {
            return Ok(());
        }

        if let Some(order) = self.engine.execute_signal(&exec_signal, &target.broker_id, exec_signal_id).await? {
            traded_symbols.insert(target.symbol.clone());
            result.orders_placed += 1;
            info!(order_id = %order.id, symbol = %target.symbol, "order placed from analysis cycle");
            self.alerts.send(AlertLevel::Info, &format!("signal on {} produced order {}", target.symbol, order.id));
            if let Some(metrics) = &self.metrics {
                metrics.orders_placed.inc();
            }
        }

        Ok(())
    }

    /// 4h signals open an `ActiveSetup` and stop here; 1h signals look for a
    /// matching setup and, if found, reconstruct a confirmed signal carrying
    /// the 1h entry and the wider of the two stops.
    fn multi_tf_dispatch(&mut self, target: &AnalysisTarget, signal: &Signal, signal_id: Uuid) -> anyhow::Result<Option<(Signal, Uuid)>> {
        let Some(direction) = signal.direction else { return Ok(None) };

        match target.timeframe {
            Timeframe::H4 => {
                let Some(stop_loss) = signal.stop_loss else { return Ok(None) };
                let setup = ActiveSetup {
                    symbol: target.symbol.clone(),
                    broker_id: target.broker_id.clone(),
                    signal_id,
                    direction,
                    stop_loss,
                    created_at: Utc::now(),
                    expires_at: Utc::now() + ChronoDuration::hours(self.config.setup_expiry_hours),
                };
                self.active_setups.insert(setup);
                info!(symbol = %target.symbol, "4h setup armed, awaiting 1h confirmation");
                self.alerts.send(AlertLevel::Info, &format!("{} {:?} 4h setup armed, awaiting 1h confirmation", target.symbol, direction));
                Ok(None)
            }
            Timeframe::H1 => {
                let Some(setup) = self.active_setups.confirm(&target.broker_id, &target.symbol, direction) else {
                    return Ok(None);
                };
                let Some(confirmed) = self.build_confirmed_signal(signal, &setup) else { return Ok(None) };

                // A confirmed multi-TF signal is its own row, distinct from the raw 1h signal persisted above.
                let confirmed_id = Uuid::new_v4();
                let confirmed_row = PersistedSignal {
                    id: confirmed_id,
                    broker_id: target.broker_id.clone(),
                    symbol: target.symbol.clone(),
                    timeframe: target.timeframe,
                    timeframe_label: "4h+1h".to_string(),
                    signal: confirmed.clone(),
                    validated: true,
                    validation_reason: "multi-tf confirmed".to_string(),
                    created_at: Utc::now(),
                };
                self.store.put(SIGNALS_TABLE, &confirmed_id.to_string(), &confirmed_row)?;

                Ok(Some((confirmed, confirmed_id)))
            }
            _ => Ok(Some((signal.clone(), signal_id))),
        }
    }

    /// Confirmed entry uses the 1h entry price; the stop is the 4h setup's
    /// stop unless it falls on the wrong side of the 1h entry, in which case
    /// the 1h signal's own stop is used instead; TPs are recomputed from
    /// that risk distance at the configured risk:reward.
    fn build_confirmed_signal(&self, one_hour_signal: &Signal, setup: &ActiveSetup) -> Option<Signal> {
        let entry = one_hour_signal.entry_price?;
        let four_hour_stop_valid = match setup.direction {
            SignalDirection::Long => setup.stop_loss < entry,
            SignalDirection::Short => setup.stop_loss > entry,
        };
        let stop_loss = if four_hour_stop_valid { setup.stop_loss } else { one_hour_signal.stop_loss? };

        let risk_distance = (entry - stop_loss).abs();
        let sign = setup.direction.sign();
        let rr = self.config.risk_reward;

        let mut confirmed = one_hour_signal.clone();
        confirmed.direction = Some(setup.direction);
        confirmed.entry_price = Some(entry);
        confirmed.stop_loss = Some(stop_loss);
        confirmed.take_profit_1 = Some(entry + sign * risk_distance * rr);
        confirmed.take_profit_2 = Some(entry + sign * risk_distance * rr * Decimal::TWO);
        confirmed.take_profit_3 = None;
        confirmed.timeframe = Timeframe::H1;
        Some(confirmed)
    }

    fn persist_candles(&self, broker_id: &str, symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> db::Result<()> {
        for candle in candles {
            let key = format!("{broker_id}:{symbol}:{timeframe}:{}", candle.open_time.timestamp());
            self.store.put(CANDLES_TABLE, &key, candle)?;
        }
        Ok(())
    }
}

fn started_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(0, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_core::types::{Balance, OrderAck, OrderSide, Ticker};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use trading::engine::{AdmissionDecision, RiskGate};
    use trading::types::TradingMode;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn setup_at(direction: SignalDirection, stop_loss: Decimal, expires_in: ChronoDuration) -> ActiveSetup {
        ActiveSetup {
            symbol: "EUR_USD".to_string(),
            broker_id: "oanda".to_string(),
            signal_id: Uuid::new_v4(),
            direction,
            stop_loss,
            created_at: Utc::now(),
            expires_at: Utc::now() + expires_in,
        }
    }

    fn one_hour_trigger(entry: Decimal, stop_loss: Option<Decimal>) -> Signal {
        let mut s = Signal::none("EUR_USD", Timeframe::H1);
        s.divergence_detected = true;
        s.direction = Some(SignalDirection::Long);
        s.entry_price = Some(entry);
        s.stop_loss = stop_loss;
        s
    }

    /// The 4h setup's stop survives onto the confirmed signal when it still
    /// sits on the correct side of the 1h entry.
    #[test]
    fn confirmed_signal_keeps_the_four_hour_stop_when_valid() {
        let cycle = test_cycle(Decimal::from_str("2").unwrap());
        let setup = setup_at(SignalDirection::Long, d("1.0950"), ChronoDuration::hours(2));
        let trigger = one_hour_trigger(d("1.1000"), Some(d("1.0990")));

        let confirmed = cycle.build_confirmed_signal(&trigger, &setup).unwrap();
        assert_eq!(confirmed.stop_loss, Some(d("1.0950")), "4h stop is still below the 1h entry, so it is kept");
        assert_eq!(confirmed.entry_price, Some(d("1.1000")));
        let risk = d("1.1000") - d("1.0950");
        assert_eq!(confirmed.take_profit_1, Some(d("1.1000") + risk * Decimal::from(2)));
    }

    /// When the 4h stop would sit on the wrong side of the 1h entry, fall
    /// back to the 1h signal's own stop instead.
    #[test]
    fn confirmed_signal_falls_back_to_one_hour_stop_when_four_hour_stop_invalid() {
        let cycle = test_cycle(Decimal::from_str("2").unwrap());
        // 4h stop sits above the 1h entry: invalid for a Long.
        let setup = setup_at(SignalDirection::Long, d("1.1010"), ChronoDuration::hours(2));
        let trigger = one_hour_trigger(d("1.1000"), Some(d("1.0980")));

        let confirmed = cycle.build_confirmed_signal(&trigger, &setup).unwrap();
        assert_eq!(confirmed.stop_loss, Some(d("1.0980")));
    }

    /// Missing 1h entry price means there's nothing to confirm against.
    #[test]
    fn confirmed_signal_is_none_without_a_one_hour_entry_price() {
        let cycle = test_cycle(Decimal::from_str("2").unwrap());
        let setup = setup_at(SignalDirection::Long, d("1.0950"), ChronoDuration::hours(2));
        let mut trigger = one_hour_trigger(d("1.1000"), Some(d("1.0990")));
        trigger.entry_price = None;
        assert!(cycle.build_confirmed_signal(&trigger, &setup).is_none());
    }

    struct FixedCandlesBroker {
        candles: Vec<Candle>,
    }

    #[async_trait]
    impl brokers::Broker for FixedCandlesBroker {
        fn broker_id(&self) -> &str {
            "binance"
        }
        async fn fetch_ohlcv(&self, _symbol: &str, _timeframe: Timeframe, _limit: usize) -> broker_core::error::Result<Vec<Candle>> {
            Ok(self.candles.clone())
        }
        async fn fetch_ticker(&self, _symbol: &str) -> broker_core::error::Result<Ticker> {
            Ok(Ticker { last: d("100"), bid: d("100"), ask: d("100") })
        }
        async fn fetch_balance(&self, _currency: &str) -> broker_core::error::Result<Balance> {
            Ok(Balance { total: d("10000"), free: d("10000"), used: Decimal::ZERO })
        }
        async fn create_limit_order(&self, _symbol: &str, _side: OrderSide, _quantity: Decimal, _price: Decimal) -> broker_core::error::Result<OrderAck> {
            unreachable!()
        }
        async fn create_stop_order(&self, _symbol: &str, _side: OrderSide, _quantity: Decimal, _stop_price: Decimal) -> broker_core::error::Result<OrderAck> {
            unreachable!()
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

    /// Always claims a divergence with no price levels attached, so the
    /// validator rejects it (rule 3, missing levels) before execution — the
    /// test below only cares about the per-candle signal dedup, not about
    /// what happens to a validated signal.
    struct AlwaysSignalsDetector;

    #[async_trait]
    impl DivergenceDetector for AlwaysSignalsDetector {
        async fn detect(&self, symbol: &str, timeframe: Timeframe, _indicators: &stats::IndicatorSet) -> Signal {
            let mut s = Signal::none(symbol, timeframe);
            s.divergence_detected = true;
            s.direction = Some(SignalDirection::Long);
            s
        }
    }

    struct NeverCalledRisk;

    #[async_trait]
    impl RiskGate for NeverCalledRisk {
        async fn check_entry(&self, _signal: &Signal, _broker_id: &str) -> AdmissionDecision {
            panic!("an unvalidated signal must never reach the risk manager")
        }
        async fn position_size(&self, _signal: &Signal, _broker_id: &str, _entry_price: Decimal) -> Decimal {
            panic!("an unvalidated signal must never reach the risk manager")
        }
        fn snapshot(&self, _broker_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn test_cycle(risk_reward: Decimal) -> AnalysisCycle {
        let mut router = BrokerRouter::new();
        router.register(Arc::new(FixedCandlesBroker { candles: flat_candles(30) }));
        let store: Arc<dyn Storage> = Arc::new(db::MemoryKVStore::new());
        let engine = Arc::new(ExecutionEngine::new(
            router.clone(),
            Arc::new(NeverCalledRisk),
            store.clone(),
            TradingMode::Paper,
            Decimal::ZERO,
            Decimal::ZERO,
        ));
        let config = AnalysisCycleConfig {
            targets: vec![AnalysisTarget { broker_id: "binance".to_string(), symbol: "BTCUSDT".to_string(), timeframe: Timeframe::H1 }],
            lookback_candles: 30,
            periods: IndicatorPeriods::default(),
            validator: ValidatorConfig::default(),
            multi_tf_enabled: false,
            setup_expiry_hours: 4,
            risk_reward,
        };
        AnalysisCycle::new(config, router, Arc::new(AlwaysSignalsDetector), engine, store, Arc::new(InstrumentRegistry::new()), Box::new(|_| 0.6), Box::new(|_| 1.5))
    }

    fn flat_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                open_time: Utc::now() - ChronoDuration::hours((n - i) as i64),
                open: d("100"),
                high: d("101"),
                low: d("99"),
                close: d("100"),
                volume: d("1000"),
            })
            .collect()
    }

    /// At most one signal is persisted per candle timestamp: the candle set
    /// doesn't change between two cycles, so the second cycle must not
    /// re-detect on the already-signaled candle.
    #[tokio::test]
    async fn same_candle_set_signals_at_most_once_across_cycles() {
        let mut cycle = test_cycle(Decimal::from(2));
        let first = cycle.run().await;
        assert_eq!(first.signals_found, 1);

        let second = cycle.run().await;
        assert_eq!(second.signals_found, 0, "the candle set hasn't moved, so dedup must suppress re-detection");
    }

    /// Fewer than half of `lookback_candles` yields "insufficient_data" and
    /// the target is skipped without detecting.
    #[tokio::test]
    async fn insufficient_history_skips_the_target_without_detecting() {
        let mut router = BrokerRouter::new();
        router.register(Arc::new(FixedCandlesBroker { candles: flat_candles(5) }));
        let store: Arc<dyn Storage> = Arc::new(db::MemoryKVStore::new());
        let engine = Arc::new(ExecutionEngine::new(router.clone(), Arc::new(NeverCalledRisk), store.clone(), TradingMode::Paper, Decimal::ZERO, Decimal::ZERO));
        let config = AnalysisCycleConfig {
            targets: vec![AnalysisTarget { broker_id: "binance".to_string(), symbol: "BTCUSDT".to_string(), timeframe: Timeframe::H1 }],
            lookback_candles: 30,
            periods: IndicatorPeriods::default(),
            validator: ValidatorConfig::default(),
            multi_tf_enabled: false,
            setup_expiry_hours: 4,
            risk_reward: Decimal::from(2),
        };
        let mut cycle = AnalysisCycle::new(config, router, Arc::new(AlwaysSignalsDetector), engine, store, Arc::new(InstrumentRegistry::new()), Box::new(|_| 0.6), Box::new(|_| 1.5));
        let result = cycle.run().await;
        assert_eq!(result.signals_found, 0);
        assert!(result.errors.is_empty(), "insufficient data is a skip, not an error: {:?}", result.errors);
    }
}

/// Builds `SignalOutcome` candidates from every validated, priced signal in
/// the `signals` table, for the outcome tracker to insert rows for.
pub fn signal_outcome_candidates(store: &dyn Storage) -> anyhow::Result<Vec<outcome::SignalOutcome>> {
    let signals: Vec<(String, PersistedSignal)> = store.get_all(SIGNALS_TABLE)?;
    let mut candidates = Vec::new();
    for (_, persisted) in signals {
        if !persisted.validated {
            continue;
        }
        let Some(direction) = persisted.signal.direction else { continue };
        let Some(entry_price) = persisted.signal.entry_price else { continue };
        let mut outcome = outcome::SignalOutcome::new(persisted.id, persisted.symbol, direction, entry_price, persisted.created_at);
        outcome.stop_loss = persisted.signal.stop_loss;
        outcome.take_profit_1 = persisted.signal.take_profit_1;
        outcome.take_profit_2 = persisted.signal.take_profit_2;
        outcome.take_profit_3 = persisted.signal.take_profit_3;
        candidates.push(outcome);
    }
    Ok(candidates)
}
