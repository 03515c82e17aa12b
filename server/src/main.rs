use actix_cors::Cors;
use actix_web::{App, HttpServer};
use broker_core::instrument::{Instrument, InstrumentRegistry};
use broker_core::Broker;
use brokers::broker_binance::BinanceBroker;
use brokers::broker_oanda::OandaBroker;
use brokers::BrokerRouter;
use clap::Parser;
use db::{get_or_create, DbOptions};
use metrics::Metrics;
use rust_decimal::Decimal;
use signals::detector::{DeterministicDetector, DeterministicDetectorConfig};
use signals::DivergenceDetector;
use std::str::FromStr;
use std::sync::Arc;
use trader::cycle::{AnalysisCycle, AnalysisCycleConfig, AnalysisTarget};
use trader::health::{self, HealthState};
use trader::scheduler::{ScheduleConfig, Scheduler};
use trader::settings::Settings;
use trading::engine::ExecutionEngine;
use trading::monitor::PositionMonitor;

/// Default fee rate applied to every fill when an instrument-specific rate
/// isn't threaded through (trading::engine and trading::monitor take a
/// single process-wide rate); see DESIGN.md's open-question notes.
const DEFAULT_FEE_RATE: &str = "0.001";

#[derive(Parser, Debug)]
#[command(name = "trader", about = "Deterministic multi-broker divergence-trading service")]
struct Cli {
    /// Config environment name; loads config/<env>.yaml plus config/local.yaml.
    /// Falls back to TRADER_ENV, then "development".
    #[arg(long)]
    env: Option<String>,
}

fn build_instrument_registry(settings: &Settings) -> InstrumentRegistry {
    let mut registry = InstrumentRegistry::new();
    for (broker_id, broker) in &settings.brokers {
        for instrument in &broker.instruments {
            let asset_class = instrument.asset_class.parse().unwrap_or(broker_core::instrument::AssetClass::Crypto);
            registry.register(Instrument {
                symbol: instrument.symbol.clone(),
                broker_id: broker_id.clone(),
                display_name: instrument.symbol.clone(),
                asset_class,
                pip_size: instrument.pip_size,
                pip_value_per_unit: instrument.pip_value_per_unit,
                min_units: instrument.min_units,
                max_leverage: instrument.max_leverage,
                taker_fee_rate: instrument.taker_fee_rate,
                base_currency: instrument.base_currency.clone(),
                quote_currency: instrument.quote_currency.clone(),
            });
        }
    }
    registry
}

fn build_broker_router(settings: &Settings) -> anyhow::Result<BrokerRouter> {
    let mut router = BrokerRouter::new();
    for (broker_id, broker) in &settings.brokers {
        let adapter: Arc<dyn Broker> = match broker.kind.as_str() {
            "binance" => {
                if broker.sandbox {
                    Arc::new(BinanceBroker::new_testnet(broker.api_key.clone(), broker.api_secret.clone()))
                } else {
                    Arc::new(BinanceBroker::new(broker.api_key.clone(), broker.api_secret.clone()))
                }
            }
            "oanda" => {
                let account_id = broker.account_id.clone().ok_or_else(|| anyhow::anyhow!("{broker_id}: oanda requires account_id"))?;
                let token = broker.token.clone().ok_or_else(|| anyhow::anyhow!("{broker_id}: oanda requires token"))?;
                Arc::new(OandaBroker::new(account_id, token, !broker.sandbox))
            }
            other => anyhow::bail!("{broker_id}: unknown broker kind {other}"),
        };
        router.register(adapter);
    }
    Ok(router)
}

fn build_targets(settings: &Settings) -> Vec<AnalysisTarget> {
    let mut targets = Vec::new();
    for broker_id in settings.brokers.keys() {
        for symbol in &settings.symbols {
            for timeframe in &settings.timeframes {
                targets.push(AnalysisTarget { broker_id: broker_id.clone(), symbol: symbol.clone(), timeframe: *timeframe });
            }
        }
    }
    targets
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    util::tracing_setup::init();
    let cli = Cli::parse();
    let env = cli.env.or_else(|| std::env::var("TRADER_ENV").ok()).unwrap_or_else(|| "development".to_string());
    let settings = Settings::load(&env)?;
    info!(%env, brokers = settings.brokers.len(), symbols = settings.symbols.len(), "settings loaded");

    let db_opts = match settings.trading_mode {
        trading::types::TradingMode::Dev => DbOptions::memory(),
        _ => DbOptions::rocksdb(std::env::var("TRADER_DB_PATH").unwrap_or_else(|_| "./data/trader-db".to_string())),
    };
    let store = get_or_create(&db_opts, &[])?;

    let instruments = Arc::new(build_instrument_registry(&settings));
    let router = build_broker_router(&settings)?;

    let metrics = Arc::new(Metrics::new()?);

    let risk_config = settings.to_risk_config();
    let risk = Arc::new(
        account::RiskManager::new(store.clone(), instruments.clone(), risk_config)?
            .with_alerts(Arc::new(util::alerts::TracingAlertSink))
            .with_metrics(metrics.clone()),
    );

    let fee_rate = Decimal::from_str(DEFAULT_FEE_RATE).unwrap();
    let engine = Arc::new(
        ExecutionEngine::new(router.clone(), risk.clone(), store.clone(), settings.trading_mode, fee_rate, settings.tp1_close_pct)
            .with_alerts(Arc::new(util::alerts::TracingAlertSink)),
    );

    let detector: Arc<dyn DivergenceDetector> = Arc::new(DeterministicDetector::new(DeterministicDetectorConfig::default()));

    let cycle_config = AnalysisCycleConfig {
        targets: build_targets(&settings),
        lookback_candles: settings.lookback_candles,
        periods: settings.indicator_periods.to_periods(),
        validator: settings.validator.to_validator_config(),
        multi_tf_enabled: settings.multi_tf.enabled,
        setup_expiry_hours: settings.multi_tf.setup_expiry_hours,
        risk_reward: Decimal::from_f64_retain(settings.validator.min_risk_reward).unwrap_or(Decimal::from(2)),
    };
    let min_confidence_for = {
        let settings = settings.clone();
        Box::new(move |broker_id: &str| settings.min_confidence_for(broker_id))
    };
    let min_risk_reward_for = {
        let settings = settings.clone();
        Box::new(move |broker_id: &str| settings.min_risk_reward_for(broker_id))
    };
    let mut analysis_cycle = AnalysisCycle::new(cycle_config, router.clone(), detector, engine.clone(), store.clone(), instruments.clone(), min_confidence_for, min_risk_reward_for)
        .with_alerts(Arc::new(util::alerts::TracingAlertSink))
        .with_metrics(metrics.clone());
    analysis_cycle.seed_candle_cache().await;
    let analysis_cycle = Arc::new(tokio::sync::Mutex::new(analysis_cycle));

    let position_monitor = Arc::new(
        PositionMonitor::new(router.clone(), store.clone(), settings.trading_mode, fee_rate)
            .with_alerts(Arc::new(util::alerts::TracingAlertSink)),
    );

    let outcome_tracker = Arc::new(outcome::OutcomeTracker::new(store.clone()));

    let market_data_broker = router.all().into_iter().next().ok_or_else(|| anyhow::anyhow!("no brokers configured"))?;

    let schedule_config = ScheduleConfig {
        analysis_cycle_interval: std::time::Duration::from_secs(settings.analysis_interval_minutes * 60),
        ..ScheduleConfig::default()
    };
    let scheduler = Scheduler::start(schedule_config, analysis_cycle, position_monitor, outcome_tracker, store.clone(), market_data_broker);

    let health_state = actix_web::web::Data::new(HealthState { store: store.clone(), router: router.clone(), metrics: metrics.clone() });
    let port = settings.api.port;
    let http_server = HttpServer::new(move || {
        App::new().wrap(Cors::permissive()).app_data(health_state.clone()).configure(health::configure)
    })
    .bind(("0.0.0.0", port))?
    .run();
    let http_handle = http_server.handle();
    let http_task = tokio::spawn(http_server);

    info!(port, "health server listening");

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");

    http_handle.stop(true).await;
    let _ = http_task.await;
    scheduler.shutdown().await;
    router.close_all().await?;

    let shutdown_alerts: Arc<dyn util::alerts::AlertSink> = Arc::new(util::alerts::TracingAlertSink);
    shutdown_alerts.send(util::alerts::AlertLevel::Info, "trader shut down cleanly");

    info!("shutdown complete");
    Ok(())
}

/// Resolves on either SIGINT (Ctrl-C) or SIGTERM. Unix-only signal handling since the
/// deployment target is server/container, matching the broker adapters'
/// lack of any Windows-specific code path.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
