//! Process-local Prometheus registry: one counter per pipeline stage the
//! Analysis Cycle and Risk Manager pass through, scraped through the
//! health server rather than pushed anywhere.
use crate::error::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub cycles_run: IntCounter,
    pub signals_found: IntCounter,
    pub signals_validated: IntCounter,
    pub orders_placed: IntCounter,
    pub circuit_breaker_trips: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cycles_run = IntCounter::new("analysis_cycles_run_total", "Analysis cycles completed")?;
        let signals_found = IntCounter::new("signals_found_total", "Divergence signals detected")?;
        let signals_validated = IntCounter::new("signals_validated_total", "Signals passing validation")?;
        let orders_placed = IntCounter::new("orders_placed_total", "Orders submitted to a broker")?;
        let circuit_breaker_trips = IntCounterVec::new(
            Opts::new("circuit_breaker_trips_total", "Circuit breaker trips by broker and kind"),
            &["broker_id", "kind"],
        )?;

        registry.register(Box::new(cycles_run.clone()))?;
        registry.register(Box::new(signals_found.clone()))?;
        registry.register(Box::new(signals_validated.clone()))?;
        registry.register(Box::new(orders_placed.clone()))?;
        registry.register(Box::new(circuit_breaker_trips.clone()))?;

        Ok(Self { registry, cycles_run, signals_found, signals_validated, orders_placed, circuit_breaker_trips })
    }

    /// Renders every registered metric in the Prometheus text exposition
    /// format, for a `/metrics` handler to return verbatim.
    pub fn encode(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = Metrics::new().unwrap();
        metrics.cycles_run.inc();
        metrics.signals_found.inc_by(3);
        let rendered = metrics.encode().unwrap();
        assert!(rendered.contains("analysis_cycles_run_total 1"));
        assert!(rendered.contains("signals_found_total 3"));
    }

    #[test]
    fn circuit_breaker_trips_are_labeled_by_broker_and_kind() {
        let metrics = Metrics::new().unwrap();
        metrics.circuit_breaker_trips.with_label_values(&["binance", "drawdown"]).inc();
        let rendered = metrics.encode().unwrap();
        assert!(rendered.contains(r#"broker_id="binance""#));
        assert!(rendered.contains(r#"kind="drawdown""#));
    }
}
