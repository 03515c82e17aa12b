//! OANDA FX/CFD adapter.
#[macro_use]
extern crate tracing;

mod adapter;
mod convert;
mod wire;

pub use adapter::OandaBroker;

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::Broker;

    #[test]
    fn broker_id_is_oanda() {
        let broker = OandaBroker::new("001-001-1".into(), "token".into(), false);
        assert_eq!(broker.broker_id(), "oanda");
    }

    #[test]
    fn instrument_notation_uses_underscore() {
        assert_eq!(convert::to_oanda_instrument("EUR/USD"), "EUR_USD");
    }
}
