//! Single-writer, process-local `ActiveSetup` store: a
//! 4h-validated signal retained until a same-direction 1h signal confirms it
//! or its expiry elapses. No external locking — the analysis cycle is the
//! only writer. Keyed by `broker:symbol:direction` (not just `broker:symbol`)
//! so a symbol can hold simultaneous Long and Short setups.
use crate::types::ActiveSetup;
use chrono::Utc;
use signals::SignalDirection;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ActiveSetupStore {
    setups: HashMap<(String, String, SignalDirection), ActiveSetup>,
}

impl ActiveSetupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(broker_id: &str, symbol: &str, direction: SignalDirection) -> (String, String, SignalDirection) {
        (broker_id.to_string(), symbol.to_string(), direction)
    }

    pub fn insert(&mut self, setup: ActiveSetup) {
        self.setups.insert(Self::key(&setup.broker_id, &setup.symbol, setup.direction), setup);
    }

    /// Removes and returns the setup if a same-direction confirmation arrives.
    pub fn confirm(&mut self, broker_id: &str, symbol: &str, direction: SignalDirection) -> Option<ActiveSetup> {
        self.setups.remove(&Self::key(broker_id, symbol, direction))
    }

    /// Drops every setup whose `expires_at` has elapsed.
    pub fn expire(&mut self) {
        let now = Utc::now();
        self.setups.retain(|_, setup| setup.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.setups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setups.is_empty()
    }
}
