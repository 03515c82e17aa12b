//! Pluggable alert sink. The default implementation only logs; a real
//! transport is an external collaborator, same pattern as the Divergence
//! Detector's own pluggability.
use std::fmt;

/// Severity mirrors the log level a real transport would route on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "info"),
            AlertLevel::Warning => write!(f, "warning"),
            AlertLevel::Critical => write!(f, "critical"),
        }
    }
}

pub trait AlertSink: Send + Sync {
    fn send(&self, level: AlertLevel, message: &str);
}

/// Default sink: every alert becomes a structured `tracing` event. Kept as
/// the production default since a real transport (SMS/chat) is out of scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn send(&self, level: AlertLevel, message: &str) {
        match level {
            AlertLevel::Info => info!(alert = message, "alert"),
            AlertLevel::Warning => warn!(alert = message, "alert"),
            AlertLevel::Critical => error!(alert = message, "alert"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<(AlertLevel, String)>>,
    }

    impl AlertSink for RecordingSink {
        fn send(&self, level: AlertLevel, message: &str) {
            self.messages.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[test]
    fn recording_sink_captures_alerts_in_order() {
        let sink = RecordingSink::default();
        sink.send(AlertLevel::Info, "cycle started");
        sink.send(AlertLevel::Critical, "drawdown breaker tripped");
        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].0, AlertLevel::Critical);
    }
}
