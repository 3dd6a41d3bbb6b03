use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub const DEFAULT_PAYMENT_ID_PREFIX: &str = "payment";

/// Source of real time used to turn a scheduled payment's absolute fire time
/// into a delay. Ledger timestamps are never read from it.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    pub payment_id_prefix: String,
    pub clock: Arc<dyn Clock>,
}

impl LedgerConfig {
    pub fn with_payment_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.payment_id_prefix = prefix.into();
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            payment_id_prefix: DEFAULT_PAYMENT_ID_PREFIX.to_string(),
            clock: Arc::new(SystemClock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.payment_id_prefix, "payment");
        let before = Utc::now();
        let now = config.clock.now();
        assert!(now >= before);
    }

    #[test]
    fn test_overrides() {
        let instant = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let config = LedgerConfig::default()
            .with_payment_id_prefix("sched")
            .with_clock(FixedClock(instant));
        assert_eq!(config.payment_id_prefix, "sched");
        assert_eq!(config.clock.now(), instant);
    }
}
