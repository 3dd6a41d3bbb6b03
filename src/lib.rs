pub mod accounts;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod payments;

pub use accounts::{Account, AccountId};
pub use config::{Clock, FixedClock, LedgerConfig, SystemClock};
pub use engine::Ledger;
pub use error::{LedgerError, Result};
pub use orchestrator::{CommandOutcome, CommandRecord, Operation, apply_batch};
pub use payments::{PaymentId, PaymentStatus};
