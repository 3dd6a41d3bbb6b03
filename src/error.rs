use rust_decimal::Decimal;
use thiserror::Error;

use crate::accounts::AccountId;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// One or more referenced accounts are absent. Transfers and merges report
    /// every missing side in a single error.
    #[error("account not found: {}", .0.join(", "))]
    AccountNotFound(Vec<AccountId>),

    #[error("insufficient balance in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account_id: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    /// The payment's timer could not be stopped because it already fired.
    #[error("payment already executed: {0}")]
    AlreadyExecuted(String),

    #[error("failed to start payment timer: {0}")]
    TimerSpawn(#[source] std::io::Error),

    #[error("invalid {op} command: missing {field}")]
    InvalidCommand {
        op: &'static str,
        field: &'static str,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub(crate) fn missing_accounts<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut missing: Vec<AccountId> = Vec::new();
        for id in ids {
            if !missing.iter().any(|m| m == id) {
                missing.push(id.to_string());
            }
        }
        Self::AccountNotFound(missing)
    }
}
