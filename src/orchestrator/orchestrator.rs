use std::io::Read;

use csv::ReaderBuilder;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::accounts::Account;
use crate::engine::Ledger;
use crate::error::{LedgerError, Result};
use crate::payments::PaymentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Transfer,
    Schedule,
    Cancel,
    Merge,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Transfer => "transfer",
            Operation::Schedule => "schedule",
            Operation::Cancel => "cancel",
            Operation::Merge => "merge",
        }
    }
}

/// One row of a command batch:
/// `op,timestamp,account,counterparty,amount,delay,payment`.
/// Columns an operation does not use may be left empty.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRecord {
    pub op: Operation,
    pub timestamp: Option<i64>,
    pub account: Option<String>,
    pub counterparty: Option<String>,
    pub amount: Option<Decimal>,
    pub delay: Option<i64>,
    pub payment: Option<String>,
}

#[derive(Debug)]
pub enum CommandOutcome {
    Created(Account),
    Transferred,
    Scheduled(PaymentId),
    Cancelled,
    Merged,
    Rejected(LedgerError),
}

impl CommandOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, CommandOutcome::Rejected(_))
    }
}

fn required<T>(value: Option<T>, op: Operation, field: &'static str) -> Result<T> {
    value.ok_or(LedgerError::InvalidCommand {
        op: op.as_str(),
        field,
    })
}

fn apply(ledger: &Ledger, record: CommandRecord) -> Result<CommandOutcome> {
    let op = record.op;
    match op {
        Operation::Create => {
            let timestamp = required(record.timestamp, op, "timestamp")?;
            let account = required(record.account, op, "account")?;
            let amount = required(record.amount, op, "amount")?;
            Ok(CommandOutcome::Created(ledger.create_account(timestamp, &account, amount)))
        }
        Operation::Transfer => {
            let timestamp = required(record.timestamp, op, "timestamp")?;
            let from = required(record.account, op, "account")?;
            let to = required(record.counterparty, op, "counterparty")?;
            let amount = required(record.amount, op, "amount")?;
            ledger.transfer(timestamp, &from, &to, amount)?;
            Ok(CommandOutcome::Transferred)
        }
        Operation::Schedule => {
            let timestamp = required(record.timestamp, op, "timestamp")?;
            let account = required(record.account, op, "account")?;
            let amount = required(record.amount, op, "amount")?;
            let delay = required(record.delay, op, "delay")?;
            let payment_id = ledger.schedule_payment(timestamp, &account, amount, delay)?;
            Ok(CommandOutcome::Scheduled(payment_id))
        }
        Operation::Cancel => {
            let payment = required(record.payment, op, "payment")?;
            ledger.cancel_scheduled_payment(&payment)?;
            Ok(CommandOutcome::Cancelled)
        }
        Operation::Merge => {
            let timestamp = required(record.timestamp, op, "timestamp")?;
            let from = required(record.account, op, "account")?;
            let to = required(record.counterparty, op, "counterparty")?;
            ledger.merge_accounts(timestamp, &from, &to)?;
            Ok(CommandOutcome::Merged)
        }
    }
}

/// Apply a CSV batch of ledger commands in order.
///
/// A command the ledger rejects is recorded as `CommandOutcome::Rejected` and
/// the batch carries on. A record that cannot be decoded aborts the batch.
pub fn apply_batch<R: Read>(ledger: &Ledger, reader: R) -> Result<Vec<CommandOutcome>> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut outcomes = Vec::new();

    for result in rdr.deserialize() {
        let record: CommandRecord = result?;
        debug!("{:?}", record);
        let outcome = apply(ledger, record).unwrap_or_else(CommandOutcome::Rejected);
        outcomes.push(outcome);
    }

    let rejected = outcomes.iter().filter(|o| o.is_rejected()).count();
    info!("applied {} ledger commands, {} rejected", outcomes.len(), rejected);
    Ok(outcomes)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixedClock, LedgerConfig};
    use chrono::DateTime;
    use rust_decimal_macros::dec;

    const HEADER: &str = "op,timestamp,account,counterparty,amount,delay,payment\n";

    fn ledger() -> Ledger {
        let _ = env_logger::builder().is_test(true).try_init();
        let epoch = DateTime::from_timestamp(0, 0).unwrap();
        Ledger::with_config(LedgerConfig::default().with_clock(FixedClock(epoch)))
    }

    #[test]
    fn test_apply_batch() {
        let ledger = ledger();
        let input = format!(
            "{HEADER}\
             create, 1, a, , 1000, ,\n\
             create, 1, b, , 1000, ,\n\
             transfer, 2, a, b, 200, ,\n\
             schedule, 3, a, , 50, 3600,\n\
             cancel, , , , , , payment-a-1\n\
             merge, 4, a, b, , ,\n"
        );

        let outcomes = apply_batch(&ledger, input.as_bytes()).unwrap();
        assert_eq!(outcomes.len(), 6);
        assert!(matches!(outcomes[0], CommandOutcome::Created(ref acc) if acc.balance == dec!(1000)));
        assert!(matches!(outcomes[2], CommandOutcome::Transferred));
        assert!(matches!(outcomes[3], CommandOutcome::Scheduled(ref id) if id.as_str() == "payment-a-1"));
        assert!(matches!(outcomes[4], CommandOutcome::Cancelled));
        assert!(matches!(outcomes[5], CommandOutcome::Merged));

        assert_eq!(ledger.account("a"), None);
        let b = ledger.account("b").unwrap();
        assert_eq!(b.balance, dec!(2000));
        assert_eq!(b.total_transferred, dec!(200));
        assert_eq!(b.updated_at, 4);
    }

    #[test]
    fn test_rejections_do_not_abort_batch() {
        let ledger = ledger();
        let input = format!(
            "{HEADER}\
             create, 1, a, , 100, ,\n\
             transfer, 2, a, ghost, 10, ,\n\
             transfer, 2, a, a, 500, ,\n\
             cancel, , , , , , payment-a-9\n\
             transfer, 3, a, , 10, ,\n"
        );

        let outcomes = apply_batch(&ledger, input.as_bytes()).unwrap();
        assert_eq!(outcomes.len(), 5);
        assert!(matches!(outcomes[1], CommandOutcome::Rejected(LedgerError::AccountNotFound(_))));
        assert!(matches!(outcomes[2], CommandOutcome::Rejected(LedgerError::InsufficientBalance { .. })));
        assert!(matches!(outcomes[3], CommandOutcome::Rejected(LedgerError::PaymentNotFound(_))));
        assert!(matches!(
            outcomes[4],
            CommandOutcome::Rejected(LedgerError::InvalidCommand { field: "counterparty", .. })
        ));
        assert_eq!(ledger.account("a").unwrap().balance, dec!(100));
    }

    #[test]
    fn test_malformed_record_aborts() {
        let ledger = ledger();
        let input = format!("{HEADER}deposit, 1, a, , 100, ,\n");
        let err = apply_batch(&ledger, input.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::Csv(_)));
    }
}
