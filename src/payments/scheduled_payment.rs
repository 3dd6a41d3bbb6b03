use std::borrow::Borrow;
use std::fmt;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use chrono::DateTime;
use log::debug;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::accounts::AccountId;
use crate::config::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    /// `<prefix>-<account_id>-<seq>`; `seq` is the ledger-wide counter value at
    /// allocation time.
    pub fn new(prefix: &str, account_id: &str, seq: u64) -> Self {
        Self(format!("{prefix}-{account_id}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PaymentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    /// Fired and debited the account.
    Debited,
    /// Fired but the account was gone or short of funds.
    Skipped,
}

impl PaymentStatus {
    pub fn is_executed(self) -> bool {
        matches!(self, PaymentStatus::Debited | PaymentStatus::Skipped)
    }
}

#[derive(Debug)]
enum Stage {
    /// Waiting; dropping the sender releases the timer thread.
    Armed { _wake: Sender<()> },
    Stopped,
    Fired { debited: bool },
}

/// Registry entry for a deferred debit.
///
/// The stage only moves out of `Armed` while the ledger's write lock is held,
/// so `stop` and `mark_fired` cannot both win for the same payment.
#[derive(Debug)]
pub(crate) struct ScheduledPayment {
    account_id: AccountId,
    amount: Decimal,
    stage: Stage,
}

impl ScheduledPayment {
    pub(crate) fn new(account_id: impl Into<AccountId>, amount: Decimal, wake: Sender<()>) -> Self {
        Self {
            account_id: account_id.into(),
            amount,
            stage: Stage::Armed { _wake: wake },
        }
    }

    pub(crate) fn account_id(&self) -> &str {
        &self.account_id
    }

    pub(crate) fn amount(&self) -> Decimal {
        self.amount
    }

    /// `None` once stopped.
    pub(crate) fn status(&self) -> Option<PaymentStatus> {
        match self.stage {
            Stage::Armed { .. } => Some(PaymentStatus::Pending),
            Stage::Stopped => None,
            Stage::Fired { debited: true } => Some(PaymentStatus::Debited),
            Stage::Fired { debited: false } => Some(PaymentStatus::Skipped),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self.stage, Stage::Armed { .. })
    }

    /// Halt the timer if it has not fired yet. Returns whether the stop
    /// preempted firing.
    pub(crate) fn stop(&mut self) -> bool {
        if !self.is_pending() {
            return false;
        }
        // Replacing `Armed` drops the sender, which wakes the timer thread.
        self.stage = Stage::Stopped;
        true
    }

    pub(crate) fn mark_fired(&mut self, debited: bool) {
        self.stage = Stage::Fired { debited };
    }
}

/// Delay until `timestamp + delay_seconds` (Unix seconds) as seen by `clock`.
/// Instants that are not in the future yield a zero delay.
pub(crate) fn fire_delay(clock: &dyn Clock, timestamp: i64, delay_seconds: i64) -> Duration {
    let execute_at = timestamp.saturating_add(delay_seconds);
    match DateTime::from_timestamp(execute_at, 0) {
        Some(at) => (at - clock.now()).to_std().unwrap_or(Duration::ZERO),
        None if execute_at > 0 => Duration::MAX,
        None => Duration::ZERO,
    }
}

/// Start a timer thread that runs `on_fire` after `delay` unless the returned
/// sender is used or dropped first.
pub(crate) fn arm<F>(payment_id: &PaymentId, delay: Duration, on_fire: F) -> io::Result<Sender<()>>
where
    F: FnOnce() + Send + 'static,
{
    let (wake, wait) = mpsc::channel::<()>();
    let id = payment_id.clone();
    thread::Builder::new()
        .name(format!("timer-{id}"))
        .spawn(move || match wait.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => on_fire(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("timer for {id} released before firing");
            }
        })?;
    Ok(wake)
}
