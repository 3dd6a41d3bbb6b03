use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Weak};

use csv::Writer;
use log::{debug, info, warn};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::accounts::{Account, AccountId};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::payments::scheduled_payment::{self, PaymentId, PaymentStatus, ScheduledPayment};

/// Shared handle to the ledger. Clones refer to the same store.
///
/// Every operation takes the store's single lock for its whole critical
/// section, so operations on unrelated accounts still serialize.
#[derive(Debug, Clone)]
pub struct Ledger {
    state: Arc<RwLock<LedgerState>>,
    config: LedgerConfig,
}

#[derive(Debug)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    scheduled: HashMap<PaymentId, ScheduledPayment>,
    next_payment_seq: u64,
}

impl LedgerState {
    fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            scheduled: HashMap::new(),
            next_payment_seq: 1,
        }
    }

    /// One combined error naming every id that is absent.
    fn ensure_accounts(&self, ids: [&str; 2]) -> Result<()> {
        let missing: Vec<&str> = ids
            .into_iter()
            .filter(|id| !self.accounts.contains_key(*id))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::missing_accounts(missing))
        }
    }

    fn account(&self, account_id: &str) -> Result<&Account> {
        self.accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::missing_accounts([account_id]))
    }

    fn account_mut(&mut self, account_id: &str) -> Result<&mut Account> {
        self.accounts
            .get_mut(account_id)
            .ok_or_else(|| LedgerError::missing_accounts([account_id]))
    }
}

fn rejected(op: &str, err: LedgerError) -> LedgerError {
    warn!("{op} rejected: {err}");
    err
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState::new())),
            config,
        }
    }

    /// Insert the account, replacing any existing account with the same id.
    pub fn create_account(&self, timestamp: i64, account_id: &str, initial_balance: Decimal) -> Account {
        let account = Account::new(account_id, initial_balance, timestamp);
        let previous = self
            .state
            .write()
            .accounts
            .insert(account_id.to_string(), account.clone());

        if previous.is_some() {
            info!("replaced account {account_id} with balance {initial_balance}");
        } else {
            info!("created account {account_id} with balance {initial_balance}");
        }
        account
    }

    /// Move `amount` from one account to another. Both must exist and the
    /// source must hold at least `amount`; on failure nothing changes.
    pub fn transfer(&self, timestamp: i64, from_id: &str, to_id: &str, amount: Decimal) -> Result<()> {
        let mut state = self.state.write();
        state
            .ensure_accounts([from_id, to_id])
            .map_err(|err| rejected("transfer", err))?;

        let from = state.account_mut(from_id)?;
        if !from.debit(amount) {
            let err = LedgerError::InsufficientBalance {
                account_id: from_id.to_string(),
                balance: from.balance,
                requested: amount,
            };
            return Err(rejected("transfer", err));
        }
        from.touch(timestamp);

        let to = state.account_mut(to_id)?;
        to.credit(amount);
        to.touch(timestamp);

        info!("transferred {amount} from {from_id} to {to_id} at {timestamp}");
        Ok(())
    }

    /// Register a debit of `amount` against `account_id` that fires at
    /// `timestamp + delay_seconds` (Unix seconds), or immediately if that
    /// instant has passed.
    ///
    /// When it fires the debit re-checks the account under the lock and
    /// silently does nothing if the account is gone or short of funds. A fired
    /// debit does not change `updated_at`.
    ///
    /// Every call draws the next value of the ledger-wide payment counter,
    /// including calls that are rejected, so ids are never reused.
    pub fn schedule_payment(
        &self,
        timestamp: i64,
        account_id: &str,
        amount: Decimal,
        delay_seconds: i64,
    ) -> Result<PaymentId> {
        let delay = scheduled_payment::fire_delay(self.config.clock.as_ref(), timestamp, delay_seconds);

        let mut state = self.state.write();
        let seq = state.next_payment_seq;
        state.next_payment_seq += 1;
        state
            .account(account_id)
            .map_err(|err| rejected("schedule", err))?;

        let payment_id = PaymentId::new(&self.config.payment_id_prefix, account_id, seq);
        let ledger = Arc::downgrade(&self.state);
        let fire_id = payment_id.clone();
        // The timer cannot observe the registry before this section ends, even
        // with a zero delay, because firing takes the same lock.
        let wake = scheduled_payment::arm(&payment_id, delay, move || fire(&ledger, &fire_id))
            .map_err(LedgerError::TimerSpawn)?;

        state
            .scheduled
            .insert(payment_id.clone(), ScheduledPayment::new(account_id, amount, wake));

        info!("scheduled payment {payment_id} of {amount} from {account_id} in {delay:?}");
        Ok(payment_id)
    }

    /// Stop a payment that has not fired yet and drop it from the registry.
    /// A payment that already fired stays registered and cannot be cancelled.
    pub fn cancel_scheduled_payment(&self, payment_id: &str) -> Result<()> {
        let mut state = self.state.write();
        let Some(payment) = state.scheduled.get_mut(payment_id) else {
            return Err(rejected("cancel", LedgerError::PaymentNotFound(payment_id.to_string())));
        };

        if !payment.stop() {
            return Err(rejected("cancel", LedgerError::AlreadyExecuted(payment_id.to_string())));
        }
        state.scheduled.remove(payment_id);

        info!("cancelled payment {payment_id}");
        Ok(())
    }

    /// Fold `from_id` into `to_id` and delete `from_id`.
    ///
    /// Scheduled payments against `from_id` are left registered; they no-op
    /// when they fire. Merging an account into itself doubles it and then
    /// deletes it like any other source.
    pub fn merge_accounts(&self, timestamp: i64, from_id: &str, to_id: &str) -> Result<()> {
        let mut state = self.state.write();
        state
            .ensure_accounts([from_id, to_id])
            .map_err(|err| rejected("merge", err))?;

        let source = state.account(from_id)?.clone();
        let dest = state.account_mut(to_id)?;
        dest.absorb(&source);
        dest.touch(timestamp);
        state.accounts.remove(from_id);

        info!("merged account {from_id} into {to_id} at {timestamp}");
        Ok(())
    }

    pub fn account(&self, account_id: &str) -> Option<Account> {
        self.state.read().accounts.get(account_id).cloned()
    }

    /// Snapshot of every account, ordered by id.
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.state.read().accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        accounts
    }

    /// Status of a registered payment. Cancelled payments are no longer
    /// registered and report `None`.
    pub fn payment_status(&self, payment_id: &str) -> Option<PaymentStatus> {
        self.state
            .read()
            .scheduled
            .get(payment_id)
            .and_then(ScheduledPayment::status)
    }

    pub fn pending_payments(&self) -> usize {
        self.state
            .read()
            .scheduled
            .values()
            .filter(|p| p.is_pending())
            .count()
    }

    /// Write all accounts in CSV format. The snapshot is taken first so no
    /// I/O happens under the lock.
    pub fn write_accounts_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let accounts = self.accounts();
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record(["account", "balance", "total_transferred", "updated_at"])?;

        for account in &accounts {
            wtr.serialize((
                &account.account_id,
                account.balance,
                account.total_transferred,
                account.updated_at,
            ))?;
        }

        wtr.flush()?;
        Ok(())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer callback for a scheduled payment. Claims the payment under the write
/// lock; whichever of this and `cancel_scheduled_payment` flips the pending
/// status first wins.
fn fire(ledger: &Weak<RwLock<LedgerState>>, payment_id: &PaymentId) {
    let Some(state) = ledger.upgrade() else {
        debug!("ledger dropped before payment {payment_id} fired");
        return;
    };
    let mut guard = state.write();
    let LedgerState { accounts, scheduled, .. } = &mut *guard;

    let Some(payment) = scheduled.get_mut(payment_id) else {
        return;
    };
    if !payment.is_pending() {
        return;
    }

    let debited = accounts
        .get_mut(payment.account_id())
        .is_some_and(|account| account.debit(payment.amount()));
    payment.mark_fired(debited);

    if debited {
        debug!("payment {payment_id} debited {} from {}", payment.amount(), payment.account_id());
    } else {
        debug!("payment {payment_id} skipped: {} missing or short of {}", payment.account_id(), payment.amount());
    }
}
