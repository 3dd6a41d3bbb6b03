use rust_decimal::Decimal;
use serde::Serialize;

pub type AccountId = String;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub account_id: AccountId,
    pub balance: Decimal,
    /// Sum of every outgoing debit ever applied: transfers out and executed
    /// scheduled payments.
    pub total_transferred: Decimal,
    /// Caller supplied logical timestamp of the last mutation.
    pub updated_at: i64,
}

impl Account {
    pub fn new(account_id: impl Into<AccountId>, initial_balance: Decimal, timestamp: i64) -> Self {
        Self {
            account_id: account_id.into(),
            balance: initial_balance,
            total_transferred: Decimal::ZERO,
            updated_at: timestamp,
        }
    }

    pub fn can_debit(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Debit the balance and count the amount as transferred out.
    /// Leaves the account untouched and returns false when funds are short.
    pub fn debit(&mut self, amount: Decimal) -> bool {
        if !self.can_debit(amount) {
            return false;
        }
        self.balance -= amount;
        self.total_transferred += amount;
        true
    }

    pub fn credit(&mut self, amount: Decimal) {
        self.balance += amount;
    }

    /// Fold another account's balance and outflow history into this one.
    pub fn absorb(&mut self, other: &Account) {
        self.balance += other.balance;
        self.total_transferred += other.total_transferred;
    }

    pub fn touch(&mut self, timestamp: i64) {
        self.updated_at = timestamp;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_account() {
        let acc = Account::new("alice", dec!(1000), 1);
        assert_eq!(acc.account_id, "alice");
        assert_eq!(acc.balance, dec!(1000));
        assert_eq!(acc.total_transferred, Decimal::ZERO);
        assert_eq!(acc.updated_at, 1);
    }

    #[test]
    fn test_debit() {
        let mut acc = Account::new("alice", dec!(100), 1);
        assert!(acc.debit(dec!(40)));
        assert_eq!(acc.balance, dec!(60));
        assert_eq!(acc.total_transferred, dec!(40));

        // Debit more than the balance → no change
        assert!(!acc.debit(dec!(100)));
        assert_eq!(acc.balance, dec!(60));
        assert_eq!(acc.total_transferred, dec!(40));
    }

    #[test]
    fn test_debit_exact_balance() {
        let mut acc = Account::new("alice", dec!(100), 1);
        assert!(acc.debit(dec!(100)));
        assert_eq!(acc.balance, Decimal::ZERO);
    }

    #[test]
    fn test_credit_does_not_count_as_transferred() {
        let mut acc = Account::new("bob", dec!(10), 1);
        acc.credit(dec!(5.5));
        assert_eq!(acc.balance, dec!(15.5));
        assert_eq!(acc.total_transferred, Decimal::ZERO);
    }

    #[test]
    fn test_absorb() {
        let mut source = Account::new("alice", dec!(500), 1);
        source.total_transferred = dec!(200);
        let mut dest = Account::new("bob", dec!(1000), 1);
        dest.total_transferred = dec!(50);

        dest.absorb(&source);
        assert_eq!(dest.balance, dec!(1500));
        assert_eq!(dest.total_transferred, dec!(250));
        assert_eq!(dest.updated_at, 1);
    }
}
