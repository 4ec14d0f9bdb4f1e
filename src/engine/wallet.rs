#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Virtual cash ledger of a session.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Wallet {
    // Initial balance used for reset
    initial_balance: f64,
    // Available cash
    balance: f64,
}

impl Wallet {
    /// Creates a new wallet with the given initial balance.
    /// Negative balances are rejected.
    pub fn new(balance: f64) -> Result<Self> {
        if balance <= 0.0 || !balance.is_finite() {
            return Err(Error::NegZeroBalance(balance));
        }

        Ok(Self {
            balance,
            initial_balance: balance,
        })
    }

    /// Returns the initial balance.
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Returns the available cash.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Adds funds to the wallet (a position was closed).
    pub(crate) fn credit(&mut self, amount: f64) -> Result<f64> {
        if amount < 0.0 || !amount.is_finite() {
            return Err(Error::InvalidAmount(amount));
        }
        self.balance += amount;
        Ok(self.balance)
    }

    /// Removes funds from the wallet (a position was opened).
    pub(crate) fn debit(&mut self, amount: f64) -> Result<f64> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(Error::InvalidAmount(amount));
        }
        if amount > self.balance {
            return Err(Error::InsufficientFunds(amount, self.balance));
        }
        self.balance -= amount;
        Ok(self.balance)
    }

    /// Resets the wallet to its initial balance.
    pub(crate) fn reset(&mut self) {
        self.balance = self.initial_balance;
    }
}

#[cfg(test)]
#[test]
fn new_wallet_valid_balance() {
    let wallet = Wallet::new(50.0).unwrap();
    assert_eq!(wallet.balance(), 50.0);
    assert_eq!(wallet.initial_balance(), 50.0);
}

#[cfg(test)]
#[test]
fn new_wallet_invalid_balance() {
    let result = Wallet::new(0.0);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let result = Wallet::new(-10.0);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));
}

#[cfg(test)]
#[test]
fn debit_and_credit() {
    let mut wallet = Wallet::new(50.0).unwrap();

    // open position
    let balance = wallet.debit(20.0).unwrap();
    assert_eq!(balance, 30.0);

    // close profitable position
    let balance = wallet.credit(21.0).unwrap(); // 20.0 (committed) + 1.0 (profit)
    assert_eq!(balance, 51.0);
}

#[cfg(test)]
#[test]
fn debit_insufficient_funds() {
    let mut wallet = Wallet::new(50.0).unwrap();
    let result = wallet.debit(50.5);
    assert!(matches!(result, Err(Error::InsufficientFunds(_, _))));
    assert_eq!(wallet.balance(), 50.0);
}

#[cfg(test)]
#[test]
fn debit_whole_balance() {
    let mut wallet = Wallet::new(50.0).unwrap();
    assert_eq!(wallet.debit(50.0).unwrap(), 0.0);
}

#[cfg(test)]
#[test]
fn invalid_amounts() {
    let mut wallet = Wallet::new(50.0).unwrap();
    assert!(matches!(wallet.debit(0.0), Err(Error::InvalidAmount(_))));
    assert!(matches!(wallet.credit(-1.0), Err(Error::InvalidAmount(_))));
    assert!(matches!(wallet.credit(f64::NAN), Err(Error::InvalidAmount(_))));
}

#[cfg(test)]
#[test]
fn reset_wallet() {
    let mut wallet = Wallet::new(50.0).unwrap();
    wallet.debit(20.0).unwrap();
    wallet.credit(10.0).unwrap();

    wallet.reset();
    assert_eq!(wallet.balance(), 50.0);
}
