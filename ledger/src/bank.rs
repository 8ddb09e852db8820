//! The native-asset side of the ledger.
//!
//! Deposits arrive with the call, so the ledger never pulls native value.
//! Withdrawals push value out through a [`NativeBank`], which may fail.

use thiserror::Error;
use weth_types::{Address, WethAmount};

#[derive(Debug, Error)]
pub enum BankError {
    #[error("payout to {account} rejected: {reason}")]
    Rejected { account: Address, reason: String },

    #[error("native bank unavailable: {0}")]
    Unavailable(String),
}

/// Releases native units held by the ledger back to an account.
pub trait NativeBank: Send + Sync {
    /// Send `amount` native units to `to`.
    ///
    /// An error means nothing was sent; the ledger rolls back the withdrawal.
    fn release(&self, to: &Address, amount: WethAmount) -> Result<(), BankError>;
}
