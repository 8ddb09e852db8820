//! Ledger errors.

use thiserror::Error;

use crate::bank::BankError;

/// Every way a ledger operation can be rejected.
///
/// A rejected operation never leaves partial state behind and never emits
/// an event.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient balance: need {needed}, available {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("insufficient allowance: need {needed}, available {available}")]
    InsufficientAllowance { needed: u128, available: u128 },

    #[error("arithmetic overflow in ledger computation")]
    Overflow,

    #[error("operation does not accept native value")]
    NonPayable,

    #[error("native payout failed: {0}")]
    Payout(#[from] BankError),

    #[error("supply {supply} does not match sum of balances {balances}")]
    Conservation { supply: u128, balances: u128 },

    #[error("snapshot hash mismatch")]
    SnapshotTampered,

    #[error("snapshot version {found} is not supported (expected {supported})")]
    UnsupportedSnapshotVersion { found: u32, supported: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),
}
