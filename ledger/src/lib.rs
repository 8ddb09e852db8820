//! Wrapped-native ledger.
//!
//! Converts a native, unit-denominated asset into a fungible token 1:1 and back.
//! The ledger keeps per-holder balances, per-owner/per-spender allowances and the
//! aggregate supply, and guarantees that supply always equals the sum of balances.
//!
//! This crate handles:
//! - The five state transitions (deposit, withdraw, transfer, approve, transfer_from)
//! - The call boundary, including fallback deposits for raw value receipt
//! - Serialized access for concurrent callers
//! - Observer notifications and snapshots

pub mod bank;
pub mod call;
pub mod error;
pub mod event;
pub mod ledger;
pub mod metadata;
pub mod shared;
pub mod snapshot;

pub use bank::{BankError, NativeBank};
pub use call::{Call, Invocation, Outcome};
pub use error::LedgerError;
pub use event::{EventBus, LedgerEvent};
pub use ledger::Ledger;
pub use metadata::TokenMetadata;
pub use shared::SharedLedger;
pub use snapshot::LedgerSnapshot;
