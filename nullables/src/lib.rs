//! Nullable infrastructure for deterministic testing.
//!
//! The ledger's only external dependency is the native asset it pays out on
//! withdrawal. This crate provides a test-friendly implementation that:
//! - Never moves real value
//! - Records every payout for assertions
//! - Can be told to fail, to exercise rollback paths
//!
//! Usage: swap the real bank for [`NullBank`] in tests.

pub mod bank;

pub use bank::{NullBank, Payout};
