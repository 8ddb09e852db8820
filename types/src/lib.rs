//! Fundamental types for the WETH ledger.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! account addresses and raw token amounts.

pub mod address;
pub mod amount;
pub mod error;

pub use address::Address;
pub use amount::WethAmount;
pub use error::TypesError;
