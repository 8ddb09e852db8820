//! Shared utilities for the WETH ledger workspace.

pub mod logging;

pub use logging::{init_logging, LogFormat, UnknownLogFormat};
