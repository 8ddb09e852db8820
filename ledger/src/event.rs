//! Notifications emitted by ledger operations.

use serde::{Deserialize, Serialize};
use weth_types::{Address, WethAmount};

/// Ledger-level events that observers can subscribe to via the [`EventBus`].
///
/// Emitted synchronously, only after the operation that caused them has
/// been committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Native value was wrapped and credited to `account`.
    Deposit { account: Address, amount: WethAmount },
    /// Tokens were burned and native value released to `account`.
    Withdrawal { account: Address, amount: WethAmount },
    /// Balance moved between holders, directly or through an allowance.
    Transfer {
        from: Address,
        to: Address,
        amount: WethAmount,
    },
    /// `owner` set the allowance of `spender`.
    Approval {
        owner: Address,
        spender: Address,
        amount: WethAmount,
    },
}

/// Synchronous fan-out of ledger events.
///
/// Listeners run inline, in subscription order, while the ledger is
/// borrowed; they must not call back into the ledger.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&LedgerEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&LedgerEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &LedgerEvent) {
        self.listeners.iter().for_each(|listener| listener(event));
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
