//! Nullable bank that records native payouts without sending them.

use std::collections::HashMap;
use std::sync::Mutex;

use weth_ledger::{BankError, NativeBank};
use weth_types::{Address, WethAmount};

/// A recorded native payout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    pub to: Address,
    pub amount: WethAmount,
}

#[derive(Default)]
struct BankState {
    /// Native units currently held on behalf of the ledger.
    reserve: u128,
    payouts: Vec<Payout>,
    paid_out: HashMap<Address, u128>,
    /// Number of upcoming releases that will fail.
    failures_pending: usize,
    always_fail: bool,
}

/// A deterministic native bank for testing.
///
/// Thread-safe so it can back a `SharedLedger` driven from tokio tasks.
pub struct NullBank {
    state: Mutex<BankState>,
}

impl NullBank {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BankState::default()),
        }
    }

    /// Record native units arriving with a deposit.
    pub fn receive(&self, amount: WethAmount) {
        let mut state = self.state.lock().unwrap();
        state.reserve += amount.raw();
    }

    /// Make the next `count` releases fail.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().unwrap().failures_pending = count;
    }

    /// Make every release fail until turned off again.
    pub fn set_always_fail(&self, fail: bool) {
        self.state.lock().unwrap().always_fail = fail;
    }

    /// Native units still held.
    pub fn reserve(&self) -> WethAmount {
        WethAmount::new(self.state.lock().unwrap().reserve)
    }

    /// Total native units paid out to `account`.
    pub fn paid_to(&self, account: &Address) -> WethAmount {
        let state = self.state.lock().unwrap();
        WethAmount::new(state.paid_out.get(account).copied().unwrap_or(0))
    }

    /// All payouts in order (for assertions).
    pub fn payouts(&self) -> Vec<Payout> {
        self.state.lock().unwrap().payouts.clone()
    }

    /// Clear all state.
    pub fn reset(&self) {
        *self.state.lock().unwrap() = BankState::default();
    }
}

impl Default for NullBank {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeBank for NullBank {
    fn release(&self, to: &Address, amount: WethAmount) -> Result<(), BankError> {
        let mut state = self.state.lock().unwrap();
        if state.always_fail {
            return Err(BankError::Unavailable("null bank set to fail".into()));
        }
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(BankError::Rejected {
                account: *to,
                reason: "injected failure".into(),
            });
        }
        if state.reserve < amount.raw() {
            return Err(BankError::Unavailable(format!(
                "reserve {} below payout {}",
                state.reserve,
                amount.raw()
            )));
        }
        state.reserve -= amount.raw();
        *state.paid_out.entry(*to).or_insert(0) += amount.raw();
        state.payouts.push(Payout { to: *to, amount });
        Ok(())
    }
}
