//! Serialized access to a ledger from concurrent callers.
//!
//! Every operation takes the same exclusive lock, so the check-then-write
//! sequences inside withdraw, transfer and transfer_from are never
//! interleaved with another mutation.

use std::sync::Arc;

use tokio::sync::Mutex;
use weth_types::{Address, WethAmount};

use crate::bank::NativeBank;
use crate::call::{Invocation, Outcome};
use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::ledger::Ledger;
use crate::snapshot::LedgerSnapshot;

/// A cloneable handle owning the ledger behind a single lock, together
/// with the bank that pays out withdrawals.
#[derive(Clone)]
pub struct SharedLedger {
    ledger: Arc<Mutex<Ledger>>,
    bank: Arc<dyn NativeBank>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger, bank: Arc<dyn NativeBank>) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            bank,
        }
    }

    /// Apply one invocation atomically with respect to every other call.
    pub async fn invoke(&self, invocation: Invocation) -> Result<Outcome, LedgerError> {
        let mut ledger = self.ledger.lock().await;
        ledger.dispatch(self.bank.as_ref(), invocation)
    }

    pub async fn balance_of(&self, account: &Address) -> WethAmount {
        self.ledger.lock().await.balance_of(account)
    }

    pub async fn allowance(&self, owner: &Address, spender: &Address) -> WethAmount {
        self.ledger.lock().await.allowance(owner, spender)
    }

    pub async fn total_supply(&self) -> WethAmount {
        self.ledger.lock().await.total_supply()
    }

    pub async fn check_conservation(&self) -> Result<(), LedgerError> {
        self.ledger.lock().await.check_conservation()
    }

    pub async fn subscribe(&self, listener: Box<dyn Fn(&LedgerEvent) + Send + Sync>) {
        self.ledger.lock().await.subscribe(listener);
    }

    /// A consistent snapshot taken under the lock.
    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.lock().await.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::BankError;
    use crate::call::Call;

    struct AcceptAll;

    impl NativeBank for AcceptAll {
        fn release(&self, _to: &Address, _amount: WethAmount) -> Result<(), BankError> {
            Ok(())
        }
    }

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn shared() -> SharedLedger {
        SharedLedger::new(Ledger::new(), Arc::new(AcceptAll))
    }

    #[tokio::test]
    async fn concurrent_overdrafts_cannot_double_spend() {
        let ledger = shared();
        ledger
            .invoke(Invocation::deposit(addr(1), WethAmount::new(10)))
            .await
            .unwrap();

        // 20 tasks race to move 1 unit each out of a balance of 10.
        let mut handles = Vec::new();
        for i in 0..20u8 {
            let l = ledger.clone();
            handles.push(tokio::spawn(async move {
                l.invoke(Invocation::new(
                    addr(1),
                    Call::Transfer {
                        to: addr(100 + i),
                        amount: WethAmount::new(1),
                    },
                ))
                .await
            }));
        }

        let mut accepted = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 10);
        assert_eq!(ledger.balance_of(&addr(1)).await, WethAmount::ZERO);
        assert_eq!(ledger.total_supply().await, WethAmount::new(10));
        ledger.check_conservation().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_delegated_spends_respect_allowance() {
        let ledger = shared();
        let (owner, spender) = (addr(1), addr(2));
        ledger
            .invoke(Invocation::deposit(owner, WethAmount::new(100)))
            .await
            .unwrap();
        ledger
            .invoke(Invocation::new(
                owner,
                Call::Approve {
                    spender,
                    amount: WethAmount::new(7),
                },
            ))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let l = ledger.clone();
            handles.push(tokio::spawn(async move {
                l.invoke(Invocation::new(
                    spender,
                    Call::TransferFrom {
                        from: owner,
                        to: addr(3),
                        amount: WethAmount::new(1),
                    },
                ))
                .await
            }));
        }
        let mut accepted = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 7);
        assert_eq!(ledger.allowance(&owner, &spender).await, WethAmount::ZERO);
        assert_eq!(ledger.balance_of(&addr(3)).await, WethAmount::new(7));
        ledger.check_conservation().await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_reflects_committed_state() {
        let ledger = shared();
        ledger
            .invoke(Invocation::send_value(addr(4), WethAmount::new(3)))
            .await
            .unwrap();
        let snap = ledger.snapshot().await;
        assert_eq!(snap.total_supply, WethAmount::new(3));
        assert_eq!(snap.balances.get(&addr(4)), Some(&WethAmount::new(3)));
    }
}
