//! The ledger state and its five state transitions.

use std::collections::HashMap;

use tracing::{debug, warn};
use weth_types::{Address, WethAmount};

use crate::bank::NativeBank;
use crate::error::LedgerError;
use crate::event::{EventBus, LedgerEvent};

/// Balances, allowances and supply of the wrapped token.
///
/// Every operation validates against the current state, computes all new
/// values with checked arithmetic, and only then writes. A rejected call
/// leaves no trace and emits nothing.
///
/// `total_supply` equals the sum of all balances in every reachable state.
#[derive(Debug, Default)]
pub struct Ledger {
    pub(crate) balances: HashMap<Address, WethAmount>,
    pub(crate) allowances: HashMap<(Address, Address), WethAmount>,
    pub(crate) total_supply: WethAmount,
    events: EventBus,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Reads ──────────────────────────────────────────────────────────

    pub fn balance_of(&self, account: &Address) -> WethAmount {
        self.balances.get(account).copied().unwrap_or(WethAmount::ZERO)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> WethAmount {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(WethAmount::ZERO)
    }

    pub fn total_supply(&self) -> WethAmount {
        self.total_supply
    }

    /// Number of accounts that have ever held a balance entry.
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    /// Register an observer for every committed operation.
    pub fn subscribe(&mut self, listener: Box<dyn Fn(&LedgerEvent) + Send + Sync>) {
        self.events.subscribe(listener);
    }

    // ── Transitions ────────────────────────────────────────────────────

    /// Credit `amount` native units, already received with the call, to `caller`.
    ///
    /// Shared by the explicit deposit and the fallback path.
    pub fn deposit(&mut self, caller: &Address, amount: WethAmount) -> Result<(), LedgerError> {
        let balance = self
            .balance_of(caller)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        self.balances.insert(*caller, balance);
        self.total_supply = supply;

        debug!(account = %caller, amount = amount.raw(), "deposit");
        self.events.emit(&LedgerEvent::Deposit {
            account: *caller,
            amount,
        });
        Ok(())
    }

    /// Burn `amount` of `caller`'s balance and release the native units through `bank`.
    ///
    /// If the bank fails, balance and supply are restored and the bank error
    /// is returned as [`LedgerError::Payout`].
    pub fn withdraw(
        &mut self,
        bank: &dyn NativeBank,
        caller: &Address,
        amount: WethAmount,
    ) -> Result<(), LedgerError> {
        let available = self.balance_of(caller);
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                needed: amount.raw(),
                available: available.raw(),
            })?;
        let previous_supply = self.total_supply;
        let supply = previous_supply
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow)?;

        self.balances.insert(*caller, remaining);
        self.total_supply = supply;

        if let Err(e) = bank.release(caller, amount) {
            self.balances.insert(*caller, available);
            self.total_supply = previous_supply;
            warn!(account = %caller, amount = amount.raw(), error = %e, "withdrawal rolled back");
            return Err(LedgerError::Payout(e));
        }

        debug!(account = %caller, amount = amount.raw(), "withdrawal");
        self.events.emit(&LedgerEvent::Withdrawal {
            account: *caller,
            amount,
        });
        Ok(())
    }

    /// Move `amount` from `caller` to `to`.
    pub fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: WethAmount,
    ) -> Result<(), LedgerError> {
        let (from_balance, to_balance) = self.plan_move(caller, to, amount)?;

        self.balances.insert(*caller, from_balance);
        self.balances.insert(*to, to_balance);

        debug!(from = %caller, to = %to, amount = amount.raw(), "transfer");
        self.events.emit(&LedgerEvent::Transfer {
            from: *caller,
            to: *to,
            amount,
        });
        Ok(())
    }

    /// Set (not increment) the allowance `spender` may move out of `caller`'s balance.
    pub fn approve(
        &mut self,
        caller: &Address,
        spender: &Address,
        amount: WethAmount,
    ) -> Result<(), LedgerError> {
        self.allowances.insert((*caller, *spender), amount);

        debug!(owner = %caller, spender = %spender, amount = amount.raw(), "approval");
        self.events.emit(&LedgerEvent::Approval {
            owner: *caller,
            spender: *spender,
            amount,
        });
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `caller`, consuming allowance.
    ///
    /// The balance check runs before the allowance check; the first failing
    /// condition determines the error. There is no unlimited-allowance value:
    /// every allowance is decremented.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: WethAmount,
    ) -> Result<(), LedgerError> {
        let (from_balance, to_balance) = self.plan_move(from, to, amount)?;
        let allowed = self.allowance(from, caller);
        let remaining_allowance =
            allowed
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientAllowance {
                    needed: amount.raw(),
                    available: allowed.raw(),
                })?;

        self.balances.insert(*from, from_balance);
        self.balances.insert(*to, to_balance);
        self.allowances.insert((*from, *caller), remaining_allowance);

        debug!(
            spender = %caller,
            from = %from,
            to = %to,
            amount = amount.raw(),
            "delegated transfer"
        );
        self.events.emit(&LedgerEvent::Transfer {
            from: *from,
            to: *to,
            amount,
        });
        Ok(())
    }

    /// Compute the post-move balances of `from` and `to` without writing.
    ///
    /// When `from == to` both returned balances are the unchanged balance.
    fn plan_move(
        &self,
        from: &Address,
        to: &Address,
        amount: WethAmount,
    ) -> Result<(WethAmount, WethAmount), LedgerError> {
        let available = self.balance_of(from);
        let from_balance =
            available
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientBalance {
                    needed: amount.raw(),
                    available: available.raw(),
                })?;
        if from == to {
            return Ok((available, available));
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok((from_balance, to_balance))
    }

    // ── Integrity ──────────────────────────────────────────────────────

    /// Verify that total supply equals the sum of all balances.
    pub fn check_conservation(&self) -> Result<(), LedgerError> {
        let mut sum = WethAmount::ZERO;
        for balance in self.balances.values() {
            sum = sum.checked_add(*balance).ok_or(LedgerError::Overflow)?;
        }
        if sum != self.total_supply {
            return Err(LedgerError::Conservation {
                supply: self.total_supply.raw(),
                balances: sum.raw(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::BankError;
    use std::sync::{Arc, Mutex};

    /// Records releases; fails every release when `fail` is set.
    #[derive(Default)]
    struct RecordingBank {
        released: Mutex<Vec<(Address, WethAmount)>>,
        fail: bool,
    }

    impl NativeBank for RecordingBank {
        fn release(&self, to: &Address, amount: WethAmount) -> Result<(), BankError> {
            if self.fail {
                return Err(BankError::Unavailable("offline".into()));
            }
            self.released.lock().unwrap().push((*to, amount));
            Ok(())
        }
    }

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn amt(raw: u128) -> WethAmount {
        WethAmount::new(raw)
    }

    fn recorder(ledger: &mut Ledger) -> Arc<Mutex<Vec<LedgerEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        ledger.subscribe(Box::new(move |e| sink.lock().unwrap().push(e.clone())));
        events
    }

    #[test]
    fn fresh_ledger_is_empty() {
        let ledger = Ledger::new();
        assert_eq!(ledger.total_supply(), WethAmount::ZERO);
        assert_eq!(ledger.balance_of(&addr(1)), WethAmount::ZERO);
        assert_eq!(ledger.allowance(&addr(1), &addr(2)), WethAmount::ZERO);
        ledger.check_conservation().unwrap();
    }

    #[test]
    fn deposits_credit_each_account_and_supply() {
        let mut ledger = Ledger::new();
        ledger.deposit(&addr(1), amt(10)).unwrap();
        assert_eq!(ledger.total_supply(), amt(10));
        assert_eq!(ledger.balance_of(&addr(1)), amt(10));

        ledger.deposit(&addr(2), amt(10)).unwrap();
        assert_eq!(ledger.total_supply(), amt(20));
        assert_eq!(ledger.balance_of(&addr(1)), amt(10));
        assert_eq!(ledger.balance_of(&addr(2)), amt(10));
    }

    #[test]
    fn zero_deposit_is_a_noop_that_still_notifies() {
        let mut ledger = Ledger::new();
        let events = recorder(&mut ledger);
        ledger.deposit(&addr(1), WethAmount::ZERO).unwrap();
        assert_eq!(ledger.total_supply(), WethAmount::ZERO);
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn deposit_overflow_is_rejected_without_change() {
        let mut ledger = Ledger::new();
        ledger.deposit(&addr(1), WethAmount::MAX).unwrap();
        let err = ledger.deposit(&addr(2), amt(1)).unwrap_err();
        assert!(matches!(err, LedgerError::Overflow));
        assert_eq!(ledger.balance_of(&addr(2)), WethAmount::ZERO);
        assert_eq!(ledger.total_supply(), WethAmount::MAX);
    }

    #[test]
    fn transfer_moves_balance_and_rejects_overdraft() {
        let mut ledger = Ledger::new();
        ledger.deposit(&addr(1), amt(10)).unwrap();
        ledger.transfer(&addr(1), &addr(2), amt(5)).unwrap();
        assert_eq!(ledger.balance_of(&addr(1)), amt(5));
        assert_eq!(ledger.balance_of(&addr(2)), amt(5));

        let err = ledger.transfer(&addr(2), &addr(3), amt(100)).unwrap_err();
        match err {
            LedgerError::InsufficientBalance { needed, available } => {
                assert_eq!(needed, 100);
                assert_eq!(available, 5);
            }
            other => panic!("Expected InsufficientBalance, got {other:?}"),
        }
        assert_eq!(ledger.balance_of(&addr(2)), amt(5));
        assert_eq!(ledger.balance_of(&addr(3)), WethAmount::ZERO);
        ledger.check_conservation().unwrap();
    }

    #[test]
    fn self_transfer_has_no_net_effect_but_is_checked() {
        let mut ledger = Ledger::new();
        ledger.deposit(&addr(1), amt(10)).unwrap();
        ledger.transfer(&addr(1), &addr(1), amt(10)).unwrap();
        assert_eq!(ledger.balance_of(&addr(1)), amt(10));

        let err = ledger.transfer(&addr(1), &addr(1), amt(11)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.total_supply(), amt(10));
    }

    #[test]
    fn full_balance_transfer_succeeds_one_more_fails() {
        let mut ledger = Ledger::new();
        ledger.deposit(&addr(1), amt(7)).unwrap();
        assert!(ledger.transfer(&addr(1), &addr(2), amt(8)).is_err());
        ledger.transfer(&addr(1), &addr(2), amt(7)).unwrap();
        assert_eq!(ledger.balance_of(&addr(1)), WethAmount::ZERO);
        assert_eq!(ledger.balance_of(&addr(2)), amt(7));
    }

    #[test]
    fn approve_overwrites() {
        let mut ledger = Ledger::new();
        ledger.approve(&addr(1), &addr(2), amt(5)).unwrap();
        ledger.approve(&addr(1), &addr(2), amt(5)).unwrap();
        assert_eq!(ledger.allowance(&addr(1), &addr(2)), amt(5));

        ledger.approve(&addr(1), &addr(2), amt(3)).unwrap();
        assert_eq!(ledger.allowance(&addr(1), &addr(2)), amt(3));

        ledger.approve(&addr(1), &addr(2), WethAmount::ZERO).unwrap();
        assert_eq!(ledger.allowance(&addr(1), &addr(2)), WethAmount::ZERO);
        // Direction matters.
        assert_eq!(ledger.allowance(&addr(2), &addr(1)), WethAmount::ZERO);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let mut ledger = Ledger::new();
        let (a, b, c) = (addr(1), addr(2), addr(3));
        ledger.deposit(&a, amt(10)).unwrap();
        ledger.approve(&a, &b, amt(5)).unwrap();

        ledger.transfer_from(&b, &a, &c, amt(5)).unwrap();
        assert_eq!(ledger.balance_of(&a), amt(5));
        assert_eq!(ledger.balance_of(&c), amt(5));
        assert_eq!(ledger.allowance(&a, &b), WethAmount::ZERO);

        let err = ledger.transfer_from(&b, &a, &c, amt(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { needed: 1, available: 0 }));
    }

    #[test]
    fn transfer_from_checks_balance_before_allowance() {
        let mut ledger = Ledger::new();
        let (a, b, c) = (addr(1), addr(2), addr(3));
        ledger.deposit(&a, amt(3)).unwrap();
        // Both checks fail: balance is reported.
        let err = ledger.transfer_from(&b, &a, &c, amt(5)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        // Balance suffices, allowance does not.
        ledger.approve(&a, &b, amt(2)).unwrap();
        let err = ledger.transfer_from(&b, &a, &c, amt(3)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { needed: 3, available: 2 }));
        assert_eq!(ledger.balance_of(&a), amt(3));
        assert_eq!(ledger.allowance(&a, &b), amt(2));
    }

    #[test]
    fn transfer_from_with_exact_allowance_boundary() {
        let mut ledger = Ledger::new();
        let (a, b, c) = (addr(1), addr(2), addr(3));
        ledger.deposit(&a, amt(10)).unwrap();
        ledger.approve(&a, &b, amt(4)).unwrap();
        assert!(ledger.transfer_from(&b, &a, &c, amt(5)).is_err());
        ledger.transfer_from(&b, &a, &c, amt(4)).unwrap();
        assert_eq!(ledger.allowance(&a, &b), WethAmount::ZERO);
    }

    #[test]
    fn max_allowance_is_decremented_like_any_other() {
        let mut ledger = Ledger::new();
        let (a, b) = (addr(1), addr(2));
        ledger.deposit(&a, amt(10)).unwrap();
        ledger.approve(&a, &b, WethAmount::MAX).unwrap();
        ledger.transfer_from(&b, &a, &b, amt(10)).unwrap();
        assert_eq!(
            ledger.allowance(&a, &b),
            WethAmount::new(u128::MAX - 10)
        );
    }

    #[test]
    fn owner_needs_allowance_for_own_transfer_from() {
        let mut ledger = Ledger::new();
        let (a, c) = (addr(1), addr(3));
        ledger.deposit(&a, amt(10)).unwrap();
        let err = ledger.transfer_from(&a, &a, &c, amt(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
    }

    #[test]
    fn withdraw_releases_native_units() {
        let mut ledger = Ledger::new();
        let bank = RecordingBank::default();
        ledger.deposit(&addr(1), amt(10)).unwrap();
        ledger.withdraw(&bank, &addr(1), amt(5)).unwrap();
        assert_eq!(ledger.balance_of(&addr(1)), amt(5));
        assert_eq!(ledger.total_supply(), amt(5));
        assert_eq!(*bank.released.lock().unwrap(), vec![(addr(1), amt(5))]);
    }

    #[test]
    fn withdraw_full_balance_then_one_more_fails() {
        let mut ledger = Ledger::new();
        let bank = RecordingBank::default();
        ledger.deposit(&addr(1), amt(10)).unwrap();
        ledger.withdraw(&bank, &addr(1), amt(10)).unwrap();
        let err = ledger.withdraw(&bank, &addr(1), amt(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { needed: 1, available: 0 }));
        assert_eq!(bank.released.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_payout_rolls_back_and_stays_silent() {
        let mut ledger = Ledger::new();
        ledger.deposit(&addr(1), amt(10)).unwrap();
        let events = recorder(&mut ledger);
        let bank = RecordingBank {
            fail: true,
            ..Default::default()
        };

        let err = ledger.withdraw(&bank, &addr(1), amt(4)).unwrap_err();
        assert!(matches!(err, LedgerError::Payout(BankError::Unavailable(_))));
        assert_eq!(ledger.balance_of(&addr(1)), amt(10));
        assert_eq!(ledger.total_supply(), amt(10));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn events_follow_committed_operations_only() {
        let mut ledger = Ledger::new();
        let events = recorder(&mut ledger);
        let bank = RecordingBank::default();
        let (a, b, c) = (addr(1), addr(2), addr(3));

        ledger.deposit(&a, amt(10)).unwrap();
        ledger.transfer(&a, &b, amt(2)).unwrap();
        ledger.approve(&a, &b, amt(3)).unwrap();
        ledger.transfer_from(&b, &a, &c, amt(3)).unwrap();
        ledger.withdraw(&bank, &a, amt(5)).unwrap();
        assert!(ledger.transfer(&c, &a, amt(99)).is_err());

        let recorded = events.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec![
                LedgerEvent::Deposit { account: a, amount: amt(10) },
                LedgerEvent::Transfer { from: a, to: b, amount: amt(2) },
                LedgerEvent::Approval { owner: a, spender: b, amount: amt(3) },
                LedgerEvent::Transfer { from: a, to: c, amount: amt(3) },
                LedgerEvent::Withdrawal { account: a, amount: amt(5) },
            ]
        );
    }

    #[test]
    fn deposit_withdraw_round_trip_restores_state() {
        let mut ledger = Ledger::new();
        let bank = RecordingBank::default();
        ledger.deposit(&addr(9), amt(3)).unwrap();
        let before_balance = ledger.balance_of(&addr(1));
        let before_supply = ledger.total_supply();

        ledger.deposit(&addr(1), amt(42)).unwrap();
        ledger.withdraw(&bank, &addr(1), amt(42)).unwrap();

        assert_eq!(ledger.balance_of(&addr(1)), before_balance);
        assert_eq!(ledger.total_supply(), before_supply);
    }

    #[test]
    fn check_conservation_detects_drift() {
        let mut ledger = Ledger::new();
        ledger.deposit(&addr(1), amt(10)).unwrap();
        ledger.total_supply = amt(11);
        let err = ledger.check_conservation().unwrap_err();
        assert!(matches!(err, LedgerError::Conservation { supply: 11, balances: 10 }));
    }
}
