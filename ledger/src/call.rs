//! The public call boundary.
//!
//! An [`Invocation`] is what an external caller submits: who is calling, how
//! much native value accompanies the call, and which operation (if any) it
//! names. Raw value receipt with no operation is a fallback deposit and goes
//! through the same credit routine as an explicit deposit.

use serde::{Deserialize, Serialize};
use tracing::debug;
use weth_types::{Address, WethAmount};

use crate::bank::NativeBank;
use crate::error::LedgerError;
use crate::ledger::Ledger;

/// A named operation on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    Deposit,
    Withdraw { amount: WethAmount },
    Transfer { to: Address, amount: WethAmount },
    Approve { spender: Address, amount: WethAmount },
    TransferFrom {
        from: Address,
        to: Address,
        amount: WethAmount,
    },
    BalanceOf { account: Address },
    Allowance { owner: Address, spender: Address },
    TotalSupply,
}

impl Call {
    /// Whether native value may accompany this call.
    pub fn is_payable(&self) -> bool {
        matches!(self, Call::Deposit)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Call::Deposit => "deposit",
            Call::Withdraw { .. } => "withdraw",
            Call::Transfer { .. } => "transfer",
            Call::Approve { .. } => "approve",
            Call::TransferFrom { .. } => "transfer_from",
            Call::BalanceOf { .. } => "balance_of",
            Call::Allowance { .. } => "allowance",
            Call::TotalSupply => "total_supply",
        }
    }
}

/// One external call against the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub caller: Address,
    /// Native value sent along with the call.
    pub value: WethAmount,
    /// `None` means raw value receipt (fallback deposit).
    pub call: Option<Call>,
}

impl Invocation {
    pub fn new(caller: Address, call: Call) -> Self {
        Self {
            caller,
            value: WethAmount::ZERO,
            call: Some(call),
        }
    }

    /// An explicit deposit carrying `value`.
    pub fn deposit(caller: Address, value: WethAmount) -> Self {
        Self {
            caller,
            value,
            call: Some(Call::Deposit),
        }
    }

    /// Value sent to the ledger without naming an operation.
    pub fn send_value(caller: Address, value: WethAmount) -> Self {
        Self {
            caller,
            value,
            call: None,
        }
    }
}

/// Successful result of a dispatched call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A state transition was committed.
    Accepted,
    /// A read returned this amount.
    Amount(WethAmount),
}

impl Ledger {
    /// Route an invocation to the matching operation.
    pub fn dispatch(
        &mut self,
        bank: &dyn NativeBank,
        invocation: Invocation,
    ) -> Result<Outcome, LedgerError> {
        let Invocation {
            caller,
            value,
            call,
        } = invocation;

        let Some(call) = call else {
            debug!(account = %caller, amount = value.raw(), "fallback deposit");
            self.deposit(&caller, value)?;
            return Ok(Outcome::Accepted);
        };

        if !value.is_zero() && !call.is_payable() {
            debug!(account = %caller, call = call.name(), "value sent to non-payable call");
            return Err(LedgerError::NonPayable);
        }

        match call {
            Call::Deposit => self.deposit(&caller, value)?,
            Call::Withdraw { amount } => self.withdraw(bank, &caller, amount)?,
            Call::Transfer { to, amount } => self.transfer(&caller, &to, amount)?,
            Call::Approve { spender, amount } => self.approve(&caller, &spender, amount)?,
            Call::TransferFrom { from, to, amount } => {
                self.transfer_from(&caller, &from, &to, amount)?
            }
            Call::BalanceOf { account } => return Ok(Outcome::Amount(self.balance_of(&account))),
            Call::Allowance { owner, spender } => {
                return Ok(Outcome::Amount(self.allowance(&owner, &spender)))
            }
            Call::TotalSupply => return Ok(Outcome::Amount(self.total_supply())),
        }
        Ok(Outcome::Accepted)
    }
}
