//! CLI subcommands and their mapping onto ledger invocations.

use clap::Subcommand;
use weth_ledger::{Call, Invocation};
use weth_types::{Address, WethAmount};

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Show token metadata and ledger totals.
    Info,
    /// Print the effective configuration as TOML.
    ShowConfig,
    /// Wrap native value for an account.
    Deposit {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        value: WethAmount,
    },
    /// Send raw native value to the ledger (credited as a deposit).
    Send {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        value: WethAmount,
    },
    /// Unwrap tokens back into native value.
    Withdraw {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        amount: WethAmount,
    },
    /// Move tokens between accounts.
    Transfer {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        amount: WethAmount,
    },
    /// Set the allowance of a spender.
    Approve {
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        amount: WethAmount,
    },
    /// Move tokens out of an owner's balance as an approved spender.
    TransferFrom {
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        amount: WethAmount,
    },
    /// Print an account balance.
    Balance {
        #[arg(long)]
        account: Address,
    },
    /// Print the remaining allowance of a spender.
    Allowance {
        #[arg(long)]
        owner: Address,
        #[arg(long)]
        spender: Address,
    },
    /// Print the total supply.
    Supply,
    /// Check that supply equals the sum of balances.
    Verify,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Info => "info",
            Command::ShowConfig => "show-config",
            Command::Deposit { .. } => "deposit",
            Command::Send { .. } => "send",
            Command::Withdraw { .. } => "withdraw",
            Command::Transfer { .. } => "transfer",
            Command::Approve { .. } => "approve",
            Command::TransferFrom { .. } => "transfer-from",
            Command::Balance { .. } => "balance",
            Command::Allowance { .. } => "allowance",
            Command::Supply => "supply",
            Command::Verify => "verify",
        }
    }

    /// Whether a successful run changes the stored ledger.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::Deposit { .. }
                | Command::Send { .. }
                | Command::Withdraw { .. }
                | Command::Transfer { .. }
                | Command::Approve { .. }
                | Command::TransferFrom { .. }
        )
    }

    /// The ledger invocation this command submits, if any.
    ///
    /// Reads are issued from the zero address; they never depend on the caller.
    pub fn invocation(&self) -> Option<Invocation> {
        let inv = match self.clone() {
            Command::Info | Command::ShowConfig | Command::Verify => return None,
            Command::Deposit { from, value } => Invocation::deposit(from, value),
            Command::Send { from, value } => Invocation::send_value(from, value),
            Command::Withdraw { from, amount } => Invocation::new(from, Call::Withdraw { amount }),
            Command::Transfer { from, to, amount } => {
                Invocation::new(from, Call::Transfer { to, amount })
            }
            Command::Approve {
                owner,
                spender,
                amount,
            } => Invocation::new(owner, Call::Approve { spender, amount }),
            Command::TransferFrom {
                spender,
                from,
                to,
                amount,
            } => Invocation::new(spender, Call::TransferFrom { from, to, amount }),
            Command::Balance { account } => {
                Invocation::new(Address::ZERO, Call::BalanceOf { account })
            }
            Command::Allowance { owner, spender } => {
                Invocation::new(Address::ZERO, Call::Allowance { owner, spender })
            }
            Command::Supply => Invocation::new(Address::ZERO, Call::TotalSupply),
        };
        Some(inv)
    }
}
