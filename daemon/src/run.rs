//! One daemon command against the persisted ledger.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use weth_ledger::{LedgerSnapshot, Outcome, SharedLedger, TokenMetadata};

use crate::commands::Command;
use crate::journal::{OutboxBank, PayoutJournal};
use crate::state::{Outbox, StateStore};

/// Run `command` and return what should be printed.
///
/// A mutating command saves the new ledger, with any payouts it queued,
/// before a single payout reaches the journal. If that save fails the
/// stored ledger is unchanged and nothing is paid out.
pub async fn run(
    store: &dyn StateStore,
    journal: &PayoutJournal,
    command: &Command,
    json: bool,
) -> anyhow::Result<String> {
    let (ledger, mut outbox) = store.load()?;
    if !outbox.is_empty() {
        info!(pending = outbox.pending().len(), "delivering payouts left by an earlier run");
        deliver(store, journal, &ledger.snapshot(), &mut outbox)?;
    }

    let bank = Arc::new(OutboxBank::default());
    let ledger = SharedLedger::new(ledger, bank.clone());
    ledger
        .subscribe(Box::new(|event| tracing::info!(?event, "ledger event")))
        .await;

    let output = match command {
        Command::Info => {
            let meta = TokenMetadata::WETH;
            let snapshot = ledger.snapshot().await;
            if json {
                let report = serde_json::json!({
                    "name": meta.name,
                    "symbol": meta.symbol,
                    "decimals": meta.decimals,
                    "total_supply": snapshot.total_supply.raw().to_string(),
                    "accounts": snapshot.account_count(),
                });
                report.to_string()
            } else {
                format!(
                    "{} ({}), {} decimals\ntotal supply: {}\naccounts: {}",
                    meta.name,
                    meta.symbol,
                    meta.decimals,
                    snapshot.total_supply,
                    snapshot.account_count()
                )
            }
        }
        Command::Verify => {
            ledger
                .check_conservation()
                .await
                .context("ledger failed conservation check")?;
            let supply = ledger.total_supply().await;
            if json {
                let report =
                    serde_json::json!({ "conserved": true, "total_supply": supply.raw().to_string() });
                report.to_string()
            } else {
                format!("ok: total supply {supply} equals the sum of balances")
            }
        }
        other => {
            let invocation = other
                .invocation()
                .context("command does not map to a ledger call")?;
            let outcome = ledger
                .invoke(invocation)
                .await
                .with_context(|| format!("{} rejected", other.name()))?;

            if other.is_mutating() {
                for (to, amount) in bank.take() {
                    outbox.queue(to, amount);
                }
                let snapshot = ledger.snapshot().await;
                store
                    .save(&snapshot, &outbox)
                    .with_context(|| format!("{} not saved, nothing was paid out", other.name()))?;
                deliver(store, journal, &snapshot, &mut outbox)?;
            }
            render_outcome(other.name(), &outcome, json)
        }
    };
    Ok(output)
}

/// Journal the queued payouts, then save the emptied outbox.
///
/// If the journal write fails the payouts stay queued in the saved state
/// and the next run delivers them.
fn deliver(
    store: &dyn StateStore,
    journal: &PayoutJournal,
    snapshot: &LedgerSnapshot,
    outbox: &mut Outbox,
) -> anyhow::Result<()> {
    if outbox.is_empty() {
        return Ok(());
    }
    journal
        .append(outbox.pending())
        .context("payouts stay queued until the journal accepts them")?;
    outbox.clear();
    store.save(snapshot, outbox)?;
    Ok(())
}

fn render_outcome(command: &str, outcome: &Outcome, json: bool) -> String {
    if json {
        let report = match outcome {
            Outcome::Accepted => serde_json::json!({ "command": command, "accepted": true }),
            Outcome::Amount(amount) => {
                serde_json::json!({ "command": command, "amount": amount.raw().to_string() })
            }
        };
        report.to_string()
    } else {
        match outcome {
            Outcome::Accepted => format!("{command}: ok"),
            Outcome::Amount(amount) => amount.to_string(),
        }
    }
}
