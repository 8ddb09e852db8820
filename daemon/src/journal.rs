//! Native payouts recorded to an append-only JSON lines journal.
//!
//! A withdrawal never writes the journal directly. The ledger releases into
//! an [`OutboxBank`]; the daemon saves the debited ledger together with the
//! queued payouts, and only then appends them here.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use weth_ledger::{BankError, NativeBank};
use weth_types::{Address, WethAmount};

use crate::state::Payout;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("payout journal {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("payout journal entry could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct JournalLine {
    id: u64,
    to: String,
    amount: String,
}

/// The append-only record of native payouts.
pub struct PayoutJournal {
    path: PathBuf,
}

impl PayoutJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(&self, source: std::io::Error) -> JournalError {
        JournalError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn contents(&self) -> Result<String, JournalError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Ids of the payouts already in the journal.
    pub fn recorded_ids(&self) -> Result<HashSet<u64>, JournalError> {
        Ok(Self::parse_ids(&self.contents()?))
    }

    fn parse_ids(content: &str) -> HashSet<u64> {
        let mut ids = HashSet::new();
        for (n, line) in content.lines().enumerate() {
            match serde_json::from_str::<JournalLine>(line) {
                Ok(entry) => {
                    ids.insert(entry.id);
                }
                Err(e) => warn!(line = n + 1, error = %e, "skipping unreadable journal line"),
            }
        }
        ids
    }

    /// Append the payouts the journal does not hold yet. Returns how many
    /// lines were written.
    pub fn append(&self, payouts: &[Payout]) -> Result<usize, JournalError> {
        if payouts.is_empty() {
            return Ok(0);
        }
        let content = self.contents()?;
        let recorded = Self::parse_ids(&content);

        let mut buf = String::new();
        // Start on a fresh line after an interrupted write.
        if !content.is_empty() && !content.ends_with('\n') {
            buf.push('\n');
        }
        let mut written = 0;
        for payout in payouts.iter().filter(|p| !recorded.contains(&p.id)) {
            let line = JournalLine {
                id: payout.id,
                to: payout.to.to_string(),
                amount: payout.amount.raw().to_string(),
            };
            buf.push_str(&serde_json::to_string(&line)?);
            buf.push('\n');
            written += 1;
        }
        if written == 0 {
            return Ok(0);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.write_all(buf.as_bytes()).map_err(|e| self.io_err(e))?;
        file.sync_data().map_err(|e| self.io_err(e))?;
        info!(path = %self.path.display(), written, "native payouts journaled");
        Ok(written)
    }
}

/// A [`NativeBank`] that holds releases in memory until the debit that
/// funds them has been saved.
#[derive(Default)]
pub struct OutboxBank {
    released: Mutex<Vec<(Address, WethAmount)>>,
}

impl OutboxBank {
    /// Drain the releases made since the last call.
    pub fn take(&self) -> Vec<(Address, WethAmount)> {
        let mut released = self.released.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *released)
    }
}

impl NativeBank for OutboxBank {
    fn release(&self, to: &Address, amount: WethAmount) -> Result<(), BankError> {
        self.released
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((*to, amount));
        Ok(())
    }
}
