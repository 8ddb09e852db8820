//! Persisting the ledger between daemon invocations.
//!
//! The state file holds the ledger snapshot together with an outbox of
//! payouts whose debit is already saved but which may not have reached the
//! payout journal yet. A sibling `.lock` file is held exclusively for as
//! long as a [`FileStateStore`] is alive, so daemon processes sharing a
//! state file run one at a time.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use weth_ledger::{Ledger, LedgerError, LedgerSnapshot};
use weth_types::{Address, WethAmount};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("state file {} is unusable: {source}", path.display())]
    Invalid { path: PathBuf, source: LedgerError },

    #[error("state file {} could not be decoded: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
}

/// A native payout whose debit is part of the saved ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub id: u64,
    pub to: Address,
    pub amount: WethAmount,
}

/// Payouts waiting to be written to the journal.
///
/// Ids are never reused, so the journal can tell a retried delivery from
/// a new payout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbox {
    next_id: u64,
    pending: Vec<Payout>,
}

impl Outbox {
    pub fn queue(&mut self, to: Address, amount: WethAmount) {
        self.pending.push(Payout {
            id: self.next_id,
            to,
            amount,
        });
        self.next_id += 1;
    }

    pub fn pending(&self) -> &[Payout] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[derive(Serialize, Deserialize)]
struct StoredState {
    snapshot: LedgerSnapshot,
    outbox: Outbox,
}

/// Where the daemon keeps its ledger and outbox between runs.
pub trait StateStore {
    /// Load the saved state, or a fresh ledger and empty outbox if nothing was saved.
    fn load(&self) -> Result<(Ledger, Outbox), StateError>;

    /// Replace the saved state. Either the whole new state is visible
    /// afterwards or the previous one is left untouched.
    fn save(&self, snapshot: &LedgerSnapshot, outbox: &Outbox) -> Result<(), StateError>;
}

/// A [`StateStore`] backed by one file, guarded by an exclusive lock.
pub struct FileStateStore {
    path: PathBuf,
    _lock: File,
}

impl FileStateStore {
    /// Open the store at `path`, blocking until no other process holds it.
    pub fn open(path: &Path) -> Result<Self, StateError> {
        let io_err = |source: std::io::Error| StateError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = parent_dir(path) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path(path))
            .map_err(io_err)?;
        FileExt::lock_exclusive(&lock).map_err(io_err)?;
        debug!(path = %path.display(), "state lock acquired");

        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    fn io_err(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn format_err(&self, reason: impl ToString) -> StateError {
        StateError::Format {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<(Ledger, Outbox), StateError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no state file, starting with an empty ledger");
                return Ok((Ledger::new(), Outbox::default()));
            }
            Err(source) => return Err(self.io_err(source)),
        };

        let stored: StoredState =
            bincode::deserialize(&bytes).map_err(|e| self.format_err(e))?;
        let accounts = stored.snapshot.account_count();
        let ledger = Ledger::restore(stored.snapshot).map_err(|source| StateError::Invalid {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            path = %self.path.display(),
            accounts,
            pending_payouts = stored.outbox.pending.len(),
            "ledger restored"
        );
        Ok((ledger, stored.outbox))
    }

    fn save(&self, snapshot: &LedgerSnapshot, outbox: &Outbox) -> Result<(), StateError> {
        let stored = StoredState {
            snapshot: snapshot.clone(),
            outbox: outbox.clone(),
        };
        let bytes = bincode::serialize(&stored).map_err(|e| self.format_err(e))?;

        let dir = parent_dir(&self.path).unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(&bytes).map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "ledger saved");
        Ok(())
    }
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
