//! Ledger snapshots: capture balances, allowances and supply at a point in time.
//!
//! Snapshots let an operator persist the ledger and restore it later. The
//! snapshot hash is computed deterministically from the ordered entries so a
//! tampered or truncated file is detected before the ledger is rebuilt.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use weth_types::{Address, WethAmount};

use crate::error::LedgerError;
use crate::ledger::Ledger;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// An ordered, self-verifying copy of the ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Blake2b-256 over version, supply and every entry in key order.
    pub hash: [u8; 32],
    pub version: u32,
    pub total_supply: WethAmount,
    pub balances: BTreeMap<Address, WethAmount>,
    /// Keyed by `(owner, spender)`.
    pub allowances: BTreeMap<(Address, Address), WethAmount>,
}

impl LedgerSnapshot {
    pub fn create(
        total_supply: WethAmount,
        balances: BTreeMap<Address, WethAmount>,
        allowances: BTreeMap<(Address, Address), WethAmount>,
    ) -> Self {
        let mut snap = Self {
            hash: [0u8; 32],
            version: SNAPSHOT_VERSION,
            total_supply,
            balances,
            allowances,
        };
        snap.hash = snap.compute_hash();
        snap
    }

    fn compute_hash(&self) -> [u8; 32] {
        use blake2::digest::consts::U32;
        use blake2::{Blake2b, Digest};

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update(self.total_supply.raw().to_le_bytes());
        for (account, balance) in &self.balances {
            hasher.update(b"bal");
            hasher.update(account.as_bytes());
            hasher.update(balance.raw().to_le_bytes());
        }
        for ((owner, spender), amount) in &self.allowances {
            hasher.update(b"alw");
            hasher.update(owner.as_bytes());
            hasher.update(spender.as_bytes());
            hasher.update(amount.raw().to_le_bytes());
        }

        let result = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        out
    }

    /// Verify the snapshot hash matches the entries.
    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Serialize the snapshot to bytes (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        bincode::serialize(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Deserialize a snapshot from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        bincode::deserialize(bytes).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    pub fn account_count(&self) -> usize {
        self.balances.len()
    }
}

impl Ledger {
    /// Capture the current state. Event listeners are not part of a snapshot.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::create(
            self.total_supply,
            self.balances.iter().map(|(k, v)| (*k, *v)).collect(),
            self.allowances.iter().map(|(k, v)| (*k, *v)).collect(),
        )
    }

    /// Rebuild a ledger from a snapshot.
    ///
    /// Rejects snapshots of another format version, snapshots whose hash
    /// does not match, and snapshots whose supply differs from the sum of
    /// balances.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::UnsupportedSnapshotVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        if !snapshot.verify() {
            return Err(LedgerError::SnapshotTampered);
        }
        let mut ledger = Self::new();
        ledger.balances = snapshot.balances.into_iter().collect();
        ledger.allowances = snapshot.allowances.into_iter().collect();
        ledger.total_supply = snapshot.total_supply;
        ledger.check_conservation()?;
        Ok(ledger)
    }
}
