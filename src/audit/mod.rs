//! Cumulative match log.
//!
//! Every record appended for a camera is chained to its predecessor:
//! `entry_hash = SHA-256(prev_hash || record_json)`, starting from an all-zero
//! genesis hash. `MatchLog::verify` recomputes the chain so an exported log can be
//! checked for edits, drops or reordering.

use anyhow::{anyhow, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::region::BodyRegion;
use crate::Side;

pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Hashes a log entry payload with the previous chain hash.
pub fn hash_entry(prev_hash: &[u8; 32], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash);
    hasher.update(payload);
    hasher.finalize().into()
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// An arbitration decision.
    Decision,
    /// Zero-confidence non-scoring record for the side that conceded a valid strike.
    Counterpart,
}

/// One row of the cumulative log.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LogRecord {
    pub timestamp: String,
    pub valid: bool,
    pub confidence_pct: f32,
    pub side: Side,
    pub region: BodyRegion,
    pub kind: RecordKind,
}

#[derive(Clone, Debug, Serialize)]
pub struct LogEntry {
    pub record: LogRecord,
    #[serde(with = "hex_bytes")]
    pub prev_hash: [u8; 32],
    #[serde(with = "hex_bytes")]
    pub entry_hash: [u8; 32],
}

/// Append-only, hash-chained log for one camera.
#[derive(Clone, Debug)]
pub struct MatchLog {
    entries: Vec<LogEntry>,
    head: [u8; 32],
}

impl MatchLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            head: GENESIS_HASH,
        }
    }

    pub fn append(&mut self, record: LogRecord) -> Result<&LogEntry> {
        let payload = serde_json::to_vec(&record)
            .map_err(|e| anyhow!("failed to encode log record: {}", e))?;
        let entry_hash = hash_entry(&self.head, &payload);
        self.entries.push(LogEntry {
            record,
            prev_hash: self.head,
            entry_hash,
        });
        self.head = entry_hash;
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head_hex(&self) -> String {
        hex::encode(self.head)
    }

    /// Drop every entry and restart the chain from genesis.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.head = GENESIS_HASH;
    }

    /// Recompute the chain from genesis.
    pub fn verify(&self) -> Result<()> {
        verify_chain(&self.entries)
    }
}

impl Default for MatchLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Verify an exported sequence of entries.
pub fn verify_chain(entries: &[LogEntry]) -> Result<()> {
    let mut prev = GENESIS_HASH;
    for (idx, entry) in entries.iter().enumerate() {
        if entry.prev_hash != prev {
            return Err(anyhow!("match log entry {} does not follow its predecessor", idx));
        }
        let payload = serde_json::to_vec(&entry.record)
            .map_err(|e| anyhow!("failed to encode log record {}: {}", idx, e))?;
        if hash_entry(&prev, &payload) != entry.entry_hash {
            return Err(anyhow!("match log entry {} hash mismatch", idx));
        }
        prev = entry.entry_hash;
    }
    Ok(())
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }
}
