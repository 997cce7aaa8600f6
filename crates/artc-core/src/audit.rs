//! Append-only, hash-chained audit log
//!
//! Every compile attempt and lifecycle transition lands here. Each entry
//! hashes its own fields together with the previous entry's hash (SHA-256,
//! zero genesis), so editing or dropping a line breaks the chain from that
//! point on. The file form is one JSON entry per line (`audit.jsonl`).

use crate::error::AuditError;
use artc_artifact::{ArtifactId, ArtifactKind, ArtifactStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const GENESIS: [u8; 32] = [0u8; 32];

/// Result of a compile attempt as recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileOutcome {
    /// Payload accepted and stored as a draft
    Accepted,
    /// Output or context rejected
    Rejected,
}

/// Something worth recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// One compiler pass invocation
    Compile {
        /// Pass that ran
        pass: ArtifactKind,
        /// Accepted or rejected
        outcome: CompileOutcome,
        /// Stable error code for rejections
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<String>,
        /// Draft created from an accepted payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact_id: Option<ArtifactId>,
        /// Model response, when one was received
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
    },
    /// Status change, including creation (`from: None`)
    Transition {
        /// Artifact moved
        artifact_id: ArtifactId,
        /// Its type
        kind: ArtifactKind,
        /// Previous status
        from: Option<ArtifactStatus>,
        /// New status
        to: ArtifactStatus,
        /// Approver, or `model`/`human` for creation
        actor: String,
    },
    /// Draft payload replaced
    Modified {
        /// Artifact changed
        artifact_id: ArtifactId,
    },
    /// Draft removed
    Discarded {
        /// Artifact removed
        artifact_id: ArtifactId,
    },
}

/// One chained log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Position in the log, from 0
    pub seq: u64,
    /// Append time
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub event: AuditEvent,
    /// Hash of the previous entry (hex)
    pub prev_hash: String,
    /// Hash of this entry (hex)
    pub hash: String,
}

impl AuditEntry {
    fn compute_hash(&self) -> String {
        entry_hash(self.seq, &self.timestamp, &self.event, &self.prev_hash)
    }
}

fn entry_hash(seq: u64, timestamp: &DateTime<Utc>, event: &AuditEvent, prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update([0]);
    // Struct fields serialize in declaration order, so this is stable.
    hasher.update(serde_json::to_vec(event).unwrap_or_default());
    hasher.update([0]);
    hasher.update(prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Chain head; `entries` is only filled for logs without a file
#[derive(Debug)]
struct Tail {
    next_seq: u64,
    last_hash: String,
    entries: Vec<AuditEntry>,
}

/// Hash-chained event log
#[derive(Debug)]
pub struct AuditLog {
    tail: Mutex<Tail>,
    path: Option<PathBuf>,
    #[cfg(test)]
    fail_at: Option<u64>,
}

impl AuditLog {
    /// Log kept only in memory
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            tail: Mutex::new(Tail {
                next_seq: 0,
                last_hash: hex::encode(GENESIS),
                entries: Vec::new(),
            }),
            path: None,
            #[cfg(test)]
            fail_at: None,
        }
    }

    /// In-memory log whose append at `seq` fails with an IO error
    #[cfg(test)]
    pub(crate) fn failing_at(seq: u64) -> Self {
        Self {
            fail_at: Some(seq),
            ..Self::in_memory()
        }
    }

    /// Log appended to `path`, resuming after its last entry
    ///
    /// # Errors
    /// `Corrupt` for an undecodable line, `Io` for read failures
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        let (next_seq, last_hash) = read_entries(&path)?
            .last()
            .map_or((0, hex::encode(GENESIS)), |e| (e.seq + 1, e.hash.clone()));
        Ok(Self {
            tail: Mutex::new(Tail {
                next_seq,
                last_hash,
                entries: Vec::new(),
            }),
            path: Some(path),
            #[cfg(test)]
            fail_at: None,
        })
    }

    /// Append one event
    ///
    /// # Errors
    /// `Io` if the line cannot be written; the chain does not advance
    pub fn append(&self, event: AuditEvent) -> Result<AuditEntry, AuditError> {
        let mut tail = self.tail.lock();
        let timestamp = Utc::now();
        let hash = entry_hash(tail.next_seq, &timestamp, &event, &tail.last_hash);
        let entry = AuditEntry {
            seq: tail.next_seq,
            timestamp,
            event,
            prev_hash: tail.last_hash.clone(),
            hash,
        };

        #[cfg(test)]
        if self.fail_at == Some(entry.seq) {
            return Err(AuditError::Io {
                path: PathBuf::from("audit.jsonl"),
                source: io::Error::other("write refused"),
            });
        }

        match &self.path {
            Some(path) => append_line(path, &entry).map_err(|source| AuditError::Io {
                path: path.clone(),
                source,
            })?,
            None => tail.entries.push(entry.clone()),
        }
        tail.next_seq += 1;
        tail.last_hash.clone_from(&entry.hash);
        Ok(entry)
    }

    /// Every entry, oldest first
    ///
    /// File-backed logs are re-read so on-disk edits are visible.
    ///
    /// # Errors
    /// `Corrupt` or `Io` when re-reading the file
    pub fn entries(&self) -> Result<Vec<AuditEntry>, AuditError> {
        match &self.path {
            Some(path) => read_entries(path),
            None => Ok(self.tail.lock().entries.clone()),
        }
    }

    /// Check every link; returns the number of entries checked
    ///
    /// # Errors
    /// `ChainBroken` at the first entry whose sequence, previous hash or own
    /// hash does not match
    pub fn verify_chain(&self) -> Result<usize, AuditError> {
        let entries = self.entries()?;
        verify_entries(&entries)?;
        Ok(entries.len())
    }
}

/// Check a sequence of entries starting from genesis
///
/// # Errors
/// `ChainBroken` at the first bad link
pub fn verify_entries(entries: &[AuditEntry]) -> Result<(), AuditError> {
    let mut prev = hex::encode(GENESIS);
    for (expected_seq, entry) in (0u64..).zip(entries) {
        if entry.seq != expected_seq || entry.prev_hash != prev || entry.hash != entry.compute_hash() {
            tracing::warn!(seq = entry.seq, "audit chain broken");
            return Err(AuditError::ChainBroken { seq: entry.seq });
        }
        prev.clone_from(&entry.hash);
    }
    Ok(())
}

fn append_line(path: &Path, entry: &AuditEntry) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_vec(entry).map_err(io::Error::other)?;
    line.push(b'\n');
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    file.sync_data()
}

fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, AuditError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(AuditError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| AuditError::Corrupt {
                line: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}
