//! Approval ledger
//!
//! Who moved an artifact past a human gate, and when. Kept as a side table
//! so envelopes stay free of reviewer data.

use crate::error::{StoreError, StoreResult};
use artc_artifact::ArtifactId;
use artc_lock::write_json_atomic;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Gate an approval record was written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalTransition {
    /// DRAFT to APPROVED
    Approve,
    /// APPROVED to LOCKED
    Lock,
}

impl fmt::Display for ApprovalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Lock => "lock",
        })
    }
}

/// One human sign-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    /// Artifact signed off
    pub artifact_id: ArtifactId,
    /// Approver name
    pub approver: String,
    /// Sign-off time
    pub approved_at: DateTime<Utc>,
    /// Gate passed
    pub transition: ApprovalTransition,
}

impl ApprovalRecord {
    /// Record stamped now
    #[must_use]
    pub fn now(artifact_id: ArtifactId, approver: impl Into<String>, transition: ApprovalTransition) -> Self {
        Self {
            artifact_id,
            approver: approver.into(),
            approved_at: Utc::now(),
            transition,
        }
    }
}

/// Approval records keyed by artifact id
#[derive(Debug)]
pub struct ApprovalLedger {
    records: RwLock<BTreeMap<ArtifactId, Vec<ApprovalRecord>>>,
    path: Option<PathBuf>,
}

impl ApprovalLedger {
    /// Ledger that is never written to disk
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Ledger persisted at `path`, loading it if present
    ///
    /// # Errors
    /// `Corrupt` or `Io` if an existing file cannot be read
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        Ok(Self {
            records: RwLock::new(records),
            path: Some(path),
        })
    }

    /// Append a record
    ///
    /// # Errors
    /// `Io` if the ledger cannot be written; nothing is recorded
    pub fn record(&self, record: ApprovalRecord) -> StoreResult<()> {
        let mut records = self.records.write();
        let id = record.artifact_id;
        records.entry(id).or_default().push(record);
        if let Err(e) = self.persist(&records) {
            pop_last(&mut records, id);
            return Err(e);
        }
        Ok(())
    }

    /// Drop the latest record for `id`, undoing a [`record`](Self::record)
    ///
    /// # Errors
    /// `Io` if the ledger cannot be written
    pub fn retract(&self, id: ArtifactId) -> StoreResult<Option<ApprovalRecord>> {
        let mut records = self.records.write();
        let removed = pop_last(&mut records, id);
        self.persist(&records)?;
        Ok(removed)
    }

    /// Records for one artifact, oldest first
    #[must_use]
    pub fn records_for(&self, id: ArtifactId) -> Vec<ApprovalRecord> {
        self.records.read().get(&id).cloned().unwrap_or_default()
    }

    fn persist(&self, records: &BTreeMap<ArtifactId, Vec<ApprovalRecord>>) -> StoreResult<()> {
        match &self.path {
            Some(path) => write_json_atomic(path, records).map_err(|e| StoreError::io(path, e)),
            None => Ok(()),
        }
    }
}

fn pop_last(records: &mut BTreeMap<ArtifactId, Vec<ApprovalRecord>>, id: ArtifactId) -> Option<ApprovalRecord> {
    let list = records.get_mut(&id)?;
    let removed = list.pop();
    if list.is_empty() {
        records.remove(&id);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_in_order() {
        let ledger = ApprovalLedger::in_memory();
        let id = ArtifactId::new();
        ledger.record(ApprovalRecord::now(id, "ana", ApprovalTransition::Approve)).unwrap();
        ledger.record(ApprovalRecord::now(id, "bo", ApprovalTransition::Lock)).unwrap();

        let records = ledger.records_for(id);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].transition, ApprovalTransition::Lock);
        assert!(ledger.records_for(ArtifactId::new()).is_empty());
    }

    #[test]
    fn retract_undoes_the_latest() {
        let ledger = ApprovalLedger::in_memory();
        let id = ArtifactId::new();
        ledger.record(ApprovalRecord::now(id, "ana", ApprovalTransition::Approve)).unwrap();
        let removed = ledger.retract(id).unwrap().unwrap();
        assert_eq!(removed.approver, "ana");
        assert!(ledger.records_for(id).is_empty());
        assert!(ledger.retract(id).unwrap().is_none());
    }

    #[test]
    fn persisted_ledger_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("approvals.json");
        let id = ArtifactId::new();
        ApprovalLedger::open(&path)
            .unwrap()
            .record(ApprovalRecord::now(id, "ana", ApprovalTransition::Approve))
            .unwrap();

        let reloaded = ApprovalLedger::open(&path).unwrap();
        assert_eq!(reloaded.records_for(id)[0].approver, "ana");
    }
}
