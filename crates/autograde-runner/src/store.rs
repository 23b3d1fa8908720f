//! Grade store seam.
//!
//! The relational store of the surrounding system sits behind
//! [`GradeStore`]. [`MemoryGradeStore`] satisfies the same contract in
//! memory and is what tests and single-process runs use.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Result, RunnerError};
use crate::obs;
use crate::record::{Correction, CorrectionEntry, GradingKey, GradingRecord};

/// Persistence for grading records.
///
/// Guarantees:
/// - `upsert` on an existing [`GradingKey`] keeps the record's `id`,
///   `old_score`, `old_feedback` and `created_at`, replacing everything else.
/// - `apply_correction` appends exactly one [`CorrectionEntry`].
#[async_trait]
pub trait GradeStore: Send + Sync {
    /// Insert or update by key; returns the record as stored.
    async fn upsert(&self, record: GradingRecord) -> Result<GradingRecord>;

    /// Fetch by id. Returns `RunnerError::RecordNotFound` if absent.
    async fn get(&self, id: Uuid) -> Result<GradingRecord>;

    /// Fetch by natural key.
    async fn find(&self, key: &GradingKey) -> Result<Option<GradingRecord>>;

    /// Apply a human correction to a stored record.
    async fn apply_correction(&self, id: Uuid, correction: &Correction) -> Result<CorrectionEntry>;

    /// Correction history for a record, oldest first.
    async fn corrections(&self, id: Uuid) -> Result<Vec<CorrectionEntry>>;

    /// All records, ordered by key.
    async fn list(&self) -> Result<Vec<GradingRecord>>;
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<Uuid, GradingRecord>,
    by_key: HashMap<GradingKey, Uuid>,
    corrections: HashMap<Uuid, Vec<CorrectionEntry>>,
}

/// In-memory [`GradeStore`].
#[derive(Debug, Default)]
pub struct MemoryGradeStore {
    state: Mutex<StoreState>,
}

impl MemoryGradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| RunnerError::Storage("grade store lock poisoned".to_string()))
    }
}

#[async_trait]
impl GradeStore for MemoryGradeStore {
    async fn upsert(&self, mut record: GradingRecord) -> Result<GradingRecord> {
        let mut state = self.state()?;
        let existing = state
            .by_key
            .get(&record.key)
            .and_then(|id| state.records.get(id));
        if let Some(existing) = existing {
            record.id = existing.id;
            record.old_score = existing.old_score;
            record.old_feedback = existing.old_feedback.clone();
            record.created_at = existing.created_at;
        }
        state.by_key.insert(record.key.clone(), record.id);
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<GradingRecord> {
        self.state()?
            .records
            .get(&id)
            .cloned()
            .ok_or(RunnerError::RecordNotFound(id))
    }

    async fn find(&self, key: &GradingKey) -> Result<Option<GradingRecord>> {
        let state = self.state()?;
        Ok(state
            .by_key
            .get(key)
            .and_then(|id| state.records.get(id))
            .cloned())
    }

    async fn apply_correction(&self, id: Uuid, correction: &Correction) -> Result<CorrectionEntry> {
        let mut state = self.state()?;
        let record = state
            .records
            .get_mut(&id)
            .ok_or(RunnerError::RecordNotFound(id))?;
        let entry = record.apply_correction(correction)?;
        obs::emit_record_corrected(id, &entry.editor_id, entry.old_score, entry.new_score);
        state.corrections.entry(id).or_default().push(entry.clone());
        Ok(entry)
    }

    async fn corrections(&self, id: Uuid) -> Result<Vec<CorrectionEntry>> {
        let state = self.state()?;
        if !state.records.contains_key(&id) {
            return Err(RunnerError::RecordNotFound(id));
        }
        Ok(state.corrections.get(&id).cloned().unwrap_or_default())
    }

    async fn list(&self) -> Result<Vec<GradingRecord>> {
        let mut records: Vec<GradingRecord> = self.state()?.records.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}
