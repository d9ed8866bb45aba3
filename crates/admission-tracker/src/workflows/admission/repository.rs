use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::allocation::PassingScore;
use super::domain::{ApplicantId, CohortDate, ProgramCode, Submission, SubmissionSet};

/// Persisted passing score for one program on one cohort date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassingScoreRecord {
    pub program_code: ProgramCode,
    pub passing_score: PassingScore,
    pub seats_available: u32,
    pub enrolled_count: u32,
}

/// Row-level changes between the stored snapshot and a newly uploaded one,
/// keyed by `(applicant_id, program_code)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl SnapshotDiff {
    pub fn between(previous: Option<&SubmissionSet>, next: &SubmissionSet) -> Self {
        let keyed = |set: &SubmissionSet| -> BTreeMap<(ApplicantId, ProgramCode), Submission> {
            set.submissions()
                .iter()
                .map(|row| ((row.applicant_id, row.program_code.clone()), row.clone()))
                .collect()
        };

        let before = previous.map(keyed).unwrap_or_default();
        let after = keyed(next);
        let mut diff = SnapshotDiff::default();

        for (key, row) in &after {
            match before.get(key) {
                None => diff.added += 1,
                Some(existing) if existing == row => diff.unchanged += 1,
                Some(_) => diff.updated += 1,
            }
        }
        diff.removed = before.keys().filter(|key| !after.contains_key(*key)).count();

        diff
    }
}

/// Storage abstraction for cohort snapshots and their computed passing scores.
pub trait SnapshotRepository: Send + Sync {
    /// Replace the stored snapshot for the set's cohort, reporting what changed.
    fn replace_snapshot(&self, set: SubmissionSet) -> Result<SnapshotDiff, RepositoryError>;
    fn snapshot(&self, cohort: &CohortDate) -> Result<Option<SubmissionSet>, RepositoryError>;
    /// Known cohort dates in ascending order.
    fn cohorts(&self) -> Result<Vec<CohortDate>, RepositoryError>;
    fn store_passing_scores(
        &self,
        cohort: &CohortDate,
        records: Vec<PassingScoreRecord>,
    ) -> Result<(), RepositoryError>;
    fn passing_scores(
        &self,
        cohort: &CohortDate,
    ) -> Result<Vec<PassingScoreRecord>, RepositoryError>;
    /// Drop the cohort's snapshot and passing scores; `NotFound` when nothing is stored.
    fn remove_cohort(&self, cohort: &CohortDate) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("cohort not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
