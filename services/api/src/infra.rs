use admission_tracker::workflows::admission::{
    CohortDate, PassingScoreRecord, RepositoryError, SnapshotDiff, SnapshotRepository,
    SubmissionSet,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local snapshot store; data lives as long as the server does.
#[derive(Default, Clone)]
pub(crate) struct InMemorySnapshotRepository {
    snapshots: Arc<Mutex<BTreeMap<CohortDate, SubmissionSet>>>,
    passing_scores: Arc<Mutex<BTreeMap<CohortDate, Vec<PassingScoreRecord>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("snapshot store lock poisoned".to_string()))
}

impl SnapshotRepository for InMemorySnapshotRepository {
    fn replace_snapshot(&self, set: SubmissionSet) -> Result<SnapshotDiff, RepositoryError> {
        let mut guard = lock(&self.snapshots)?;
        let diff = SnapshotDiff::between(guard.get(set.cohort()), &set);
        guard.insert(set.cohort().clone(), set);
        Ok(diff)
    }

    fn snapshot(&self, cohort: &CohortDate) -> Result<Option<SubmissionSet>, RepositoryError> {
        Ok(lock(&self.snapshots)?.get(cohort).cloned())
    }

    fn cohorts(&self) -> Result<Vec<CohortDate>, RepositoryError> {
        Ok(lock(&self.snapshots)?.keys().cloned().collect())
    }

    fn store_passing_scores(
        &self,
        cohort: &CohortDate,
        records: Vec<PassingScoreRecord>,
    ) -> Result<(), RepositoryError> {
        lock(&self.passing_scores)?.insert(cohort.clone(), records);
        Ok(())
    }

    fn passing_scores(
        &self,
        cohort: &CohortDate,
    ) -> Result<Vec<PassingScoreRecord>, RepositoryError> {
        Ok(lock(&self.passing_scores)?
            .get(cohort)
            .cloned()
            .unwrap_or_default())
    }

    fn remove_cohort(&self, cohort: &CohortDate) -> Result<(), RepositoryError> {
        let snapshot = lock(&self.snapshots)?.remove(cohort);
        let scores = lock(&self.passing_scores)?.remove(cohort);
        if snapshot.is_none() && scores.is_none() {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// A snapshot file paired with the cohort date it belongs to.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotSource {
    pub(crate) cohort: CohortDate,
    pub(crate) path: PathBuf,
}

pub(crate) fn parse_cohort(raw: &str) -> Result<CohortDate, String> {
    CohortDate::parse(raw).map_err(|err| format!("invalid cohort '{raw}' ({err})"))
}

/// Parse `COHORT=PATH`.
pub(crate) fn parse_snapshot_source(raw: &str) -> Result<SnapshotSource, String> {
    let (cohort, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COHORT=PATH, got '{raw}'"))?;
    if path.trim().is_empty() {
        return Err(format!("missing snapshot path in '{raw}'"));
    }
    Ok(SnapshotSource {
        cohort: parse_cohort(cohort)?,
        path: PathBuf::from(path.trim()),
    })
}
