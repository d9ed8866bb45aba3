use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::config::AdmissionConfig;
use crate::workflows::admission::domain::{
    ApplicantId, CohortDate, ProgramCatalog, ProgramCode, ProgramDescriptor, ScoreCard,
    Submission, SubmissionSet,
};
use crate::workflows::admission::repository::{
    PassingScoreRecord, RepositoryError, SnapshotDiff, SnapshotRepository,
};
use crate::workflows::admission::service::AdmissionService;

pub(super) fn cohort(label: &str) -> CohortDate {
    CohortDate::parse(label).expect("valid cohort label")
}

pub(super) fn code(raw: &str) -> ProgramCode {
    ProgramCode::new(raw)
}

pub(super) fn catalog(seats: &[(&str, u32)]) -> ProgramCatalog {
    ProgramCatalog::new(
        seats
            .iter()
            .map(|(program, seats)| ProgramDescriptor {
                code: ProgramCode::new(program),
                name: format!("Program {}", program.to_ascii_uppercase()),
                short_name: program.to_ascii_uppercase(),
                seats: *seats,
            })
            .collect(),
    )
    .expect("valid catalog")
}

pub(super) fn submission(
    applicant: u64,
    program: &str,
    priority: u32,
    total: u32,
    has_consent: bool,
) -> Submission {
    Submission {
        applicant_id: ApplicantId(applicant),
        program_code: ProgramCode::new(program),
        priority,
        scores: ScoreCard {
            physics_ict: total / 3,
            russian: total / 3,
            math: total - 2 * (total / 3),
            extra: 0,
            total,
        },
        has_consent,
    }
}

pub(super) fn submission_set(
    label: &str,
    catalog: &ProgramCatalog,
    rows: Vec<Submission>,
) -> SubmissionSet {
    SubmissionSet::build(cohort(label), rows, catalog).expect("valid submission set")
}

pub(super) fn admission_config(catalog: ProgramCatalog) -> AdmissionConfig {
    AdmissionConfig {
        catalog,
        upload_budget: Duration::from_secs(5),
        allocation_budget: Duration::from_secs(3),
    }
}

/// Two-program cohort: applicant 1 wants A then B, applicant 2 only A.
pub(super) const TWO_PROGRAM_CSV: &str = "id,program,priority,physics,rus,math,extra,total,consent
1,A,1,30,30,30,0,90,1
1,B,2,30,30,20,0,80,1
2,A,1,30,30,25,0,85,1
";

pub(super) fn build_service() -> (AdmissionService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = AdmissionService::new(
        repository.clone(),
        admission_config(catalog(&[("a", 1), ("b", 1)])),
    );
    (service, repository)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    snapshots: Arc<Mutex<BTreeMap<CohortDate, SubmissionSet>>>,
    scores: Arc<Mutex<BTreeMap<CohortDate, Vec<PassingScoreRecord>>>>,
}

impl SnapshotRepository for MemoryRepository {
    fn replace_snapshot(&self, set: SubmissionSet) -> Result<SnapshotDiff, RepositoryError> {
        let mut guard = self.snapshots.lock().expect("snapshot mutex poisoned");
        let diff = SnapshotDiff::between(guard.get(set.cohort()), &set);
        guard.insert(set.cohort().clone(), set);
        Ok(diff)
    }

    fn snapshot(&self, cohort: &CohortDate) -> Result<Option<SubmissionSet>, RepositoryError> {
        let guard = self.snapshots.lock().expect("snapshot mutex poisoned");
        Ok(guard.get(cohort).cloned())
    }

    fn cohorts(&self) -> Result<Vec<CohortDate>, RepositoryError> {
        let guard = self.snapshots.lock().expect("snapshot mutex poisoned");
        Ok(guard.keys().cloned().collect())
    }

    fn store_passing_scores(
        &self,
        cohort: &CohortDate,
        records: Vec<PassingScoreRecord>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.scores.lock().expect("score mutex poisoned");
        guard.insert(cohort.clone(), records);
        Ok(())
    }

    fn passing_scores(
        &self,
        cohort: &CohortDate,
    ) -> Result<Vec<PassingScoreRecord>, RepositoryError> {
        let guard = self.scores.lock().expect("score mutex poisoned");
        Ok(guard.get(cohort).cloned().unwrap_or_default())
    }

    fn remove_cohort(&self, cohort: &CohortDate) -> Result<(), RepositoryError> {
        let removed = self
            .snapshots
            .lock()
            .expect("snapshot mutex poisoned")
            .remove(cohort);
        let scores = self
            .scores
            .lock()
            .expect("score mutex poisoned")
            .remove(cohort);
        if removed.is_none() && scores.is_none() {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Delegates to a [`MemoryRepository`] but refuses every passing-score write.
pub(super) struct ScoreWritesFail {
    pub(super) inner: MemoryRepository,
}

impl SnapshotRepository for ScoreWritesFail {
    fn replace_snapshot(&self, set: SubmissionSet) -> Result<SnapshotDiff, RepositoryError> {
        self.inner.replace_snapshot(set)
    }

    fn snapshot(&self, cohort: &CohortDate) -> Result<Option<SubmissionSet>, RepositoryError> {
        self.inner.snapshot(cohort)
    }

    fn cohorts(&self) -> Result<Vec<CohortDate>, RepositoryError> {
        self.inner.cohorts()
    }

    fn store_passing_scores(
        &self,
        _cohort: &CohortDate,
        _records: Vec<PassingScoreRecord>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("score table locked".to_string()))
    }

    fn passing_scores(
        &self,
        cohort: &CohortDate,
    ) -> Result<Vec<PassingScoreRecord>, RepositoryError> {
        self.inner.passing_scores(cohort)
    }

    fn remove_cohort(&self, cohort: &CohortDate) -> Result<(), RepositoryError> {
        self.inner.remove_cohort(cohort)
    }
}

pub(super) struct UnavailableRepository;

impl SnapshotRepository for UnavailableRepository {
    fn replace_snapshot(&self, _set: SubmissionSet) -> Result<SnapshotDiff, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }

    fn snapshot(&self, _cohort: &CohortDate) -> Result<Option<SubmissionSet>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }

    fn cohorts(&self) -> Result<Vec<CohortDate>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }

    fn store_passing_scores(
        &self,
        _cohort: &CohortDate,
        _records: Vec<PassingScoreRecord>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }

    fn passing_scores(
        &self,
        _cohort: &CohortDate,
    ) -> Result<Vec<PassingScoreRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }

    fn remove_cohort(&self, _cohort: &CohortDate) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
