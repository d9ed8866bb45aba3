use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AdmissionConfig;

use super::allocation::{AllocationEngine, AllocationError, AllocationResult, PassingScore};
use super::domain::{
    ApplicantId, CohortDate, ProgramCatalog, ProgramCode, ProgramDescriptor, ScoreCard, Submission,
    SubmissionSet,
};
use super::intake::{parse_submissions, IntakeError};
use super::report::{AdmissionReport, CohortHistory};
use super::repository::{PassingScoreRecord, RepositoryError, SnapshotDiff, SnapshotRepository};

/// Facade composing intake, snapshot storage, and the allocation engine.
pub struct AdmissionService<R> {
    repository: Arc<R>,
    engine: Arc<AllocationEngine>,
    upload_budget: Duration,
    allocation_budget: Duration,
}

impl<R> AdmissionService<R>
where
    R: SnapshotRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: AdmissionConfig) -> Self {
        Self {
            repository,
            engine: Arc::new(AllocationEngine::new(config.catalog)),
            upload_budget: config.upload_budget,
            allocation_budget: config.allocation_budget,
        }
    }

    pub fn catalog(&self) -> &ProgramCatalog {
        self.engine.catalog()
    }

    /// Ingest a CSV snapshot, replace the stored rows for the cohort, and persist the
    /// passing scores computed from it.
    pub fn upload<Rd: Read>(
        &self,
        cohort: CohortDate,
        reader: Rd,
    ) -> Result<UploadSummary, AdmissionServiceError> {
        let started = Instant::now();

        let set = parse_submissions(reader, cohort.clone(), self.catalog())?;
        let allocation = self.engine.run(&set)?;
        let rows = set.len();
        let previous = self.repository.snapshot(&cohort)?;
        let diff = self.repository.replace_snapshot(set)?;
        if let Err(err) = self
            .repository
            .store_passing_scores(&cohort, passing_score_records(&allocation))
        {
            self.restore_snapshot(&cohort, previous);
            return Err(err.into());
        }

        let elapsed = started.elapsed();
        info!(
            cohort = %cohort,
            rows,
            added = diff.added,
            updated = diff.updated,
            removed = diff.removed,
            elapsed_ms = elapsed.as_millis() as u64,
            "snapshot uploaded"
        );
        if elapsed > self.upload_budget {
            warn!(
                cohort = %cohort,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.upload_budget.as_millis() as u64,
                "snapshot upload exceeded its time budget"
            );
        }

        Ok(UploadSummary {
            cohort,
            rows,
            diff,
            passing_scores: allocation.passing_scores(),
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    /// Recompute the allocation for a stored cohort.
    pub fn allocation(
        &self,
        cohort: &CohortDate,
    ) -> Result<AllocationResult, AdmissionServiceError> {
        let set = self.snapshot(cohort)?;
        self.timed_allocation(&set)
    }

    /// Recompute and persist passing scores for a stored cohort.
    pub fn recalculate(
        &self,
        cohort: &CohortDate,
    ) -> Result<BTreeMap<ProgramCode, PassingScore>, AdmissionServiceError> {
        let allocation = self.allocation(cohort)?;
        self.repository
            .store_passing_scores(cohort, passing_score_records(&allocation))?;
        Ok(allocation.passing_scores())
    }

    /// Forget a cohort: its snapshot and its stored passing scores.
    pub fn remove_cohort(&self, cohort: &CohortDate) -> Result<(), AdmissionServiceError> {
        match self.repository.remove_cohort(cohort) {
            Ok(()) => {
                info!(cohort = %cohort, "cohort removed");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(AdmissionServiceError::NoSnapshot {
                cohort: cohort.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    pub fn passing_scores(
        &self,
        cohort: &CohortDate,
    ) -> Result<Vec<PassingScoreRecord>, AdmissionServiceError> {
        self.ensure_known(cohort)?;
        Ok(self.repository.passing_scores(cohort)?)
    }

    pub fn cohorts(&self) -> Result<Vec<CohortDate>, AdmissionServiceError> {
        Ok(self.repository.cohorts()?)
    }

    pub fn latest_cohort(&self) -> Result<Option<CohortDate>, AdmissionServiceError> {
        Ok(self.repository.cohorts()?.pop())
    }

    /// Every submission of the cohort, sorted and optionally filtered to one program.
    pub fn applicants(
        &self,
        cohort: &CohortDate,
        query: &ApplicantQuery,
    ) -> Result<Vec<ApplicantRow>, AdmissionServiceError> {
        let set = self.snapshot(cohort)?;
        if let Some(code) = &query.program {
            self.program(code)?;
        }

        let mut rows: Vec<&Submission> = set
            .submissions()
            .iter()
            .filter(|submission| {
                query
                    .program
                    .as_ref()
                    .map_or(true, |code| &submission.program_code == code)
            })
            .collect();
        sort_rows(&mut rows, query.sort_by, query.order);

        Ok(rows
            .into_iter()
            .map(|submission| self.applicant_row(submission, false))
            .collect())
    }

    /// One program's seats, cutoff, and applicant list with enrollment flags.
    pub fn program_view(
        &self,
        cohort: &CohortDate,
        code: &ProgramCode,
        query: &ApplicantQuery,
    ) -> Result<ProgramView, AdmissionServiceError> {
        let (name, seats) = {
            let program = self.program(code)?;
            (program.name.clone(), program.seats)
        };
        let set = self.snapshot(cohort)?;
        let allocation = self.timed_allocation(&set)?;
        let enrolled: BTreeSet<ApplicantId> = allocation
            .enrolled(code)
            .iter()
            .map(|submission| submission.applicant_id)
            .collect();

        let mut rows: Vec<&Submission> = set.for_program(code).collect();
        sort_rows(&mut rows, query.sort_by, query.order);

        Ok(ProgramView {
            cohort: cohort.clone(),
            program_code: code.clone(),
            name,
            seats,
            passing_score: allocation
                .passing_score(code)
                .unwrap_or(PassingScore::Undersubscribed),
            enrolled_count: enrolled.len(),
            applicants: rows
                .into_iter()
                .map(|submission| {
                    self.applicant_row(submission, enrolled.contains(&submission.applicant_id))
                })
                .collect(),
        })
    }

    pub fn statistics(
        &self,
        cohort: &CohortDate,
    ) -> Result<CohortStatistics, AdmissionServiceError> {
        let set = self.snapshot(cohort)?;
        let applicants = set
            .submissions()
            .iter()
            .map(|submission| submission.applicant_id)
            .collect::<BTreeSet<_>>()
            .len();

        Ok(CohortStatistics {
            cohort: cohort.clone(),
            total_submissions: set.len(),
            with_consent: set.with_consent().count(),
            distinct_applicants: applicants,
        })
    }

    /// Assemble the cohort report, including cutoff dynamics across every stored date.
    pub fn report(
        &self,
        cohort: &CohortDate,
        generated_at: DateTime<Utc>,
    ) -> Result<AdmissionReport, AdmissionServiceError> {
        let set = self.snapshot(cohort)?;
        let allocation = self.timed_allocation(&set)?;

        let mut history = Vec::new();
        for stored in self.repository.cohorts()? {
            let records = if &stored == cohort {
                passing_score_records(&allocation)
            } else {
                self.repository.passing_scores(&stored)?
            };
            history.push(CohortHistory {
                cohort: stored,
                records,
            });
        }

        Ok(AdmissionReport::assemble(
            self.catalog(),
            &set,
            &allocation,
            &history,
            generated_at,
        ))
    }

    fn timed_allocation(
        &self,
        set: &SubmissionSet,
    ) -> Result<AllocationResult, AdmissionServiceError> {
        let started = Instant::now();
        let allocation = self.engine.run(set)?;
        let elapsed = started.elapsed();
        if elapsed > self.allocation_budget {
            warn!(
                cohort = %set.cohort(),
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.allocation_budget.as_millis() as u64,
                "allocation exceeded its time budget"
            );
        }
        Ok(allocation)
    }

    /// Put back whatever the cohort held before a failed upload.
    fn restore_snapshot(&self, cohort: &CohortDate, previous: Option<SubmissionSet>) {
        let restored = match previous {
            Some(set) => self.repository.replace_snapshot(set).map(|_| ()),
            None => self.repository.remove_cohort(cohort),
        };
        if let Err(err) = restored {
            warn!(cohort = %cohort, error = %err, "failed to roll back snapshot upload");
        }
    }

    fn snapshot(&self, cohort: &CohortDate) -> Result<SubmissionSet, AdmissionServiceError> {
        self.repository
            .snapshot(cohort)?
            .ok_or_else(|| AdmissionServiceError::NoSnapshot {
                cohort: cohort.clone(),
            })
    }

    fn ensure_known(&self, cohort: &CohortDate) -> Result<(), AdmissionServiceError> {
        if self.repository.cohorts()?.contains(cohort) {
            Ok(())
        } else {
            Err(AdmissionServiceError::NoSnapshot {
                cohort: cohort.clone(),
            })
        }
    }

    fn program(&self, code: &ProgramCode) -> Result<&ProgramDescriptor, AdmissionServiceError> {
        self.catalog()
            .get(code)
            .ok_or_else(|| AdmissionServiceError::UnknownProgram { code: code.clone() })
    }

    fn applicant_row(&self, submission: &Submission, enrolled: bool) -> ApplicantRow {
        ApplicantRow {
            applicant_id: submission.applicant_id,
            program_code: submission.program_code.clone(),
            program_name: self
                .catalog()
                .get(&submission.program_code)
                .map(|program| program.name.clone())
                .unwrap_or_default(),
            priority: submission.priority,
            scores: submission.scores,
            has_consent: submission.has_consent,
            enrolled,
        }
    }
}

pub(crate) fn passing_score_records(allocation: &AllocationResult) -> Vec<PassingScoreRecord> {
    allocation
        .programs
        .iter()
        .map(|(code, program)| PassingScoreRecord {
            program_code: code.clone(),
            passing_score: program.passing_score,
            seats_available: program.seats,
            enrolled_count: program.enrolled.len() as u32,
        })
        .collect()
}

fn sort_rows(rows: &mut [&Submission], key: SortKey, order: SortOrder) {
    rows.sort_by(|a, b| {
        let primary = match key {
            SortKey::TotalScore => a.total_score().cmp(&b.total_score()),
            SortKey::ApplicantId => a.applicant_id.cmp(&b.applicant_id),
            SortKey::Priority => a.priority.cmp(&b.priority),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary
            .then_with(|| a.applicant_id.cmp(&b.applicant_id))
            .then_with(|| a.program_code.cmp(&b.program_code))
    });
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    TotalScore,
    #[serde(alias = "id")]
    ApplicantId,
    Priority,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Listing options for applicant tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicantQuery {
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default, deserialize_with = "program_filter")]
    pub program: Option<ProgramCode>,
}

/// `all` and the empty string mean no program filter.
fn program_filter<'de, D>(deserializer: D) -> Result<Option<ProgramCode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(ProgramCode::new)
        .filter(|code| !code.as_str().is_empty() && code.as_str() != "all"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicantRow {
    pub applicant_id: ApplicantId,
    pub program_code: ProgramCode,
    pub program_name: String,
    pub priority: u32,
    pub scores: ScoreCard,
    pub has_consent: bool,
    pub enrolled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramView {
    pub cohort: CohortDate,
    pub program_code: ProgramCode,
    pub name: String,
    pub seats: u32,
    pub passing_score: PassingScore,
    pub enrolled_count: usize,
    pub applicants: Vec<ApplicantRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortStatistics {
    pub cohort: CohortDate,
    pub total_submissions: usize,
    pub with_consent: usize,
    pub distinct_applicants: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub cohort: CohortDate,
    pub rows: usize,
    pub diff: SnapshotDiff,
    pub passing_scores: BTreeMap<ProgramCode, PassingScore>,
    pub elapsed_ms: u64,
}

/// Error raised by the admission service.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionServiceError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("unknown program '{code}'")]
    UnknownProgram { code: ProgramCode },
    #[error("no snapshot uploaded for cohort {cohort}")]
    NoSnapshot { cohort: CohortDate },
}
