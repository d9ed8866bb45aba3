pub mod views;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::allocation::AllocationResult;
use super::domain::{CohortDate, ProgramCatalog, SubmissionSet};
use super::repository::PassingScoreRecord;
use views::{
    DynamicsPoint, EnrolledEntry, EnrolledList, PassingScoreEntry, ProgramStatistics,
    ScoreDynamicsSeries,
};

/// Passing scores stored for one earlier (or the current) cohort date.
#[derive(Debug, Clone)]
pub struct CohortHistory {
    pub cohort: CohortDate,
    pub records: Vec<PassingScoreRecord>,
}

/// Structured admissions report for one cohort date.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionReport {
    pub cohort: CohortDate,
    pub generated_at: DateTime<Utc>,
    pub passing_scores: Vec<PassingScoreEntry>,
    pub dynamics: Vec<ScoreDynamicsSeries>,
    pub enrolled_lists: Vec<EnrolledList>,
    pub statistics: Vec<ProgramStatistics>,
}

impl AdmissionReport {
    pub fn assemble(
        catalog: &ProgramCatalog,
        set: &SubmissionSet,
        allocation: &AllocationResult,
        history: &[CohortHistory],
        generated_at: DateTime<Utc>,
    ) -> Self {
        let passing_scores = catalog
            .iter()
            .filter_map(|program| {
                allocation
                    .passing_score(&program.code)
                    .map(|passing_score| PassingScoreEntry {
                        program_code: program.code.clone(),
                        program_name: program.name.clone(),
                        seats: program.seats,
                        passing_score,
                        display: passing_score.label(),
                    })
            })
            .collect();

        let dynamics = catalog
            .iter()
            .map(|program| ScoreDynamicsSeries {
                program_code: program.code.clone(),
                program_name: program.name.clone(),
                points: history
                    .iter()
                    .map(|entry| DynamicsPoint {
                        cohort: entry.cohort.clone(),
                        score: entry
                            .records
                            .iter()
                            .find(|record| record.program_code == program.code)
                            .and_then(|record| record.passing_score.score()),
                    })
                    .collect(),
            })
            .collect();

        let enrolled_lists = catalog
            .iter()
            .map(|program| EnrolledList {
                program_code: program.code.clone(),
                program_name: program.name.clone(),
                seats: program.seats,
                entries: allocation
                    .ranked(&program.code)
                    .into_iter()
                    .enumerate()
                    .map(|(idx, submission)| EnrolledEntry {
                        rank: idx + 1,
                        applicant_id: submission.applicant_id,
                        total_score: submission.total_score(),
                        priority: submission.priority,
                    })
                    .collect(),
            })
            .collect();

        let statistics = catalog
            .iter()
            .map(|program| {
                let submissions = set.for_program(&program.code).count();
                let with_consent = set
                    .for_program(&program.code)
                    .filter(|submission| submission.has_consent)
                    .count();
                ProgramStatistics {
                    program_code: program.code.clone(),
                    program_name: program.name.clone(),
                    submissions,
                    with_consent,
                    enrolled: allocation.enrolled(&program.code).len(),
                    competition: competition_ratio(submissions, program.seats),
                }
            })
            .collect();

        Self {
            cohort: allocation.cohort.clone(),
            generated_at,
            passing_scores,
            dynamics,
            enrolled_lists,
            statistics,
        }
    }
}

fn competition_ratio(submissions: usize, seats: u32) -> f64 {
    if seats == 0 {
        return 0.0;
    }
    let ratio = submissions as f64 / f64::from(seats);
    (ratio * 100.0).round() / 100.0
}
