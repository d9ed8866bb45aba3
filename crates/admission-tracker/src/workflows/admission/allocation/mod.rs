//! Seat allocation for one cohort snapshot.
//!
//! Applicants are processed once each in rank order and take the first program on their
//! preference list that still has a free seat. Nobody is displaced after being placed.

mod preferences;
mod threshold;

pub use threshold::{passing_score, PassingScore};

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use super::domain::{
    ApplicantId, CohortDate, ProgramCatalog, ProgramCode, Submission, SubmissionSet,
};
use preferences::ranked_preference_lists;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("program '{code}' has no entry in the capacity table")]
    UnknownProgram { code: ProgramCode },
}

/// Assign consenting applicants to programs; each program's rows are in commit order.
pub fn allocate(
    set: &SubmissionSet,
    catalog: &ProgramCatalog,
) -> Result<BTreeMap<ProgramCode, Vec<Submission>>, AllocationError> {
    if let Some(unknown) = set
        .submissions()
        .iter()
        .find(|submission| !catalog.contains(&submission.program_code))
    {
        return Err(AllocationError::UnknownProgram {
            code: unknown.program_code.clone(),
        });
    }

    let mut enrolled: BTreeMap<ProgramCode, Vec<Submission>> = catalog
        .iter()
        .map(|program| (program.code.clone(), Vec::new()))
        .collect();

    for list in ranked_preference_lists(set) {
        for choice in &list.choices {
            let seats = catalog.seats(&choice.program_code).unwrap_or_default() as usize;
            let Some(program) = enrolled.get_mut(&choice.program_code) else {
                continue;
            };
            if program.len() < seats {
                program.push((*choice).clone());
                break;
            }
        }
    }

    Ok(enrolled)
}

/// Outcome for one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramAllocation {
    pub seats: u32,
    pub enrolled: Vec<Submission>,
    pub passing_score: PassingScore,
}

/// Where a single applicant ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement<'a> {
    pub program_code: &'a ProgramCode,
    pub submission: &'a Submission,
}

/// Shared result of one allocation run; every per-program view reads from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationResult {
    pub cohort: CohortDate,
    pub programs: BTreeMap<ProgramCode, ProgramAllocation>,
    /// Consenting applicants left without a seat, ascending by id.
    pub unassigned: Vec<ApplicantId>,
}

impl AllocationResult {
    pub fn enrolled(&self, code: &ProgramCode) -> &[Submission] {
        self.programs
            .get(code)
            .map(|program| program.enrolled.as_slice())
            .unwrap_or_default()
    }

    /// Enrolled rows by score descending, applicant id ascending on ties.
    pub fn ranked(&self, code: &ProgramCode) -> Vec<&Submission> {
        let mut rows: Vec<&Submission> = self.enrolled(code).iter().collect();
        rows.sort_by(|a, b| {
            b.total_score()
                .cmp(&a.total_score())
                .then_with(|| a.applicant_id.cmp(&b.applicant_id))
        });
        rows
    }

    pub fn passing_score(&self, code: &ProgramCode) -> Option<PassingScore> {
        self.programs.get(code).map(|program| program.passing_score)
    }

    pub fn passing_scores(&self) -> BTreeMap<ProgramCode, PassingScore> {
        self.programs
            .iter()
            .map(|(code, program)| (code.clone(), program.passing_score))
            .collect()
    }

    pub fn placement_of(&self, applicant_id: ApplicantId) -> Option<Placement<'_>> {
        self.programs.iter().find_map(|(code, program)| {
            program
                .enrolled
                .iter()
                .find(|submission| submission.applicant_id == applicant_id)
                .map(|submission| Placement {
                    program_code: code,
                    submission,
                })
        })
    }

    pub fn assigned_count(&self) -> usize {
        self.programs
            .values()
            .map(|program| program.enrolled.len())
            .sum()
    }
}

/// Stateless engine applying a capacity table to cohort snapshots.
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    catalog: ProgramCatalog,
}

impl AllocationEngine {
    pub fn new(catalog: ProgramCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ProgramCatalog {
        &self.catalog
    }

    pub fn run(&self, set: &SubmissionSet) -> Result<AllocationResult, AllocationError> {
        let started = Instant::now();
        let enrolled = allocate(set, &self.catalog)?;

        let programs: BTreeMap<ProgramCode, ProgramAllocation> = enrolled
            .into_iter()
            .map(|(code, enrolled)| {
                let seats = self.catalog.seats(&code).unwrap_or_default();
                let passing_score = passing_score(&enrolled, seats);
                (
                    code,
                    ProgramAllocation {
                        seats,
                        enrolled,
                        passing_score,
                    },
                )
            })
            .collect();

        let assigned: BTreeSet<ApplicantId> = programs
            .values()
            .flat_map(|program| program.enrolled.iter())
            .map(|submission| submission.applicant_id)
            .collect();
        let unassigned: Vec<ApplicantId> = set
            .with_consent()
            .map(|submission| submission.applicant_id)
            .filter(|applicant_id| !assigned.contains(applicant_id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let result = AllocationResult {
            cohort: set.cohort().clone(),
            programs,
            unassigned,
        };

        debug!(
            cohort = %result.cohort,
            submissions = set.len(),
            assigned = result.assigned_count(),
            unassigned = result.unassigned.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "allocation computed"
        );

        Ok(result)
    }
}
