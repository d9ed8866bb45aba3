//! Snapshot intake: coerce CSV rows into a validated [`SubmissionSet`].

mod parser;

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::domain::{
    ApplicantId, CohortDate, ProgramCatalog, ProgramCode, ScoreCard, Submission, SubmissionSet,
};
use parser::{parse_applicant_id, parse_consent, parse_number, parse_rows, NumberedRow};

/// Rejection raised before a snapshot ever reaches the allocator.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: field '{field}' has invalid value '{value}'")]
    Malformed {
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("applicant {applicant_id} lists program '{program_code}' with priority 0")]
    NonPositivePriority {
        applicant_id: ApplicantId,
        program_code: ProgramCode,
    },
    #[error("applicant {applicant_id} applies to unknown program '{code}'")]
    UnknownProgram {
        applicant_id: ApplicantId,
        code: ProgramCode,
    },
    #[error("applicant {applicant_id} applies to program '{program_code}' more than once")]
    DuplicateSubmission {
        applicant_id: ApplicantId,
        program_code: ProgramCode,
    },
}

impl SubmissionSet {
    /// Validate rows against the catalog and freeze them as one cohort's snapshot.
    pub fn build(
        cohort: CohortDate,
        submissions: Vec<Submission>,
        catalog: &ProgramCatalog,
    ) -> Result<Self, IntakeError> {
        validate_rows(&submissions, catalog)?;
        Ok(Self::from_validated(cohort, submissions))
    }
}

fn validate_rows(
    submissions: &[Submission],
    catalog: &ProgramCatalog,
) -> Result<(), IntakeError> {
    let mut seen: BTreeSet<(ApplicantId, &ProgramCode)> = BTreeSet::new();
    for submission in submissions {
        if submission.priority == 0 {
            return Err(IntakeError::NonPositivePriority {
                applicant_id: submission.applicant_id,
                program_code: submission.program_code.clone(),
            });
        }
        if !catalog.contains(&submission.program_code) {
            return Err(IntakeError::UnknownProgram {
                applicant_id: submission.applicant_id,
                code: submission.program_code.clone(),
            });
        }
        if !seen.insert((submission.applicant_id, &submission.program_code)) {
            return Err(IntakeError::DuplicateSubmission {
                applicant_id: submission.applicant_id,
                program_code: submission.program_code.clone(),
            });
        }
    }
    Ok(())
}

/// Parse a snapshot with header `id,program,priority,physics,rus,math,extra,total,consent`.
pub fn parse_submissions<R: Read>(
    reader: R,
    cohort: CohortDate,
    catalog: &ProgramCatalog,
) -> Result<SubmissionSet, IntakeError> {
    let rows = parse_rows(reader)?;
    let mut submissions = Vec::with_capacity(rows.len());

    for NumberedRow { line, row } in rows {
        let scores = ScoreCard {
            physics_ict: parse_number(line, "physics", &row.physics)?,
            russian: parse_number(line, "rus", &row.rus)?,
            math: parse_number(line, "math", &row.math)?,
            extra: parse_number(line, "extra", &row.extra)?,
            total: parse_number(line, "total", &row.total)?,
        };

        submissions.push(Submission {
            applicant_id: ApplicantId(parse_applicant_id(line, &row.id)?),
            program_code: ProgramCode::new(&row.program),
            priority: parse_number(line, "priority", &row.priority)?,
            scores,
            has_consent: parse_consent(line, &row.consent)?,
        });
    }

    debug!(cohort = %cohort, rows = submissions.len(), "snapshot rows parsed");
    SubmissionSet::build(cohort, submissions, catalog)
}

pub fn parse_submissions_from_path<P: AsRef<Path>>(
    path: P,
    cohort: CohortDate,
    catalog: &ProgramCatalog,
) -> Result<SubmissionSet, IntakeError> {
    let file = std::fs::File::open(path)?;
    parse_submissions(file, cohort, catalog)
}
