//! Admission tracking: cohort snapshot intake, seat allocation, passing scores, and reports.

pub mod allocation;
pub mod domain;
pub mod intake;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use allocation::{
    allocate, passing_score, AllocationEngine, AllocationError, AllocationResult, PassingScore,
    Placement, ProgramAllocation,
};
pub use domain::{
    ApplicantId, CatalogError, CohortDate, CohortDateError, ProgramCatalog, ProgramCode,
    ProgramDescriptor, ScoreCard, Submission, SubmissionSet,
};
pub use intake::{parse_submissions, parse_submissions_from_path, IntakeError};
pub use report::{AdmissionReport, CohortHistory};
pub use repository::{PassingScoreRecord, RepositoryError, SnapshotDiff, SnapshotRepository};
pub use router::admission_router;
pub use service::{
    AdmissionService, AdmissionServiceError, ApplicantQuery, ApplicantRow, CohortStatistics,
    ProgramView, SortKey, SortOrder, UploadSummary,
};
