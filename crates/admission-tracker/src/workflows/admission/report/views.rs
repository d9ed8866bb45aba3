use serde::Serialize;

use super::super::allocation::PassingScore;
use super::super::domain::{ApplicantId, CohortDate, ProgramCode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassingScoreEntry {
    pub program_code: ProgramCode,
    pub program_name: String,
    pub seats: u32,
    pub passing_score: PassingScore,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicsPoint {
    pub cohort: CohortDate,
    /// `None` when the program was undersubscribed or not computed for that date.
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDynamicsSeries {
    pub program_code: ProgramCode,
    pub program_name: String,
    pub points: Vec<DynamicsPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledEntry {
    pub rank: usize,
    pub applicant_id: ApplicantId,
    pub total_score: u32,
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledList {
    pub program_code: ProgramCode,
    pub program_name: String,
    pub seats: u32,
    pub entries: Vec<EnrolledEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramStatistics {
    pub program_code: ProgramCode,
    pub program_name: String,
    pub submissions: usize,
    pub with_consent: usize,
    pub enrolled: usize,
    /// Submissions per seat, two decimals; zero for programs without seats.
    pub competition: f64,
}
