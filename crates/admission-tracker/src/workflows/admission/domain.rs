use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

/// Identifier carried by every application row; one applicant may hold several rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ApplicantId(pub u64);

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Program identifier, stored trimmed and lowercased so `PM` and `pm` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct ProgramCode(String);

impl ProgramCode {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProgramCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProgramCode {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<ProgramCode> for String {
    fn from(value: ProgramCode) -> Self {
        value.0
    }
}

/// Label of one snapshot batch, e.g. `01.08`. Underscores from file-safe names are
/// folded back into dots so `01_08` and `01.08` name the same cohort.
///
/// `DD.MM` labels order by calendar date; any other label sorts after them by text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CohortDate(String);

impl CohortDate {
    pub fn parse(raw: &str) -> Result<Self, CohortDateError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CohortDateError::Empty);
        }

        if let Some(invalid) = trimmed
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_')))
        {
            return Err(CohortDateError::InvalidCharacter {
                value: trimmed.to_string(),
                invalid,
            });
        }

        Ok(Self(trimmed.replace('_', ".")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `(month, day)` when the label is a `DD.MM` date.
    fn day_of_year(&self) -> Option<(u8, u8)> {
        let (day, month) = self.0.split_once('.')?;
        let day: u8 = day.parse().ok()?;
        let month: u8 = month.parse().ok()?;
        ((1..=31).contains(&day) && (1..=12).contains(&month)).then_some((month, day))
    }
}

impl Ord for CohortDate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.day_of_year(), other.day_of_year()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for CohortDate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for CohortDate {
    type Error = CohortDateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CohortDate> for String {
    fn from(value: CohortDate) -> Self {
        value.0
    }
}

impl fmt::Display for CohortDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CohortDateError {
    #[error("cohort date must not be empty")]
    Empty,
    #[error("cohort date '{value}' contains unsupported character '{invalid}'")]
    InvalidCharacter { value: String, invalid: char },
}

/// Exam results attached to a single application row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub physics_ict: u32,
    pub russian: u32,
    pub math: u32,
    pub extra: u32,
    /// Precomputed by the supplier; not re-derived from the components.
    pub total: u32,
}

/// One applicant's application to one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub applicant_id: ApplicantId,
    pub program_code: ProgramCode,
    /// Lower value means stronger preference.
    pub priority: u32,
    pub scores: ScoreCard,
    pub has_consent: bool,
}

impl Submission {
    pub fn total_score(&self) -> u32 {
        self.scores.total
    }
}

/// Seat and naming information for an academic program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDescriptor {
    pub code: ProgramCode,
    pub name: String,
    pub short_name: String,
    pub seats: u32,
}

/// Immutable capacity table keyed by program code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramCatalog {
    programs: BTreeMap<ProgramCode, ProgramDescriptor>,
}

impl ProgramCatalog {
    pub fn new(programs: Vec<ProgramDescriptor>) -> Result<Self, CatalogError> {
        let mut table = BTreeMap::new();
        for program in programs {
            if program.code.as_str().is_empty() {
                return Err(CatalogError::EmptyCode);
            }
            let code = program.code.clone();
            if table.insert(code.clone(), program).is_some() {
                return Err(CatalogError::DuplicateProgram { code });
            }
        }
        Ok(Self { programs: table })
    }

    /// The four programs offered by default.
    pub fn standard() -> Self {
        let programs = [
            ("pm", "Applied Mathematics", "PM", 40),
            ("ivt", "Informatics and Computer Engineering", "IVT", 50),
            (
                "itss",
                "Infocommunication Technologies and Communication Systems",
                "ITSS",
                30,
            ),
            ("ib", "Information Security", "IB", 20),
        ]
        .into_iter()
        .map(|(code, name, short_name, seats)| {
            let code = ProgramCode::new(code);
            (
                code.clone(),
                ProgramDescriptor {
                    code,
                    name: name.to_string(),
                    short_name: short_name.to_string(),
                    seats,
                },
            )
        })
        .collect();

        Self { programs }
    }

    /// Load a catalog from CSV with the header `code,name,short_name,seats`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        #[derive(Deserialize)]
        struct CatalogRow {
            code: String,
            name: String,
            #[serde(default)]
            short_name: Option<String>,
            seats: u32,
        }

        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut programs = Vec::new();
        for row in csv_reader.deserialize::<CatalogRow>() {
            let row = row?;
            let short_name = row
                .short_name
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| row.code.to_ascii_uppercase());
            programs.push(ProgramDescriptor {
                code: ProgramCode::new(&row.code),
                name: row.name,
                short_name,
                seats: row.seats,
            });
        }

        Self::new(programs)
    }

    pub fn get(&self, code: &ProgramCode) -> Option<&ProgramDescriptor> {
        self.programs.get(code)
    }

    pub fn seats(&self, code: &ProgramCode) -> Option<u32> {
        self.programs.get(code).map(|program| program.seats)
    }

    pub fn contains(&self, code: &ProgramCode) -> bool {
        self.programs.contains_key(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgramDescriptor> {
        self.programs.values()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl Default for ProgramCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid program catalog CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("program code must not be empty")]
    EmptyCode,
    #[error("program '{code}' is listed more than once")]
    DuplicateProgram { code: ProgramCode },
}

/// Immutable collection of every application row for one cohort date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionSet {
    cohort: CohortDate,
    submissions: Vec<Submission>,
}

impl SubmissionSet {
    /// Wrap rows that were already validated elsewhere.
    pub(crate) fn from_validated(cohort: CohortDate, submissions: Vec<Submission>) -> Self {
        Self {
            cohort,
            submissions,
        }
    }

    pub fn cohort(&self) -> &CohortDate {
        &self.cohort
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn with_consent(&self) -> impl Iterator<Item = &Submission> {
        self.submissions.iter().filter(|submission| submission.has_consent)
    }

    pub fn for_program<'a>(
        &'a self,
        code: &'a ProgramCode,
    ) -> impl Iterator<Item = &'a Submission> + 'a {
        self.submissions
            .iter()
            .filter(move |submission| &submission.program_code == code)
    }
}
