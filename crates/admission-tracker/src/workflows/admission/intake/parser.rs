use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::IntakeError;

/// Raw snapshot row with every field still textual, so coercion errors can name the field.
#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotRow {
    #[serde(deserialize_with = "trimmed")]
    pub(crate) id: String,
    #[serde(deserialize_with = "trimmed")]
    pub(crate) program: String,
    #[serde(deserialize_with = "trimmed")]
    pub(crate) priority: String,
    #[serde(deserialize_with = "trimmed")]
    pub(crate) physics: String,
    #[serde(deserialize_with = "trimmed")]
    pub(crate) rus: String,
    #[serde(deserialize_with = "trimmed")]
    pub(crate) math: String,
    #[serde(deserialize_with = "trimmed")]
    pub(crate) extra: String,
    #[serde(deserialize_with = "trimmed")]
    pub(crate) total: String,
    #[serde(deserialize_with = "trimmed")]
    pub(crate) consent: String,
}

/// A row paired with the physical line it starts on; the header is line 1.
pub(crate) struct NumberedRow {
    pub(crate) line: u64,
    pub(crate) row: SnapshotRow,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<NumberedRow>, IntakeError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or_default();
        let row = record.deserialize::<SnapshotRow>(Some(&headers))?;
        rows.push(NumberedRow { line, row });
    }

    Ok(rows)
}

pub(crate) fn parse_number(
    line: u64,
    field: &'static str,
    value: &str,
) -> Result<u32, IntakeError> {
    value.parse::<u32>().map_err(|_| IntakeError::Malformed {
        line,
        field,
        value: value.to_string(),
    })
}

pub(crate) fn parse_applicant_id(line: u64, value: &str) -> Result<u64, IntakeError> {
    value.parse::<u64>().map_err(|_| IntakeError::Malformed {
        line,
        field: "id",
        value: value.to_string(),
    })
}

pub(crate) fn parse_consent(line: u64, value: &str) -> Result<bool, IntakeError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(IntakeError::Malformed {
            line,
            field: "consent",
            value: value.to_string(),
        }),
    }
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}
