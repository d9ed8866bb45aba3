use serde::{Deserialize, Serialize};

use super::super::domain::Submission;

/// Admission cutoff for a program, or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassingScore {
    Cutoff { score: u32 },
    /// Fewer committed applicants than seats; no cutoff exists.
    Undersubscribed,
}

impl PassingScore {
    pub fn score(self) -> Option<u32> {
        match self {
            PassingScore::Cutoff { score } => Some(score),
            PassingScore::Undersubscribed => None,
        }
    }

    pub fn is_undersubscribed(self) -> bool {
        matches!(self, PassingScore::Undersubscribed)
    }

    pub fn label(self) -> String {
        match self {
            PassingScore::Cutoff { score } => score.to_string(),
            PassingScore::Undersubscribed => "undersubscribed".to_string(),
        }
    }
}

/// Derive the cutoff from a program's enrolled set.
///
/// Scores are those of the submission each applicant was placed under, not their best
/// score across programs. A program with zero seats is always undersubscribed.
pub fn passing_score(enrolled: &[Submission], seats: u32) -> PassingScore {
    let seats = seats as usize;
    if seats == 0 || enrolled.len() < seats {
        return PassingScore::Undersubscribed;
    }

    let mut totals: Vec<u32> = enrolled.iter().map(Submission::total_score).collect();
    totals.sort_unstable_by(|a, b| b.cmp(a));

    PassingScore::Cutoff {
        score: totals[seats - 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admission::domain::{ApplicantId, ProgramCode, ScoreCard};

    fn enrolled(totals: &[u32]) -> Vec<Submission> {
        totals
            .iter()
            .enumerate()
            .map(|(idx, total)| Submission {
                applicant_id: ApplicantId(idx as u64 + 1),
                program_code: ProgramCode::new("pm"),
                priority: 1,
                scores: ScoreCard {
                    physics_ict: 0,
                    russian: 0,
                    math: 0,
                    extra: 0,
                    total: *total,
                },
                has_consent: true,
            })
            .collect()
    }

    #[test]
    fn full_program_reports_lowest_filled_seat() {
        let seats = enrolled(&[180, 250, 210]);
        assert_eq!(passing_score(&seats, 3), PassingScore::Cutoff { score: 180 });
    }

    #[test]
    fn short_program_is_undersubscribed() {
        let seats = enrolled(&[250, 210]);
        assert_eq!(passing_score(&seats, 3), PassingScore::Undersubscribed);
        assert_eq!(passing_score(&[], 5), PassingScore::Undersubscribed);
    }

    #[test]
    fn zero_score_cutoff_differs_from_undersubscribed() {
        let seats = enrolled(&[0]);
        let cutoff = passing_score(&seats, 1);
        assert_eq!(cutoff, PassingScore::Cutoff { score: 0 });
        assert_eq!(cutoff.score(), Some(0));
        assert!(!cutoff.is_undersubscribed());
    }

    #[test]
    fn zero_seat_program_never_has_cutoff() {
        assert_eq!(passing_score(&[], 0), PassingScore::Undersubscribed);
    }

    #[test]
    fn serializes_with_explicit_status_tag() {
        let cutoff = serde_json::to_value(PassingScore::Cutoff { score: 241 }).expect("json");
        assert_eq!(cutoff, serde_json::json!({ "status": "cutoff", "score": 241 }));

        let short = serde_json::to_value(PassingScore::Undersubscribed).expect("json");
        assert_eq!(short, serde_json::json!({ "status": "undersubscribed" }));
    }
}
