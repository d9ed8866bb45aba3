use std::collections::BTreeMap;

use super::super::domain::{ApplicantId, Submission, SubmissionSet};

/// Consenting submissions of one applicant, strongest preference first.
#[derive(Debug)]
pub(crate) struct PreferenceList<'a> {
    pub(crate) applicant_id: ApplicantId,
    /// Best total score across this applicant's own eligible rows.
    pub(crate) ranking_key: u32,
    pub(crate) choices: Vec<&'a Submission>,
}

/// Group consenting rows per applicant and order applicants for serial processing.
///
/// Choices are ordered by `(priority, program_code)`; applicants by ranking key
/// descending, then applicant id ascending.
pub(crate) fn ranked_preference_lists(set: &SubmissionSet) -> Vec<PreferenceList<'_>> {
    let mut grouped: BTreeMap<ApplicantId, Vec<&Submission>> = BTreeMap::new();
    for submission in set.with_consent() {
        grouped
            .entry(submission.applicant_id)
            .or_default()
            .push(submission);
    }

    let mut lists: Vec<PreferenceList<'_>> = grouped
        .into_iter()
        .map(|(applicant_id, mut choices)| {
            choices.sort_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| a.program_code.cmp(&b.program_code))
            });
            let ranking_key = choices
                .iter()
                .map(|submission| submission.total_score())
                .max()
                .unwrap_or_default();
            PreferenceList {
                applicant_id,
                ranking_key,
                choices,
            }
        })
        .collect();

    lists.sort_by(|a, b| {
        b.ranking_key
            .cmp(&a.ranking_key)
            .then_with(|| a.applicant_id.cmp(&b.applicant_id))
    });

    lists
}
