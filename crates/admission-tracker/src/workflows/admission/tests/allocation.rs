use std::collections::{BTreeMap, BTreeSet};

use super::common::*;
use crate::workflows::admission::allocation::{
    allocate, AllocationEngine, AllocationError, PassingScore,
};
use crate::workflows::admission::domain::{ApplicantId, ProgramCatalog, Submission};

/// Deterministic cohort shaped like the generator's daily snapshots.
fn generated_rows(applicants: u64) -> Vec<Submission> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = |bound: u64| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state % bound
    };

    let programs = ["pm", "ivt", "itss", "ib"];
    let mut rows = Vec::new();
    for applicant in 1..=applicants {
        let choices = 1 + next(4) as usize;
        let offset = next(4) as usize;
        for choice in 0..choices {
            let program = programs[(offset + choice) % programs.len()];
            let total = 150 + next(160) as u32;
            rows.push(submission(
                applicant,
                program,
                choice as u32 + 1,
                total,
                next(3) != 0,
            ));
        }
    }
    rows
}

fn generated_catalog() -> ProgramCatalog {
    catalog(&[("pm", 40), ("ivt", 50), ("itss", 30), ("ib", 20)])
}

#[test]
fn higher_ranked_applicant_takes_contested_seat() {
    let catalog = catalog(&[("a", 1), ("b", 1)]);
    let set = submission_set(
        "01.08",
        &catalog,
        vec![
            submission(1, "a", 1, 90, true),
            submission(1, "b", 2, 80, true),
            submission(2, "a", 1, 85, true),
        ],
    );

    let result = AllocationEngine::new(catalog).run(&set).expect("allocation runs");

    let enrolled_a: Vec<u64> = result
        .enrolled(&code("a"))
        .iter()
        .map(|row| row.applicant_id.0)
        .collect();
    assert_eq!(enrolled_a, vec![1]);
    assert!(result.enrolled(&code("b")).is_empty());
    assert_eq!(
        result.passing_score(&code("a")),
        Some(PassingScore::Cutoff { score: 90 })
    );
    assert_eq!(
        result.passing_score(&code("b")),
        Some(PassingScore::Undersubscribed)
    );
    assert_eq!(result.unassigned, vec![ApplicantId(2)]);
}

#[test]
fn non_consenting_applicant_leaves_program_undersubscribed() {
    let catalog = catalog(&[("a", 1)]);
    let set = submission_set("01.08", &catalog, vec![submission(1, "a", 1, 70, false)]);

    let result = AllocationEngine::new(catalog).run(&set).expect("allocation runs");

    assert!(result.enrolled(&code("a")).is_empty());
    assert_eq!(
        result.passing_score(&code("a")),
        Some(PassingScore::Undersubscribed)
    );
    assert!(result.unassigned.is_empty());
}

#[test]
fn applicant_falls_through_to_next_preference() {
    let catalog = catalog(&[("a", 1), ("b", 2)]);
    let set = submission_set(
        "01.08",
        &catalog,
        vec![
            submission(1, "a", 1, 250, true),
            submission(2, "a", 1, 240, true),
            submission(2, "b", 2, 240, true),
            submission(3, "b", 1, 200, true),
        ],
    );

    let result = AllocationEngine::new(catalog).run(&set).expect("allocation runs");

    let placement = result.placement_of(ApplicantId(2)).expect("applicant 2 placed");
    assert_eq!(placement.program_code, &code("b"));
    assert_eq!(placement.submission.priority, 2);
    assert_eq!(
        result.passing_score(&code("b")),
        Some(PassingScore::Cutoff { score: 200 })
    );
}

#[test]
fn ranking_uses_best_score_but_cutoff_uses_assigned_score() {
    let catalog = catalog(&[("a", 1), ("b", 1)]);
    let set = submission_set(
        "01.08",
        &catalog,
        vec![
            submission(1, "a", 1, 180, true),
            submission(1, "b", 2, 260, true),
            submission(2, "a", 1, 200, true),
        ],
    );

    let result = AllocationEngine::new(catalog).run(&set).expect("allocation runs");

    // Applicant 1 is processed first on the strength of the 260 row, yet lands on A.
    assert_eq!(
        result.placement_of(ApplicantId(1)).map(|p| p.program_code.clone()),
        Some(code("a"))
    );
    assert_eq!(
        result.passing_score(&code("a")),
        Some(PassingScore::Cutoff { score: 180 })
    );
    assert_eq!(result.unassigned, vec![ApplicantId(2)]);
}

#[test]
fn equal_ranking_keys_prefer_lower_applicant_id() {
    let catalog = catalog(&[("a", 1)]);
    let set = submission_set(
        "01.08",
        &catalog,
        vec![
            submission(42, "a", 1, 230, true),
            submission(7, "a", 1, 230, true),
        ],
    );

    let result = AllocationEngine::new(catalog).run(&set).expect("allocation runs");
    assert_eq!(result.enrolled(&code("a"))[0].applicant_id, ApplicantId(7));
    assert_eq!(result.unassigned, vec![ApplicantId(42)]);
}

#[test]
fn zero_seat_program_stays_empty_and_undersubscribed() {
    let catalog = catalog(&[("a", 0), ("b", 1)]);
    let set = submission_set(
        "01.08",
        &catalog,
        vec![
            submission(1, "a", 1, 300, true),
            submission(1, "b", 2, 300, true),
        ],
    );

    let result = AllocationEngine::new(catalog).run(&set).expect("allocation runs");
    assert!(result.enrolled(&code("a")).is_empty());
    assert_eq!(
        result.passing_score(&code("a")),
        Some(PassingScore::Undersubscribed)
    );
    assert_eq!(
        result.passing_score(&code("b")),
        Some(PassingScore::Cutoff { score: 300 })
    );
}

#[test]
fn programs_without_applicants_still_appear_in_result() {
    let catalog = catalog(&[("a", 2), ("b", 3)]);
    let set = submission_set("01.08", &catalog, Vec::new());

    let result = AllocationEngine::new(catalog).run(&set).expect("allocation runs");
    assert_eq!(result.programs.len(), 2);
    assert!(result
        .passing_scores()
        .values()
        .all(|score| score.is_undersubscribed()));
}

#[test]
fn unknown_program_aborts_the_run() {
    let wide = catalog(&[("a", 1), ("b", 1)]);
    let narrow = catalog(&[("a", 1)]);
    let set = submission_set(
        "01.08",
        &wide,
        vec![
            submission(1, "a", 1, 200, true),
            submission(2, "b", 1, 190, false),
        ],
    );

    assert_eq!(
        allocate(&set, &narrow),
        Err(AllocationError::UnknownProgram { code: code("b") })
    );
    assert!(AllocationEngine::new(narrow).run(&set).is_err());
}

#[test]
fn generated_cohort_respects_capacity_consent_and_single_placement() {
    let catalog = generated_catalog();
    let set = submission_set("04.08", &catalog, generated_rows(600));
    let result = AllocationEngine::new(catalog.clone())
        .run(&set)
        .expect("allocation runs");

    let mut placed = BTreeSet::new();
    for (program, allocation) in &result.programs {
        let seats = catalog.seats(program).expect("known program");
        assert!(allocation.enrolled.len() as u32 <= seats);
        for row in &allocation.enrolled {
            assert!(row.has_consent, "row without consent was enrolled");
            assert_eq!(&row.program_code, program);
            assert!(placed.insert(row.applicant_id), "applicant placed twice");
        }

        let lowest = allocation.enrolled.iter().map(Submission::total_score).min();
        if allocation.enrolled.len() as u32 == seats && seats > 0 {
            assert_eq!(allocation.passing_score.score(), lowest);
        } else {
            assert_eq!(allocation.passing_score, PassingScore::Undersubscribed);
        }
    }

    assert!(result
        .unassigned
        .iter()
        .all(|applicant| !placed.contains(applicant)));
}

#[test]
fn generated_cohort_never_skips_an_open_preferred_program() {
    let catalog = generated_catalog();
    let set = submission_set("04.08", &catalog, generated_rows(600));
    let result = AllocationEngine::new(catalog.clone())
        .run(&set)
        .expect("allocation runs");

    let mut ranking_key: BTreeMap<ApplicantId, u32> = BTreeMap::new();
    for row in set.with_consent() {
        let key = ranking_key.entry(row.applicant_id).or_default();
        *key = (*key).max(row.total_score());
    }
    let rank_of = |applicant: ApplicantId| {
        let key = ranking_key[&applicant];
        ranking_key
            .iter()
            .filter(|(other, other_key)| {
                **other_key > key || (**other_key == key && **other < applicant)
            })
            .count()
    };

    for row in set.with_consent() {
        let Some(placement) = result.placement_of(row.applicant_id) else {
            continue;
        };
        if row.priority >= placement.submission.priority {
            continue;
        }
        // A stronger preference was skipped, so it must have been filled by applicants
        // processed earlier.
        let applicant_rank = rank_of(row.applicant_id);
        let filled_before = result
            .enrolled(&row.program_code)
            .iter()
            .filter(|enrolled| rank_of(enrolled.applicant_id) < applicant_rank)
            .count() as u32;
        assert_eq!(
            filled_before,
            catalog.seats(&row.program_code).expect("known program"),
            "applicant {} skipped open program {}",
            row.applicant_id,
            row.program_code
        );
    }
}

#[test]
fn repeated_runs_are_identical() {
    let catalog = generated_catalog();
    let set = submission_set("03.08", &catalog, generated_rows(400));
    let engine = AllocationEngine::new(catalog);

    let first = engine.run(&set).expect("first run");
    let second = engine.run(&set).expect("second run");
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).expect("json"),
        serde_json::to_vec(&second).expect("json")
    );
}

#[test]
fn input_row_order_does_not_change_the_outcome() {
    let catalog = generated_catalog();
    let rows = generated_rows(300);
    let mut reversed = rows.clone();
    reversed.reverse();

    let engine = AllocationEngine::new(catalog.clone());
    let forward = engine
        .run(&submission_set("02.08", &catalog, rows))
        .expect("forward run");
    let backward = engine
        .run(&submission_set("02.08", &catalog, reversed))
        .expect("reverse run");

    assert_eq!(forward.passing_scores(), backward.passing_scores());
    for program in catalog.iter() {
        let ids = |result: &crate::workflows::admission::AllocationResult| {
            result
                .ranked(&program.code)
                .iter()
                .map(|row| row.applicant_id)
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&forward), ids(&backward));
    }
}
