use crate::infra::{parse_cohort, parse_snapshot_source, InMemorySnapshotRepository, SnapshotSource};
use admission_tracker::config::AppConfig;
use admission_tracker::error::AppError;
use admission_tracker::telemetry;
use admission_tracker::workflows::admission::{
    parse_submissions_from_path, AdmissionReport, AdmissionService, AllocationEngine,
    AllocationResult, CohortDate, ProgramCatalog, SubmissionSet,
};
use chrono::Utc;
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    /// Cohort date label for the snapshot (e.g. 01.08)
    #[arg(long, value_parser = parse_cohort)]
    pub(crate) cohort: CohortDate,
    /// Snapshot CSV with header id,program,priority,physics,rus,math,extra,total,consent
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Print the full allocation result as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Snapshot to load as COHORT=PATH; repeat for every day of the campaign
    #[arg(long = "snapshot", value_parser = parse_snapshot_source, required = true)]
    pub(crate) snapshots: Vec<SnapshotSource>,
    /// Cohort to report on (defaults to the latest loaded cohort)
    #[arg(long, value_parser = parse_cohort)]
    pub(crate) cohort: Option<CohortDate>,
    /// Print the report as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

fn bootstrap() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let AllocateArgs { cohort, csv, json } = args;

    let config = bootstrap()?;
    let engine = AllocationEngine::new(config.admission.catalog);
    let set = parse_submissions_from_path(&csv, cohort, engine.catalog())?;
    let result = engine.run(&set)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        render_allocation(engine.catalog(), &set, &result);
    }
    Ok(())
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        snapshots,
        cohort,
        json,
    } = args;

    let config = bootstrap()?;
    let repository = Arc::new(InMemorySnapshotRepository::default());
    let service = AdmissionService::new(repository, config.admission);

    for source in snapshots {
        let file = File::open(&source.path)?;
        service.upload(source.cohort, file)?;
    }

    let cohort = match cohort {
        Some(cohort) => cohort,
        None => service.latest_cohort()?.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "no snapshots loaded")
        })?,
    };
    let report = service.report(&cohort, Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_report(&report);
    }
    Ok(())
}

fn render_allocation(catalog: &ProgramCatalog, set: &SubmissionSet, result: &AllocationResult) {
    println!("Allocation for cohort {}", result.cohort);
    println!(
        "Submissions: {} ({} with consent)",
        set.len(),
        set.with_consent().count()
    );

    println!("\nPrograms");
    for program in catalog.iter() {
        let Some(allocation) = result.programs.get(&program.code) else {
            continue;
        };
        println!(
            "- {} ({}): {}/{} seats filled | passing score {}",
            program.short_name,
            program.name,
            allocation.enrolled.len(),
            allocation.seats,
            allocation.passing_score.label()
        );
    }

    if result.unassigned.is_empty() {
        println!("\nUnassigned applicants: none");
    } else {
        println!(
            "\nUnassigned applicants with consent: {}",
            result.unassigned.len()
        );
    }
}

fn render_report(report: &AdmissionReport) {
    println!(
        "Admissions report for cohort {} (generated {})",
        report.cohort,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    println!("\nPassing scores");
    for entry in &report.passing_scores {
        println!(
            "- {}: {} ({} seats)",
            entry.program_name, entry.display, entry.seats
        );
    }

    println!("\nPassing score dynamics");
    for series in &report.dynamics {
        let points: Vec<String> = series
            .points
            .iter()
            .map(|point| match point.score {
                Some(score) => format!("{} {}", point.cohort, score),
                None => format!("{} -", point.cohort),
            })
            .collect();
        println!("- {}: {}", series.program_name, points.join(" | "));
    }

    println!("\nProgram statistics");
    for stats in &report.statistics {
        println!(
            "- {}: {} submissions | {} with consent | {} enrolled | competition {:.2}",
            stats.program_name,
            stats.submissions,
            stats.with_consent,
            stats.enrolled,
            stats.competition
        );
    }

    for list in &report.enrolled_lists {
        if list.entries.is_empty() {
            continue;
        }
        println!("\nEnrolled in {} ({} seats)", list.program_name, list.seats);
        for entry in &list.entries {
            println!(
                "  {:>3}. applicant {} | total {} | priority {}",
                entry.rank, entry.applicant_id, entry.total_score, entry.priority
            );
        }
    }
}
