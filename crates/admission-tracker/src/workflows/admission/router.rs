use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;

use crate::error::AppError;

use super::allocation::PassingScore;
use super::domain::{CohortDate, ProgramCode};
use super::report::AdmissionReport;
use super::repository::{PassingScoreRecord, SnapshotRepository};
use super::service::{
    AdmissionService, ApplicantQuery, ApplicantRow, CohortStatistics, ProgramView, UploadSummary,
};

/// Router builder exposing snapshot upload and allocation views.
pub fn admission_router<R>(service: Arc<AdmissionService<R>>) -> Router
where
    R: SnapshotRepository + 'static,
{
    Router::new()
        .route("/api/v1/admissions/cohorts", get(cohorts_handler::<R>))
        .route(
            "/api/v1/admissions/cohorts/:cohort",
            delete(remove_cohort_handler::<R>),
        )
        .route(
            "/api/v1/admissions/cohorts/:cohort/snapshot",
            post(upload_handler::<R>),
        )
        .route(
            "/api/v1/admissions/cohorts/:cohort/applicants",
            get(applicants_handler::<R>),
        )
        .route(
            "/api/v1/admissions/cohorts/:cohort/programs/:code",
            get(program_handler::<R>),
        )
        .route(
            "/api/v1/admissions/cohorts/:cohort/passing-scores",
            get(passing_scores_handler::<R>).post(recalculate_handler::<R>),
        )
        .route(
            "/api/v1/admissions/cohorts/:cohort/statistics",
            get(statistics_handler::<R>),
        )
        .route(
            "/api/v1/admissions/cohorts/:cohort/report",
            get(report_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn cohorts_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
) -> Result<Json<Vec<CohortDate>>, AppError>
where
    R: SnapshotRepository + 'static,
{
    Ok(Json(service.cohorts()?))
}

pub(crate) async fn remove_cohort_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
    Path(cohort): Path<String>,
) -> Result<StatusCode, AppError>
where
    R: SnapshotRepository + 'static,
{
    service.remove_cohort(&CohortDate::parse(&cohort)?)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn upload_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
    Path(cohort): Path<String>,
    body: String,
) -> Result<(StatusCode, Json<UploadSummary>), AppError>
where
    R: SnapshotRepository + 'static,
{
    let cohort = CohortDate::parse(&cohort)?;
    let summary = service.upload(cohort, body.as_bytes())?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub(crate) async fn applicants_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
    Path(cohort): Path<String>,
    Query(query): Query<ApplicantQuery>,
) -> Result<Json<Vec<ApplicantRow>>, AppError>
where
    R: SnapshotRepository + 'static,
{
    let cohort = CohortDate::parse(&cohort)?;
    Ok(Json(service.applicants(&cohort, &query)?))
}

pub(crate) async fn program_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
    Path((cohort, code)): Path<(String, String)>,
    Query(query): Query<ApplicantQuery>,
) -> Result<Json<ProgramView>, AppError>
where
    R: SnapshotRepository + 'static,
{
    let cohort = CohortDate::parse(&cohort)?;
    let code = ProgramCode::new(code);
    Ok(Json(service.program_view(&cohort, &code, &query)?))
}

pub(crate) async fn passing_scores_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
    Path(cohort): Path<String>,
) -> Result<Json<Vec<PassingScoreRecord>>, AppError>
where
    R: SnapshotRepository + 'static,
{
    let cohort = CohortDate::parse(&cohort)?;
    Ok(Json(service.passing_scores(&cohort)?))
}

pub(crate) async fn recalculate_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
    Path(cohort): Path<String>,
) -> Result<Json<BTreeMap<ProgramCode, PassingScore>>, AppError>
where
    R: SnapshotRepository + 'static,
{
    let cohort = CohortDate::parse(&cohort)?;
    Ok(Json(service.recalculate(&cohort)?))
}

pub(crate) async fn statistics_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
    Path(cohort): Path<String>,
) -> Result<Json<CohortStatistics>, AppError>
where
    R: SnapshotRepository + 'static,
{
    let cohort = CohortDate::parse(&cohort)?;
    Ok(Json(service.statistics(&cohort)?))
}

pub(crate) async fn report_handler<R>(
    State(service): State<Arc<AdmissionService<R>>>,
    Path(cohort): Path<String>,
) -> Result<Json<AdmissionReport>, AppError>
where
    R: SnapshotRepository + 'static,
{
    let cohort = CohortDate::parse(&cohort)?;
    Ok(Json(service.report(&cohort, Utc::now())?))
}
