use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::models::job::{validate_new_job, DEFAULT_NUM_TWEETS};
use crate::models::{GenerationParams, Job, JobKind, JobStatus, NewJob};

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

fn error_response(status: StatusCode, error: &str, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Request/response payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub repo_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub blog_content: String,
    pub num_tweets: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Submission flow shared by /analyze and /convert
// ---------------------------------------------------------------------------

/// Persist a job and hand it to the dispatcher without ever waiting on
/// generation. The dispatch slot is reserved before the record is created, so
/// an overloaded rejection leaves no stranded pending job behind.
async fn submit_job(
    state: &AppState,
    new: NewJob,
) -> Result<Job, (StatusCode, Json<ErrorResponse>)> {
    if let Err(e) = validate_new_job(&new) {
        tracing::warn!("Job submission rejected: {}", e);
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "validation_error",
            &e.to_string(),
        ));
    }

    let permit = match state.dispatcher.try_reserve() {
        Ok(permit) => permit,
        Err(e) => {
            tracing::warn!("Job submission rejected: {}", e);
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "overloaded",
                &e.to_string(),
            ));
        }
    };

    match state.job_store.create_job(new).await {
        Ok(job) => {
            permit.send(job.clone());
            tracing::info!("Job {} accepted ({:?})", job.id, job.kind);
            Ok(job)
        }
        Err(e) => {
            tracing::error!("Failed to persist job: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                &format!("Failed to create job: {}", e),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /analyze
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let new = NewJob {
        kind: JobKind::RepoToBlog,
        input: request.repo_url,
        params: GenerationParams::default(),
    };

    match submit_job(&state, new).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                job_id: job.id,
                status: job.status,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// POST /convert
pub async fn convert(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConvertRequest>,
) -> impl IntoResponse {
    let new = NewJob {
        kind: JobKind::BlogToThread,
        input: request.blog_content,
        params: GenerationParams {
            num_tweets: Some(request.num_tweets.unwrap_or(DEFAULT_NUM_TWEETS)),
        },
    };

    match submit_job(&state, new).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                job_id: job.id,
                status: job.status,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    // An unparseable id is indistinguishable from an unknown one to the client
    let job_id = match Uuid::parse_str(&id) {
        Ok(job_id) => job_id,
        Err(_) => {
            tracing::warn!("Job not found: '{}'", id);
            return error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                &format!("Job with id '{}' not found", id),
            )
            .into_response();
        }
    };

    match state.job_store.get_job(job_id).await {
        Ok(Some(job)) => (
            StatusCode::OK,
            Json(JobStatusResponse {
                job_id: job.id,
                status: job.status,
                result: job.result,
            }),
        )
            .into_response(),
        Ok(None) => {
            tracing::warn!("Job not found: '{}'", id);
            error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                &format!("Job with id '{}' not found", id),
            )
            .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to fetch job '{}': {}", id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                &format!("Failed to fetch job: {}", e),
            )
            .into_response()
        }
    }
}

/// GET /jobs
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.job_store.list_jobs().await {
        Ok(jobs) => {
            let summaries: Vec<JobSummary> = jobs
                .into_iter()
                .map(|job| JobSummary {
                    job_id: job.id,
                    kind: job.kind,
                    status: job.status,
                    created_at: job.created_at,
                    updated_at: job.updated_at,
                })
                .collect();
            (StatusCode::OK, Json(summaries)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to list jobs: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                &format!("Failed to list jobs: {}", e),
            )
            .into_response()
        }
    }
}
