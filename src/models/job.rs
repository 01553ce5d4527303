use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::RepoThreadError;

/// Default thread length when the client does not specify one.
pub const DEFAULT_NUM_TWEETS: u32 = 14;
/// Upper bound on requested thread length.
pub const MAX_NUM_TWEETS: u32 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    RepoToBlog,
    BlogToThread,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Request parameters captured at submission time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_tweets: Option<u32>,
}

impl GenerationParams {
    pub fn num_tweets_or_default(&self) -> u32 {
        self.num_tweets.unwrap_or(DEFAULT_NUM_TWEETS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub input: String,
    #[serde(default)]
    pub params: GenerationParams,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub kind: JobKind,
    pub input: String,
    #[serde(default)]
    pub params: GenerationParams,
}

/// Validate a NewJob before creation.
pub fn validate_new_job(job: &NewJob) -> Result<(), RepoThreadError> {
    if job.input.trim().is_empty() {
        return Err(RepoThreadError::Validation(
            "Job input cannot be empty".to_string(),
        ));
    }

    if job.kind == JobKind::RepoToBlog {
        let url = job.input.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RepoThreadError::Validation(format!(
                "Repository URL must start with http:// or https://, got '{}'",
                url
            )));
        }
    }

    if let Some(n) = job.params.num_tweets {
        if n == 0 || n > MAX_NUM_TWEETS {
            return Err(RepoThreadError::Validation(format!(
                "num_tweets must be between 1 and {}, got {}",
                MAX_NUM_TWEETS, n
            )));
        }
    }

    Ok(())
}
