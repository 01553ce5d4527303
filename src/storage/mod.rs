pub mod jobs;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Job, NewJob};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn list_jobs(&self) -> Result<Vec<Job>>;
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>>;
    async fn create_job(&self, new: NewJob) -> Result<Job>;
    /// Terminal transition: records the result and flips the status to
    /// `completed` (or `failed`). Exactly one such write per job; a second
    /// call for the same id is rejected.
    async fn complete_job(&self, id: Uuid, result: String, failed: bool) -> Result<Job>;
}
