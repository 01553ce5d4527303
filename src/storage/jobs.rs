use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::RepoThreadError;
use crate::models::job::validate_new_job;
use crate::models::{Job, JobStatus, NewJob};
use crate::storage::JobStore;

pub struct JsonJobStore {
    file_path: PathBuf,
    cache: RwLock<Vec<Job>>,
}

impl JsonJobStore {
    /// Create a new JsonJobStore, loading existing data from disk if present.
    ///
    /// If `jobs.json` is corrupted (invalid JSON), creates a backup at
    /// `jobs.json.bak`, logs a warning, and starts with an empty job list.
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .context("Failed to create data directory")?;

        let file_path = data_dir.join("jobs.json");

        let jobs = if file_path.exists() {
            let content = tokio::fs::read_to_string(&file_path)
                .await
                .context("Failed to read jobs.json")?;
            match serde_json::from_str::<Vec<Job>>(&content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    // Corrupted JSON: create backup and start with empty list
                    tracing::warn!(
                        "jobs.json is corrupted ({}), creating backup and starting empty",
                        e
                    );
                    let backup_path = data_dir.join("jobs.json.bak");
                    if let Err(backup_err) = tokio::fs::copy(&file_path, &backup_path).await {
                        tracing::error!(
                            "Failed to create backup of corrupted jobs.json: {}",
                            backup_err
                        );
                    }
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            file_path,
            cache: RwLock::new(jobs),
        })
    }

    /// Atomically write the jobs cache to disk.
    /// Writes to a .tmp file first, then renames to the actual file.
    async fn persist(&self, jobs: &[Job]) -> Result<()> {
        let tmp_path = self.file_path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(jobs).context("Failed to serialize jobs")?;

        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .context("Failed to write temporary jobs file")?;

        tokio::fs::rename(&tmp_path, &self.file_path)
            .await
            .context("Failed to rename temporary jobs file")?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for JsonJobStore {
    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let cache = self.cache.read().await;
        Ok(cache.clone())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        let cache = self.cache.read().await;
        Ok(cache.iter().find(|j| j.id == id).cloned())
    }

    async fn create_job(&self, new: NewJob) -> Result<Job> {
        validate_new_job(&new)?;

        let mut cache = self.cache.write().await;

        let now = Utc::now();
        let job = Job {
            id: Uuid::now_v7(),
            kind: new.kind,
            status: JobStatus::Pending,
            input: new.input,
            params: new.params,
            result: None,
            created_at: now,
            updated_at: now,
        };

        cache.push(job.clone());
        self.persist(&cache).await?;

        Ok(job)
    }

    async fn complete_job(&self, id: Uuid, result: String, failed: bool) -> Result<Job> {
        let mut cache = self.cache.write().await;

        let idx = cache
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| RepoThreadError::NotFound(format!("Job with id '{}' not found", id)))?;

        let job = &mut cache[idx];

        if job.is_terminal() {
            return Err(RepoThreadError::Conflict(format!(
                "Job '{}' already has a terminal result",
                id
            ))
            .into());
        }

        job.status = if failed {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        job.result = Some(result);
        job.updated_at = Utc::now();

        let completed_job = job.clone();
        self.persist(&cache).await?;

        Ok(completed_job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationParams, JobKind};
    use tempfile::TempDir;

    fn make_new_job(input: &str) -> NewJob {
        NewJob {
            kind: JobKind::BlogToThread,
            input: input.to_string(),
            params: GenerationParams {
                num_tweets: Some(5),
            },
        }
    }

    async fn setup_store() -> (JsonJobStore, TempDir) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
            .await
            .expect("create store");
        (store, tmp_dir)
    }

    #[tokio::test]
    async fn test_create_job() {
        let (store, _tmp) = setup_store().await;
        let job = store
            .create_job(make_new_job("The quick brown fox..."))
            .await
            .expect("create");
        assert_eq!(job.kind, JobKind::BlogToThread);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.input, "The quick brown fox...");
        assert!(job.result.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[tokio::test]
    async fn test_create_job_rejects_empty_input() {
        let (store, _tmp) = setup_store().await;
        let result = store.create_job(make_new_job("   ")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_job() {
        let (store, _tmp) = setup_store().await;
        let created = store
            .create_job(make_new_job("some blog content"))
            .await
            .expect("create");
        let fetched = store
            .get_job(created.id)
            .await
            .expect("get")
            .expect("found");
        assert_eq!(created.id, fetched.id);
        assert_eq!(created.input, fetched.input);
        assert_eq!(fetched.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_job_not_found() {
        let (store, _tmp) = setup_store().await;
        let result = store.get_job(Uuid::now_v7()).await.expect("get");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_jobs() {
        let (store, _tmp) = setup_store().await;
        store
            .create_job(make_new_job("post one"))
            .await
            .expect("create");
        store
            .create_job(make_new_job("post two"))
            .await
            .expect("create");
        store
            .create_job(make_new_job("post three"))
            .await
            .expect("create");
        let jobs = store.list_jobs().await.expect("list");
        assert_eq!(jobs.len(), 3);
    }

    #[tokio::test]
    async fn test_list_jobs_empty() {
        let (store, _tmp) = setup_store().await;
        let jobs = store.list_jobs().await.expect("list");
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_complete_job_success() {
        let (store, _tmp) = setup_store().await;
        let created = store
            .create_job(make_new_job("some blog content"))
            .await
            .expect("create");

        let completed = store
            .complete_job(created.id, "Tweet 1/5: ...".to_string(), false)
            .await
            .expect("complete");
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.result.as_deref(), Some("Tweet 1/5: ..."));
        assert!(completed.updated_at >= created.updated_at);

        // The stored record reflects the terminal state
        let fetched = store
            .get_job(created.id)
            .await
            .expect("get")
            .expect("found");
        assert_eq!(fetched.status, JobStatus::Completed);
        assert_eq!(fetched.result.as_deref(), Some("Tweet 1/5: ..."));
    }

    #[tokio::test]
    async fn test_complete_job_failed() {
        let (store, _tmp) = setup_store().await;
        let created = store
            .create_job(make_new_job("some blog content"))
            .await
            .expect("create");

        let completed = store
            .complete_job(created.id, "Error: upstream refused".to_string(), true)
            .await
            .expect("complete");
        assert_eq!(completed.status, JobStatus::Failed);
        assert_eq!(completed.result.as_deref(), Some("Error: upstream refused"));
    }

    #[tokio::test]
    async fn test_complete_job_not_found() {
        let (store, _tmp) = setup_store().await;
        let result = store
            .complete_job(Uuid::now_v7(), "text".to_string(), false)
            .await;
        assert!(result.is_err());
        let err_str = result.unwrap_err().to_string();
        assert!(err_str.contains("not found"), "got: {}", err_str);
    }

    #[tokio::test]
    async fn test_complete_job_twice_rejected() {
        let (store, _tmp) = setup_store().await;
        let created = store
            .create_job(make_new_job("some blog content"))
            .await
            .expect("create");

        store
            .complete_job(created.id, "first result".to_string(), false)
            .await
            .expect("first complete");

        let second = store
            .complete_job(created.id, "second result".to_string(), true)
            .await;
        assert!(second.is_err());

        // State is unchanged by the rejected write
        let fetched = store
            .get_job(created.id)
            .await
            .expect("get")
            .expect("found");
        assert_eq!(fetched.status, JobStatus::Completed);
        assert_eq!(fetched.result.as_deref(), Some("first result"));
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_distinct_ids() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let store = std::sync::Arc::new(
            JsonJobStore::new(tmp_dir.path().to_path_buf())
                .await
                .expect("create store"),
        );

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create_job(make_new_job(&format!("post {}", i)))
                    .await
                    .expect("create")
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            let job = handle.await.expect("join");
            ids.insert(job.id);
        }
        assert_eq!(ids.len(), 10);

        let jobs = store.list_jobs().await.expect("list");
        assert_eq!(jobs.len(), 10);
    }

    #[tokio::test]
    async fn test_completion_of_one_job_does_not_affect_another() {
        let (store, _tmp) = setup_store().await;
        let a = store.create_job(make_new_job("post a")).await.expect("a");
        let b = store.create_job(make_new_job("post b")).await.expect("b");

        store
            .complete_job(a.id, "result a".to_string(), false)
            .await
            .expect("complete a");

        let b_fetched = store.get_job(b.id).await.expect("get").expect("found");
        assert_eq!(b_fetched.status, JobStatus::Pending);
        assert!(b_fetched.result.is_none());
    }

    #[tokio::test]
    async fn test_atomic_write_produces_valid_json() {
        let (store, tmp) = setup_store().await;
        store
            .create_job(make_new_job("persist me"))
            .await
            .expect("create");

        // Read the file directly and verify it's valid JSON
        let file_path = tmp.path().join("jobs.json");
        let content = tokio::fs::read_to_string(&file_path)
            .await
            .expect("read file");
        let jobs: Vec<Job> = serde_json::from_str(&content).expect("parse JSON");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].input, "persist me");
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let tmp_dir = TempDir::new().expect("create temp dir");

        // Create a store, add a job, and complete it
        let job_id = {
            let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
                .await
                .expect("create store");
            let job = store
                .create_job(make_new_job("durable post"))
                .await
                .expect("create");
            store
                .complete_job(job.id, "the thread".to_string(), false)
                .await
                .expect("complete");
            job.id
        };

        // A new store over the same directory observes the terminal state
        {
            let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
                .await
                .expect("create store");
            let job = store.get_job(job_id).await.expect("get").expect("found");
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.result.as_deref(), Some("the thread"));
        }
    }

    #[tokio::test]
    async fn test_no_tmp_file_left_after_write() {
        let (store, tmp) = setup_store().await;
        store
            .create_job(make_new_job("clean write"))
            .await
            .expect("create");

        let tmp_file = tmp.path().join("jobs.json.tmp");
        assert!(
            !tmp_file.exists(),
            "Temporary file should not remain after write"
        );
    }

    #[tokio::test]
    async fn test_corrupted_jobs_json_recovers_empty() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let jobs_file = tmp_dir.path().join("jobs.json");

        tokio::fs::write(&jobs_file, b"this is not valid JSON{{{")
            .await
            .expect("write corrupted file");

        // Should not panic -- recovers with empty list
        let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
            .await
            .expect("create store from corrupted file");

        let jobs = store.list_jobs().await.expect("list");
        assert!(
            jobs.is_empty(),
            "Should start with empty jobs after corruption"
        );
    }

    #[tokio::test]
    async fn test_corrupted_jobs_json_creates_backup() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let jobs_file = tmp_dir.path().join("jobs.json");
        let backup_file = tmp_dir.path().join("jobs.json.bak");

        let corrupted_content = b"corrupted data!!!";
        tokio::fs::write(&jobs_file, corrupted_content)
            .await
            .expect("write corrupted file");

        let _store = JsonJobStore::new(tmp_dir.path().to_path_buf())
            .await
            .expect("create store");

        assert!(backup_file.exists(), "Backup file should have been created");

        let backup_content = tokio::fs::read(&backup_file).await.expect("read backup");
        assert_eq!(
            backup_content, corrupted_content,
            "Backup should contain the original corrupted data"
        );
    }

    #[tokio::test]
    async fn test_corrupted_jobs_json_can_still_create_jobs() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let jobs_file = tmp_dir.path().join("jobs.json");

        tokio::fs::write(&jobs_file, b"not json")
            .await
            .expect("write corrupted file");

        let store = JsonJobStore::new(tmp_dir.path().to_path_buf())
            .await
            .expect("create store");

        let job = store
            .create_job(make_new_job("new after corruption"))
            .await
            .expect("create");
        assert_eq!(job.status, JobStatus::Pending);

        let jobs = store.list_jobs().await.expect("list");
        assert_eq!(jobs.len(), 1);
    }
}
