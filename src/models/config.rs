use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Upstream generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_base_url")]
    pub base_url: String,
    #[serde(default = "default_generator_model")]
    pub model: String,
    /// Falls back to the REPOTHREAD_API_KEY environment variable when unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_generator_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_generator_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_generator_base_url(),
            model: default_generator_model(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// CORS allow-list; the single entry "*" allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Deadline for one generation run. 0 disables the deadline.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://repothread.vercel.app".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_generation_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: None,
            allowed_origins: default_allowed_origins(),
            generation_timeout_secs: default_generation_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
            generator: GeneratorConfig::default(),
        }
    }
}
