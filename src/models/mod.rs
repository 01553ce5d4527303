pub mod config;
pub mod job;

pub use config::{GeneratorConfig, ServerConfig};
pub use job::{GenerationParams, Job, JobKind, JobStatus, NewJob};
