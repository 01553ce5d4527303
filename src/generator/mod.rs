use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::RepoThreadError;
use crate::models::{GenerationParams, GeneratorConfig, JobKind};

/// Black-box text generation backend. Latency is unbounded; callers are
/// responsible for applying a deadline.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        kind: JobKind,
        input: &str,
        params: &GenerationParams,
    ) -> Result<String>;
}

/// One role step in a generation pipeline. The output of a step becomes the
/// working material of the next.
#[derive(Debug, Clone)]
pub struct Step {
    pub role: &'static str,
    pub persona: &'static str,
    pub instruction: String,
}

/// Build the ordered role steps for a job kind.
pub fn steps_for(kind: JobKind, input: &str, params: &GenerationParams) -> Vec<Step> {
    match kind {
        JobKind::RepoToBlog => vec![
            Step {
                role: "Repository Analyst",
                persona: "Expert in code analysis and repository breakdowns.",
                instruction: format!(
                    "Analyze the repository at {} to extract its structure, key features, and purpose. \
                     Include project overview, technical implementation, setup instructions, and usage examples.",
                    input.trim()
                ),
            },
            Step {
                role: "Tutorial Writer",
                persona: "Technical writer skilled at simplifying complex concepts.",
                instruction: "Transform the repository analysis below into a structured, step-by-step \
                              tutorial that maintains technical accuracy."
                    .to_string(),
            },
            Step {
                role: "SEO Specialist",
                persona: "SEO expert focused on enhancing readability without sacrificing technical accuracy.",
                instruction: "Optimize the tutorial below for search engines (titles, headings, structure) \
                              without changing its technical focus."
                    .to_string(),
            },
            Step {
                role: "Blog Post Creator",
                persona: "Creative writer with experience in blog formatting without losing technical details.",
                instruction: "Adapt the optimized tutorial below into an engaging blog post focused on the \
                              repository's purpose and features."
                    .to_string(),
            },
        ],
        JobKind::BlogToThread => {
            let num_tweets = params.num_tweets_or_default();
            vec![
                Step {
                    role: "Content Analyst",
                    persona: "An experienced content strategist who excels at identifying core ideas \
                              from long-form content.",
                    instruction: format!(
                        "Analyze the following blog post and break it into key sections with main ideas. \
                         The final thread should be approximately {} tweets long.\n\nBLOG CONTENT:\n{}",
                        num_tweets, input
                    ),
                },
                Step {
                    role: "Thread Writer",
                    persona: "A creative writer who specializes in crafting Twitter threads that \
                              capture attention.",
                    instruction: format!(
                        "Using the analysis below, create a Twitter thread of approximately {} tweets. \
                         Write each tweet clearly and concisely, keeping the thread engaging without hashtags.",
                        num_tweets
                    ),
                },
                Step {
                    role: "Editor",
                    persona: "A meticulous editor with a sharp eye for detail, dedicated to improving \
                              readability and flow.",
                    instruction: format!(
                        "Review the drafted tweets below and ensure they accurately reflect the original \
                         blog content. The thread should be approximately {} tweets long. Refine structure, \
                         language, and transitions while maintaining the original message.",
                        num_tweets
                    ),
                },
            ]
        }
    }
}

/// Strip markdown code-fence markers the upstream sometimes wraps output in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```markdown", "").replace("```", "").trim().to_string()
}

// ---------------------------------------------------------------------------
// HTTP generator: OpenAI-style chat-completion upstream
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct HttpGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl HttpGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn api_key(&self) -> Option<String> {
        self.config
            .api_key
            .clone()
            .or_else(|| std::env::var("REPOTHREAD_API_KEY").ok())
    }

    /// Run a single role step against the upstream chat endpoint.
    async fn run_step(&self, step: &Step, prior: Option<&str>) -> Result<String> {
        let content = match prior {
            Some(material) => format!("{}\n\n{}", step.instruction, material),
            None => step.instruction.clone(),
        };

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: step.persona.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content,
                },
            ],
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = self.api_key() {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(RepoThreadError::from)
            .with_context(|| format!("Request to generation backend failed ({})", step.role))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RepoThreadError::Generation(format!(
                "Generation backend returned {} for step '{}': {}",
                status, step.role, body
            ))
            .into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(RepoThreadError::from)
            .context("Failed to parse generation backend response")?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                RepoThreadError::Generation(format!(
                    "Generation backend returned no choices for step '{}'",
                    step.role
                ))
            })?;

        Ok(text)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        kind: JobKind,
        input: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        let steps = steps_for(kind, input, params);

        let mut material: Option<String> = None;
        for step in &steps {
            tracing::debug!("Running generation step: {}", step.role);
            let output = self.run_step(step, material.as_deref()).await?;
            material = Some(output);
        }

        let text = material.ok_or_else(|| {
            RepoThreadError::Generation("Generation pipeline produced no steps".to_string())
        })?;

        Ok(strip_code_fences(&text))
    }
}
