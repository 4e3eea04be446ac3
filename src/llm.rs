//! Text completion through a model server.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    config::OllamaConfig,
    error::{Error, Result},
};

/// Reply used when the server answers without a `response` field.
pub const EMPTY_RESPONSE: &str = "No response from model.";

/// A text completion capability. Output carries no format guarantee.
pub trait TextCompletion {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Run a completion, turning any failure into a readable error string.
///
/// Callers treat the result as ordinary text; a failed call never aborts
/// the caller.
pub fn complete_or_describe(llm: &dyn TextCompletion, prompt: &str) -> String {
    match llm.generate(prompt) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "text completion failed");
            format!("Error using Ollama client: {e}")
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Blocking client for an Ollama server's `/api/generate` endpoint.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    host: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the server answers and lists the configured model.
    ///
    /// An unreachable server is an error. A missing model only warns, since
    /// the server may pull it on first use.
    pub fn check_reachable(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.host);
        let tags: TagsResponse = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                Error::Config(format!(
                    "model server at {} is not reachable: {e}",
                    self.host
                ))
            })?
            .json()?;

        if !tags.models.iter().any(|m| m.name == self.model) {
            tracing::warn!(
                model = %self.model,
                host = %self.host,
                "model not listed by server"
            );
        }
        Ok(())
    }
}

impl TextCompletion for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.host);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let reply: GenerateResponse = self
            .client
            .post(&url)
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(reply
            .response
            .unwrap_or_else(|| EMPTY_RESPONSE.to_string()))
    }
}
