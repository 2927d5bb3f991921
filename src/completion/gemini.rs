//! Gemini `generateContent` client.
//!
//! Docs: https://ai.google.dev/api/generate-content

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::TextCompletion;
use crate::config::ModelConfig;
use crate::constants::GEMINI_API_BASE;
use crate::error::CompletionError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Pulls the text out of the first candidate.
fn response_text(response: GenerateContentResponse) -> Result<String, CompletionError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(CompletionError::Blocked(reason));
    }
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(CompletionError::Empty)?;
    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return match candidate.finish_reason {
            Some(reason) if reason != "STOP" => Err(CompletionError::Blocked(reason)),
            _ => Err(CompletionError::Empty),
        };
    }
    Ok(text)
}

async fn write_api_response(dir: &Path, bytes: &[u8]) -> Result<PathBuf, CompletionError> {
    static API_RESPONSE_SEQ: AtomicUsize = AtomicUsize::new(0);
    let seq = API_RESPONSE_SEQ.fetch_add(1, Ordering::Relaxed);
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let path = dir.join(format!("debug_generate_content_{ts}_{seq}.json"));
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Text completion backed by the Gemini REST API.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: Url,
    config: ModelConfig,
    debug_dir: Option<PathBuf>,
}

impl GeminiClient {
    /// Creates a client for the public Gemini endpoint.
    pub fn new(api_key: impl Into<String>, config: ModelConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: Url::parse(GEMINI_API_BASE)?,
            config,
            debug_dir: None,
        })
    }

    /// Points the client at another API root, eg a proxy.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Saves every raw API response into `dir`.
    pub fn with_debug_dir(mut self, dir: PathBuf) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    /// Model configuration in use.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn endpoint(&self) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&format!("models/{}:generateContent", self.config.model))
    }
}

impl TextCompletion for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let endpoint = self
            .endpoint()
            .map_err(|err| CompletionError::Other(format!("invalid endpoint: {err}")))?;
        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
            },
        };

        debug!(model = %self.config.model, prompt_len = prompt.len(), "Calling generateContent");
        let resp = self
            .client
            .post(endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;

        if let Some(dir) = &self.debug_dir {
            let path = write_api_response(dir, &bytes).await?;
            debug!("generateContent response saved to {}", path.display());
        }

        if !status.is_success() {
            warn!(status = status.as_u16(), "generateContent returned an error");
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes)?;
        response_text(parsed)
    }
}
