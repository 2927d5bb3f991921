//! Renders scene images from the text-to-image prompts via Replicate.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::ImageConfig;
use crate::constants::REPLICATE_API_BASE;
use crate::error::ImageError;
use crate::format::ScenePrompt;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    guidance_scale: f32,
    num_inference_steps: u32,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

impl Prediction {
    fn is_pending(&self) -> bool {
        matches!(self.status.as_str(), "starting" | "processing")
    }
}

/// Picks the image URL out of a prediction's output.
///
/// Models return either a list of URLs or a single one.
fn output_url(output: &Value) -> Option<&str> {
    match output {
        Value::String(url) => Some(url),
        Value::Array(items) => items.iter().find_map(output_url),
        Value::Object(fields) => fields.get("url").and_then(Value::as_str),
        _ => None,
    }
}

/// Polls a pending prediction until it settles or `limit` runs out.
async fn settle<F, Fut>(
    prediction: Prediction,
    limit: Duration,
    mut refresh: F,
) -> Result<Prediction, ImageError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Prediction, ImageError>>,
{
    let id = prediction.id.clone();
    let waiting = async move {
        let mut prediction = prediction;
        while prediction.is_pending() {
            let Some(urls) = &prediction.urls else {
                break;
            };
            let next = urls.get.clone();
            debug!(id = %prediction.id, status = %prediction.status, "Waiting for prediction");
            tokio::time::sleep(POLL_INTERVAL).await;
            prediction = refresh(next).await?;
        }
        Ok(prediction)
    };
    tokio::time::timeout(limit, waiting)
        .await
        .map_err(|_| ImageError::Timeout { id, after: limit })?
}

/// Client for the text-to-image collaborator.
#[derive(Clone, Debug)]
pub struct ImageGenerator {
    client: reqwest::Client,
    api_token: String,
    base_url: Url,
    config: ImageConfig,
}

impl ImageGenerator {
    /// Creates a client for the public Replicate API.
    pub fn new(api_token: impl Into<String>, config: ImageConfig) -> Result<Self, ImageError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_token: api_token.into(),
            base_url: Url::parse(REPLICATE_API_BASE)?,
            config,
        })
    }

    async fn read_prediction(&self, resp: reqwest::Response) -> Result<Prediction, ImageError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ImageError::Api {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn fetch_prediction(&self, url: String) -> Result<Prediction, ImageError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        self.read_prediction(resp).await
    }

    async fn run_prediction(&self, prompt: &str) -> Result<String, ImageError> {
        let endpoint = self
            .base_url
            .join(&format!("models/{}/predictions", self.config.model))?;
        let body = PredictionRequest {
            input: PredictionInput {
                prompt,
                guidance_scale: self.config.guidance_scale,
                num_inference_steps: self.config.inference_steps,
                seed: self.config.seed,
            },
        };

        let resp = self
            .client
            .post(endpoint)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        let prediction = self.read_prediction(resp).await?;
        let prediction = settle(prediction, self.config.poll_timeout, |url| {
            self.fetch_prediction(url)
        })
        .await?;

        if prediction.status != "succeeded" {
            return Err(ImageError::Prediction {
                id: prediction.id,
                status: prediction.status,
            });
        }
        prediction
            .output
            .as_ref()
            .and_then(output_url)
            .map(str::to_string)
            .ok_or(ImageError::MissingOutput)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ImageError::Api {
                status: status.as_u16(),
                body: format!("image download from {url} failed"),
            });
        }
        Ok(bytes.to_vec())
    }

    /// Renders one prompt and writes it as PNG to `path`.
    pub async fn render_to(&self, prompt: &str, path: &Path) -> Result<(), ImageError> {
        let url = self.run_prediction(prompt).await?;
        let bytes = self.download(&url).await?;
        save_png(&bytes, path)
    }

    /// Renders every scene prompt into `out_dir/scene_<n>.png`, in order.
    pub async fn render_scenes(
        &self,
        prompts: &[ScenePrompt],
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ImageError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let mut written = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            info!(scene = prompt.scene_number, "Generating image");
            let path = out_dir.join(format!("scene_{}.png", prompt.scene_number));
            self.render_to(&prompt.prompt, &path).await?;
            info!(scene = prompt.scene_number, "Saved {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// Decodes whatever format the model returned and stores it as PNG.
pub fn save_png(bytes: &[u8], path: &Path) -> Result<(), ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    decoded.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
