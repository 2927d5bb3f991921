//! Error handling

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Pipeline stage a model call belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Filling in the campaign level details.
    AdDetails,
    /// Expanding one scene.
    SceneExpansion,
    /// Deriving the still image prompt of a scene.
    TextToImage,
    /// Deriving the video prompt of a scene.
    ImageToVideo,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AdDetails => "ad details",
            Self::SceneExpansion => "scene expansion",
            Self::TextToImage => "text-to-image prompt",
            Self::ImageToVideo => "image-to-video prompt",
        };
        f.write_str(name)
    }
}

/// Raw model text did not conform to a shape.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("response did not match {shape}: {reason}")]
pub struct ParseError {
    /// Name of the target shape.
    pub shape: &'static str,
    /// What went wrong.
    pub reason: String,
}

impl ParseError {
    /// Creates a new parse error for `shape`.
    pub fn new(shape: &'static str, reason: impl Into<String>) -> Self {
        Self {
            shape,
            reason: reason.into(),
        }
    }
}

/// Failures of the text completion capability itself.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The request never got a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// The response body was not what the API documents.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// The model refused the prompt.
    #[error("prompt blocked: {0}")]
    Blocked(String),
    /// No text came back.
    #[error("response contained no text")]
    Empty,
    /// Writing the debug copy of a response failed.
    #[error("failed to write debug response: {0}")]
    Debug(#[from] std::io::Error),
    /// Anything a custom completion backend wants to report.
    #[error("{0}")]
    Other(String),
}

/// Why a stage could not produce its record.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    /// Both attempts returned text that did not parse.
    #[error("{second} (first attempt: {first})")]
    InvalidOutput {
        /// Parse failure of the first response.
        first: ParseError,
        /// Parse failure of the reinforced retry.
        second: ParseError,
    },
    /// The completion capability failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// A completion call ran past the configured limit.
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
}

/// A stage could not produce its record.
#[derive(Debug, Error)]
pub struct GenerationError {
    /// Which stage failed.
    pub stage: Stage,
    /// Scene number, for per-scene stages.
    pub scene: Option<u32>,
    /// Underlying failure.
    #[source]
    pub failure: GenerationFailure,
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scene {
            Some(scene) => write!(
                f,
                "{} generation failed for scene {}: {}",
                self.stage, scene, self.failure
            ),
            None => write!(f, "{} generation failed: {}", self.stage, self.failure),
        }
    }
}

/// Errors surfaced by a storyboard run.
#[derive(Debug, Error)]
pub enum StoryboardError {
    /// The campaign request is inconsistent.
    #[error("invalid campaign request: {0}")]
    InvalidRequest(String),
    /// A generation stage failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Scene and image prompt lists do not line up.
    #[error("{scenes} scenes but {prompts} text-to-image prompts")]
    MisalignedPrompts {
        /// Number of scene outputs.
        scenes: usize,
        /// Number of image prompts.
        prompts: usize,
    },
}

impl StoryboardError {
    /// Creates an InvalidRequest error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

/// Errors from the image generation collaborator.
#[derive(Debug, Error)]
pub enum ImageError {
    /// HTTP failure talking to the image API.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The image API answered with a non-success status.
    #[error("image API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// The prediction finished without an image.
    #[error("prediction {id} ended with status {status}")]
    Prediction {
        /// Prediction ID.
        id: String,
        /// Final status.
        status: String,
    },
    /// The prediction was still pending when the wait ran out.
    #[error("prediction {id} still pending after {after:?}")]
    Timeout {
        /// Prediction ID.
        id: String,
        /// How long we waited.
        after: Duration,
    },
    /// Output did not contain a usable URL.
    #[error("prediction output has no image URL")]
    MissingOutput,
    /// Bad URL in the API response.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    /// Downloaded bytes are not an image.
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    /// The API response body could not be parsed.
    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),
    /// Filesystem failure writing the image.
    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_names_stage_and_scene() {
        let err = GenerationError {
            stage: Stage::TextToImage,
            scene: Some(3),
            failure: GenerationFailure::InvalidOutput {
                first: ParseError::new("TextToImagePrompt", "no JSON object found"),
                second: ParseError::new("TextToImagePrompt", "missing field `action`"),
            },
        };
        let message = err.to_string();
        assert!(message.starts_with("text-to-image prompt generation failed for scene 3"));
        assert!(message.contains("missing field `action`"));
        assert!(message.contains("no JSON object found"));
    }

    #[test]
    fn ad_details_error_has_no_scene() {
        let err = GenerationError {
            stage: Stage::AdDetails,
            scene: None,
            failure: GenerationFailure::Timeout(Duration::from_secs(5)),
        };
        assert_eq!(
            err.to_string(),
            "ad details generation failed: completion timed out after 5s"
        );
    }
}
