//! Shared constants/defaults for things
//!

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// The default place we put storyboard runs
pub static OUTPUT_DIR: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("./storyboards"));

/// Text model used when nothing else is configured.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";

/// Sampling temperature for the text model.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Nucleus sampling (top-p) for the text model.
pub const DEFAULT_TOP_P: f32 = 0.95;

/// Base URL of the Gemini REST API.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Number of scenes worked on at the same time within a stage.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Upper bound on a single text completion call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Style type every image and video prompt must carry.
pub const STYLE_TYPE: &str = "Photorealistic CGI";

/// Style reference used unless the scene calls for another one.
pub const STYLE_REFERENCE: &str = "Gregory Crewdson";

/// Sentinel shown to the model for fields the user left empty.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Market used when no country was given.
pub const DEFAULT_COUNTRY: &str = "International";

/// Slot in an instruction body where the shape's format instructions go.
pub const FORMAT_INSTRUCTIONS_SLOT: &str = "{format_instructions}";

/// Base URL of the Replicate API.
pub const REPLICATE_API_BASE: &str = "https://api.replicate.com/v1/";

/// Image model run on Replicate.
pub const DEFAULT_IMAGE_MODEL: &str = "black-forest-labs/flux-dev";

/// Classifier-free guidance for the image model.
pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;

/// Denoising steps for the image model.
pub const DEFAULT_INFERENCE_STEPS: u32 = 30;

/// How long a single image prediction may stay queued or running.
pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Fixed seed so reruns of a storyboard give the same frames.
pub const DEFAULT_IMAGE_SEED: u64 = 42;
