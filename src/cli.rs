//! CLI parser
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{ImageConfig, ModelConfig, PipelineConfig};
use crate::constants::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_IMAGE_MODEL, DEFAULT_TEMPERATURE,
    DEFAULT_TEXT_MODEL, DEFAULT_TOP_P, OUTPUT_DIR,
};

#[derive(Parser, Debug)]
#[command(name = "adboard")]
/// Generate an advertisement storyboard from a campaign request.
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "ADBOARD_DEBUG")]
    /// Enable debug logging. Env: ADBOARD_DEBUG
    pub debug: bool,

    /// Path to the campaign request, a JSON file.
    pub request: PathBuf,

    #[clap(long, short, default_value_os_t = OUTPUT_DIR.to_path_buf(), env = "ADBOARD_OUT_DIR")]
    /// Where run directories are created, defaults to `./storyboards`.
    /// Env: ADBOARD_OUT_DIR
    pub out_dir: PathBuf,

    #[arg(required = true, long, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// Gemini API key
    pub gemini_api_key: String,

    #[arg(long, default_value = DEFAULT_TEXT_MODEL, env = "ADBOARD_TEXT_MODEL")]
    /// Text model used for every generation stage
    pub text_model: String,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    /// Sampling temperature
    pub temperature: f32,

    #[arg(long, default_value_t = DEFAULT_TOP_P)]
    /// Nucleus sampling cutoff
    pub top_p: f32,

    #[arg(long, short, default_value_t = DEFAULT_CONCURRENCY, env = "ADBOARD_CONCURRENCY")]
    /// Scenes processed at once within a stage. Env: ADBOARD_CONCURRENCY
    pub concurrency: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_CALL_TIMEOUT.as_secs(),
        env = "ADBOARD_TIMEOUT_SECS"
    )]
    /// Per-call timeout in seconds, 0 disables it. Env: ADBOARD_TIMEOUT_SECS
    pub timeout_secs: u64,

    #[arg(long, env = "ADBOARD_DEBUG_DIR")]
    /// If set, raw model responses are written here
    pub debug_dir: Option<PathBuf>,

    #[arg(long)]
    /// Also render each scene's still image
    pub images: bool,

    #[arg(long, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    /// Replicate API token, needed with `--images`
    pub replicate_api_token: Option<String>,

    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    /// Image model on Replicate
    pub image_model: String,
}

impl CliOptions {
    /// Text model settings.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model: self.text_model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }

    /// Pipeline settings.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            concurrency: self.concurrency,
            call_timeout: match self.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    /// Image model settings.
    pub fn image_config(&self) -> ImageConfig {
        ImageConfig {
            model: self.image_model.clone(),
            ..ImageConfig::default()
        }
    }
}
