//! Config handling

use std::time::Duration;

use tracing::log::LevelFilter;

use crate::constants::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_GUIDANCE_SCALE, DEFAULT_IMAGE_MODEL,
    DEFAULT_IMAGE_SEED, DEFAULT_IMAGE_TIMEOUT, DEFAULT_INFERENCE_STEPS, DEFAULT_TEMPERATURE,
    DEFAULT_TEXT_MODEL, DEFAULT_TOP_P,
};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("reqwest", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Which text model to call and how to sample from it.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    /// Model identifier, eg `gemini-2.0-flash`.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_TEXT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// Knobs for a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// How many scenes a stage works on at once. Zero is treated as one.
    pub concurrency: usize,
    /// Limit for each text completion call, `None` waits forever.
    pub call_timeout: Option<Duration>,
}

impl PipelineConfig {
    /// Concurrency with the zero case folded into one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }
}

/// Settings for the text-to-image model.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageConfig {
    /// Replicate model reference, `owner/name`.
    pub model: String,
    /// Guidance scale.
    pub guidance_scale: f32,
    /// Number of inference steps.
    pub inference_steps: u32,
    /// Seed passed to the model.
    pub seed: u64,
    /// Give up on a prediction that has not finished after this long.
    pub poll_timeout: Duration,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_IMAGE_MODEL.to_string(),
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            inference_steps: DEFAULT_INFERENCE_STEPS,
            seed: DEFAULT_IMAGE_SEED,
            poll_timeout: DEFAULT_IMAGE_TIMEOUT,
        }
    }
}
