//! Structured generation: ask for text, coerce it into a record, retry once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::completion::TextCompletion;
use crate::constants::FORMAT_INSTRUCTIONS_SLOT;
use crate::error::{CompletionError, GenerationError, GenerationFailure, Stage};
use crate::schema::{ExampleHints, ParseOutcome, Shape, format_instructions, parse_record};

/// Where a generation call sits in the pipeline, for logs and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationTarget {
    /// Stage making the call.
    pub stage: Stage,
    /// Scene number, for per-scene stages.
    pub scene: Option<u32>,
    /// Anchors for the retry example.
    pub hints: ExampleHints,
}

impl GenerationTarget {
    /// Campaign level call.
    pub fn campaign(stage: Stage, number_of_scenes: u32) -> Self {
        Self {
            stage,
            scene: None,
            hints: ExampleHints {
                scene_number: None,
                number_of_scenes: Some(number_of_scenes),
            },
        }
    }

    /// Per-scene call.
    pub fn scene(stage: Stage, scene_number: u32) -> Self {
        Self {
            stage,
            scene: Some(scene_number),
            hints: ExampleHints::scene(scene_number),
        }
    }

    fn fail(&self, failure: GenerationFailure) -> GenerationError {
        GenerationError {
            stage: self.stage,
            scene: self.scene,
            failure,
        }
    }
}

/// An instruction body split at the spot where the format instructions go.
///
/// Values interpolated into either half are never scanned for the slot, so
/// user text that happens to contain it reaches the model untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstructionBody {
    /// Text before the format instructions.
    pub head: String,
    /// Text after them; `None` appends the instructions after a blank line.
    pub tail: Option<String>,
}

impl InstructionBody {
    /// Body with the format instructions between `head` and `tail`.
    pub fn slotted(head: impl Into<String>, tail: impl Into<String>) -> Self {
        Self {
            head: head.into(),
            tail: Some(tail.into()),
        }
    }

    /// Inserts `instructions` once, at the slot.
    pub fn render(&self, instructions: &str) -> String {
        match &self.tail {
            Some(tail) => format!("{}{instructions}{tail}", self.head),
            None => format!("{}\n\n{instructions}", self.head),
        }
    }
}

impl From<&str> for InstructionBody {
    fn from(body: &str) -> Self {
        Self {
            head: body.to_string(),
            tail: None,
        }
    }
}

impl fmt::Display for InstructionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(FORMAT_INSTRUCTIONS_SLOT))
    }
}

/// Puts the shape's format instructions into the instruction body.
pub fn compose_prompt<T: Shape>(body: &InstructionBody) -> String {
    body.render(&format_instructions::<T>())
}

/// The stricter prompt sent after a response failed to parse.
pub fn reinforced_prompt<T: Shape>(prompt: &str, hints: &ExampleHints) -> String {
    let example = T::example(hints);
    let example = serde_json::to_string_pretty(&example).unwrap_or_else(|_| example.to_string());
    format!(
        "{prompt}\n\n\
Your previous response couldn't be parsed correctly. Please ensure you structure your response \
in a valid JSON format following the exact structure below:\n\n\
```json\n{example}\n```\n\n\
Provide only this JSON structure in your response, without any additional text."
    )
}

/// The single choke point every model call goes through.
///
/// Makes at most two completion calls per [`generate`](Self::generate): the
/// original prompt, then one reinforced retry if the first answer did not
/// parse. A second parse failure is returned to the caller as is.
#[derive(Debug)]
pub struct StructuredGenerator<C> {
    completion: Arc<C>,
    call_timeout: Option<Duration>,
}

impl<C> Clone for StructuredGenerator<C> {
    fn clone(&self) -> Self {
        Self {
            completion: Arc::clone(&self.completion),
            call_timeout: self.call_timeout,
        }
    }
}

impl<C: TextCompletion> StructuredGenerator<C> {
    /// Wraps a completion capability.
    pub fn new(completion: Arc<C>, call_timeout: Option<Duration>) -> Self {
        Self {
            completion,
            call_timeout,
        }
    }

    /// The wrapped completion capability.
    pub fn completion(&self) -> &C {
        &self.completion
    }

    async fn call(&self, prompt: &str) -> Result<String, GenerationFailure> {
        let pending = self.completion.complete(prompt);
        let result: Result<String, CompletionError> = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| GenerationFailure::Timeout(limit))?,
            None => pending.await,
        };
        result.map_err(GenerationFailure::from)
    }

    async fn attempt(
        &self,
        target: &GenerationTarget,
        attempt: u8,
        shape: &'static str,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        debug!(
            stage = %target.stage,
            scene = ?target.scene,
            attempt,
            shape,
            "Requesting structured output"
        );
        self.call(prompt)
            .await
            .map_err(|failure| target.fail(failure))
    }

    /// Generates one `T` from an instruction body.
    pub async fn generate<T: Shape>(
        &self,
        target: GenerationTarget,
        body: &InstructionBody,
    ) -> Result<T, GenerationError> {
        let prompt = compose_prompt::<T>(body);

        let raw = self.attempt(&target, 1, T::NAME, &prompt).await?;
        let first = match parse_record::<T>(&raw) {
            ParseOutcome::Parsed(record) => return Ok(record),
            ParseOutcome::Invalid(err) => err,
        };
        warn!(
            stage = %target.stage,
            scene = ?target.scene,
            "Response did not parse, retrying with example: {}",
            first
        );

        let retry = reinforced_prompt::<T>(&prompt, &target.hints);
        let raw = self.attempt(&target, 2, T::NAME, &retry).await?;
        match parse_record::<T>(&raw) {
            ParseOutcome::Parsed(record) => Ok(record),
            ParseOutcome::Invalid(second) => Err(target.fail(GenerationFailure::InvalidOutput {
                first,
                second,
            })),
        }
    }
}
