//! The text completion capability the pipeline is built on.

use std::future::Future;
use std::sync::Arc;

use crate::error::CompletionError;

mod gemini;

pub use gemini::GeminiClient;

/// Something that turns a prompt into raw model text.
///
/// No promise is made about the structure of the returned text; callers go
/// through [`crate::structured::StructuredGenerator`] to get records out.
pub trait TextCompletion: Send + Sync {
    /// Sends `prompt` and returns the full response text.
    fn complete(&self, prompt: &str)
    -> impl Future<Output = Result<String, CompletionError>> + Send;
}

impl<C: TextCompletion> TextCompletion for Arc<C> {
    fn complete(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send {
        self.as_ref().complete(prompt)
    }
}
