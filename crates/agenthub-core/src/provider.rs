use crate::HubResult;
use async_trait::async_trait;

/// A language model reduced to a single prompt-in, text-out call.
///
/// The hub never builds conversations or tool schemas; routing only needs
/// one completion per decision.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete the given prompt and return the raw model text.
    async fn complete(&self, prompt: &str) -> HubResult<String>;

    /// Human-readable provider name, used in logs.
    fn name(&self) -> &str {
        "completion"
    }
}
