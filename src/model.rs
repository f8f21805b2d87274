//! The seam between the pipeline and language-model backends.

use crate::error::ModelError;
use async_trait::async_trait;
use std::fmt::Debug;

/// A chat-style model endpoint: one system instruction and one user message in,
/// the model's text reply out.
///
/// Implementations must be safe to call concurrently; the pipeline shares one
/// instance across every in-flight batch.
#[async_trait]
pub trait ChatModel: Send + Sync + Debug {
    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String, ModelError>;
}
