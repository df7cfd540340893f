//! Backend capability traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, Classification, Completion};

/// A language-model backend.
///
/// Implementations own their wire protocol, retries and timeouts; callers
/// see one `complete` per request and get the error back unchanged.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Turn an ordered conversation into response text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion>;

    /// Condense `text` following `instruction`.
    async fn summarize(&self, text: &str, instruction: &str) -> Result<Completion>;
}

/// External query-complexity classifier consulted by the complexity router.
#[async_trait]
pub trait ComplexityClassifier: Send + Sync {
    /// Map a query to an ordinal complexity level.
    async fn classify(&self, text: &str) -> Result<Classification>;
}
