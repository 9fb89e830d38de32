use async_trait::async_trait;

use crate::document::Document;
use crate::error::SessionError;

/// Question sent with a freshly uploaded document to ask the service to describe it.
pub const BOOTSTRAP_QUESTION: &str = "start";

/// The remote question-answering service.
///
/// The service keeps no state between calls, so every call carries the whole
/// document along with the question.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Ask `question` about `document` and return the raw answer text.
    async fn chat(&self, document: &Document, question: &str) -> Result<String, SessionError>;
}
