//! GenerativeService port - the external generative model.
//!
//! The port deals in raw text on purpose: unwrapping the JSON payload and
//! parsing it into domain types belongs to the pipeline, so every adapter
//! gets the same failure policy.

use async_trait::async_trait;

use crate::domain::PipelineError;
use crate::pipeline::CallContext;

/// Inline binary input sent alongside the prompt.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Run the request and return the concatenated text of the response.
    async fn generate(
        &self,
        request: GenerationRequest,
        ctx: &CallContext,
    ) -> Result<String, PipelineError>;
}
