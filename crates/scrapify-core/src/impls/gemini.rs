//! GeminiClient - GenerativeService over the Gemini `generateContent` REST API.
//!
//! Attachments are sent inline (base64). The adapter returns the
//! concatenated text parts of every candidate and leaves JSON extraction to
//! the pipeline.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::PipelineError;
use crate::pipeline::CallContext;
use crate::ports::{GenerationRequest, GenerativeService};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// キーはヘッダで送る。URL は reqwest のエラー文字列に出る
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at another endpoint (proxy, local mock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    fn request(&self, model: &str, body: &GenerateContentRequest) -> reqwest::RequestBuilder {
        self.http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
    }

    async fn call(&self, request: GenerationRequest) -> Result<String, PipelineError> {
        let body = build_body(&request);
        debug!(
            model = %request.model,
            attachments = request.attachments.len(),
            "calling generative service"
        );

        let response = self
            .request(&request.model, &body)
            .send()
            .await
            .map_err(|e| {
                PipelineError::ExternalService(format!("request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::ExternalService(format!(
                "{} returned {status}: {text}",
                request.model
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| {
                PipelineError::ExternalService(format!("unreadable response: {}", e.without_url()))
            })?;
        collect_text(parsed)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerativeService for GeminiClient {
    async fn generate(
        &self,
        request: GenerationRequest,
        ctx: &CallContext,
    ) -> Result<String, PipelineError> {
        ctx.run("generative call", self.call(request)).await
    }
}

fn build_body(request: &GenerationRequest) -> GenerateContentRequest {
    let engine = base64::engine::general_purpose::STANDARD;
    let mut parts = vec![Part::Text {
        text: request.prompt.clone(),
    }];
    parts.extend(request.attachments.iter().map(|a| Part::Inline {
        inline_data: InlineData {
            mime_type: a.mime_type.clone(),
            data: engine.encode(&a.data),
        },
    }));
    GenerateContentRequest {
        contents: vec![Content { parts }],
    }
}

fn collect_text(response: GenerateContentResponse) -> Result<String, PipelineError> {
    let text: String = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| match p {
            Part::Text { text } => Some(text),
            Part::Inline { .. } => None,
        })
        .collect();
    if text.trim().is_empty() {
        return Err(PipelineError::ExternalService(
            "response contained no text".into(),
        ));
    }
    Ok(text)
}
