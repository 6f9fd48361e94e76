//! The inference capability speakers and the moderator call into.
//!
//! The core only depends on the [`Inference`] trait. [`OpenAiInference`]
//! implements it against any OpenAI-compatible chat completions endpoint
//! (OpenAI, Ollama, vLLM, ...).

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DebateError, InferenceError};
use crate::structured::{self, StructuredOutput};

/// Expected shape of a structured response.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    pub fn of<T: StructuredOutput>() -> Self {
        Self {
            name: T::output_name(),
            schema: T::output_schema(),
        }
    }
}

/// One request to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    /// Role and rules for the model.
    pub system: String,
    /// The turn-specific input.
    pub prompt: String,
    /// Overrides the backend's default model.
    pub model: Option<String>,
    /// Set for structured requests; `None` asks for free text.
    pub schema: Option<OutputSchema>,
    /// Response length hint.
    pub max_tokens: Option<u32>,
}

impl InferenceRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            model: None,
            schema: None,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Name of the requested output shape, if any.
    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_ref().map(|s| s.name.as_str())
    }
}

/// Request/response access to a language model.
///
/// Implementations return the raw text of the reply. An empty or otherwise
/// unusable reply is [`InferenceError::Malformed`]; anything that prevented a
/// reply is [`InferenceError::Unavailable`].
#[async_trait]
pub trait Inference: Send + Sync {
    async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceError>;
}

/// Ask for a `T` and decode the reply.
pub async fn infer_structured<T: StructuredOutput>(
    inference: &dyn Inference,
    mut request: InferenceRequest,
) -> Result<T, InferenceError> {
    request.schema = Some(OutputSchema::of::<T>());
    let raw = inference.complete(request).await?;
    structured::decode(&raw)
}

/// [`Inference`] over an OpenAI-compatible chat completions API.
pub struct OpenAiInference {
    client: Client<OpenAIConfig>,
    default_model: String,
}

impl OpenAiInference {
    pub fn new(
        api_base: &str,
        api_key: &str,
        default_model: impl Into<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, DebateError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                DebateError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            default_model: default_model.into(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// User message text, with the JSON format instruction appended for
/// structured requests.
fn user_content(request: &InferenceRequest) -> String {
    match &request.schema {
        Some(schema) => format!(
            "{}\n\nRespond ONLY with a JSON object matching this schema:\n{}",
            request.prompt, schema.schema
        ),
        None => request.prompt.clone(),
    }
}

#[async_trait]
impl Inference for OpenAiInference {
    async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: request.system.clone().into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: user_content(&request).into(),
                name: None,
            }),
        ];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&model).messages(messages);
        if let Some(max_tokens) = request.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        let chat_request = args
            .build()
            .map_err(|e| InferenceError::Unavailable(format!("Invalid request: {}", e)))?;

        tracing::debug!(
            model = %model,
            schema = request.schema_name().unwrap_or("text"),
            "sending chat completion"
        );

        let response = self.client.chat().create(chat_request).await?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(InferenceError::Malformed(format!(
                "empty response from model '{}'",
                model
            )));
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Reply {
        argument: String,
    }

    struct Canned {
        reply: Result<String, InferenceError>,
        seen: Mutex<Vec<InferenceRequest>>,
    }

    #[async_trait]
    impl Inference for Canned {
        async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn test_infer_structured_attaches_schema_and_decodes() {
        let canned = Canned {
            reply: Ok(r#"{"argument": "All is will."}"#.to_string()),
            seen: Mutex::new(Vec::new()),
        };

        let reply: Reply = infer_structured(&canned, InferenceRequest::new("sys", "go"))
            .await
            .unwrap();
        assert_eq!(reply.argument, "All is will.");

        let seen = canned.seen.lock().unwrap();
        assert_eq!(seen[0].schema_name(), Some("Reply"));
    }

    #[tokio::test]
    async fn test_infer_structured_reports_malformed() {
        let canned = Canned {
            reply: Ok("not json at all".to_string()),
            seen: Mutex::new(Vec::new()),
        };

        let err = infer_structured::<Reply>(&canned, InferenceRequest::new("sys", "go"))
            .await
            .unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_infer_structured_passes_through_unavailable() {
        let canned = Canned {
            reply: Err(InferenceError::Unavailable("connection refused".into())),
            seen: Mutex::new(Vec::new()),
        };

        let err = infer_structured::<Reply>(&canned, InferenceRequest::new("sys", "go"))
            .await
            .unwrap_err();
        assert_eq!(err, InferenceError::Unavailable("connection refused".into()));
    }

    #[test]
    fn test_user_content_appends_schema_only_when_structured() {
        let plain = InferenceRequest::new("sys", "Introduce the panel.");
        assert_eq!(user_content(&plain), "Introduce the panel.");

        let mut structured = InferenceRequest::new("sys", "Argue.");
        structured.schema = Some(OutputSchema::of::<Reply>());
        let content = user_content(&structured);
        assert!(content.starts_with("Argue."));
        assert!(content.contains("\"argument\""));
    }

    #[test]
    fn test_client_construction() {
        let client = OpenAiInference::new(
            "http://localhost:11434/v1",
            "",
            "gpt-oss",
            Duration::from_secs(120),
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(client.default_model(), "gpt-oss");
    }
}
