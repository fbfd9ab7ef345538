//! LLM provider abstraction: a unified interface over Ollama and
//! OpenAI-compatible chat completion, shaped for the classify-style
//! calls query understanding and fit evaluation need.

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Chat message for multi-turn conversations.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// An LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn with_system(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

/// Trait for LLM providers. Implementations must be cheap to clone into
/// an `Arc` since the same provider backs every task in a single
/// request's query-understanding fan-out and the V6 fit evaluator.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse>;
}

pub mod ollama {
    use super::*;
    use ollama_rs::generation::chat::request::ChatMessageRequest;
    use ollama_rs::generation::chat::ChatMessage as OllamaMessage;
    use ollama_rs::generation::chat::MessageRole;
    use ollama_rs::generation::options::GenerationOptions;
    use ollama_rs::Ollama;

    pub struct OllamaProvider {
        client: Ollama,
        model: String,
    }

    impl OllamaProvider {
        pub fn new(host: &str, model: &str) -> Result<Self> {
            let url = url::Url::parse(host).with_context(|| format!("invalid Ollama host URL: {host}"))?;
            let host_str = url.host_str().unwrap_or("localhost");
            let port = url.port().unwrap_or(11434);
            Ok(Self {
                client: Ollama::new(format!("http://{host_str}"), port),
                model: model.to_string(),
            })
        }
    }

    fn role_of(role: &str) -> MessageRole {
        match role {
            "system" => MessageRole::System,
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }

    #[async_trait]
    impl LlmProvider for OllamaProvider {
        fn name(&self) -> &str {
            "ollama"
        }

        fn model(&self) -> &str {
            &self.model
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse> {
            let messages: Vec<OllamaMessage> =
                request.messages.iter().map(|m| OllamaMessage::new(role_of(&m.role), m.content.clone())).collect();

            let mut chat_request = ChatMessageRequest::new(self.model.clone(), messages);
            if let Some(temp) = request.temperature {
                chat_request = chat_request.options(GenerationOptions::default().temperature(temp as f64));
            }

            let response = self.client.send_chat_messages(chat_request).await.context("Ollama chat request failed")?;
            let content = response.message.map(|m| m.content).unwrap_or_default();

            Ok(LlmResponse {
                content,
                model: self.model.clone(),
                usage: None,
                finish_reason: Some("stop".to_string()),
            })
        }
    }
}

pub mod openai {
    use super::*;
    use async_openai::config::OpenAIConfig;
    use async_openai::types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
    };
    use async_openai::Client;

    pub struct OpenAIProvider {
        client: Client<OpenAIConfig>,
        model: String,
    }

    impl OpenAIProvider {
        pub fn new(model: &str) -> Self {
            Self { client: Client::new(), model: model.to_string() }
        }

        pub fn with_api_key(api_key: &str, model: &str) -> Self {
            let config = OpenAIConfig::new().with_api_key(api_key);
            Self { client: Client::with_config(config), model: model.to_string() }
        }

        pub fn with_base_url(api_key: &str, base_url: &str, model: &str) -> Self {
            let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(base_url);
            Self { client: Client::with_config(config), model: model.to_string() }
        }
    }

    fn to_request_message(m: &ChatMessage) -> ChatCompletionRequestMessage {
        match m.role.as_str() {
            "system" => ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: async_openai::types::ChatCompletionRequestSystemMessageContent::Text(m.content.clone()),
                name: None,
            }),
            "assistant" => ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(async_openai::types::ChatCompletionRequestAssistantMessageContent::Text(m.content.clone())),
                name: None,
                tool_calls: None,
                refusal: None,
                audio: None,
            }),
            _ => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(m.content.clone()),
                name: None,
            }),
        }
    }

    #[async_trait]
    impl LlmProvider for OpenAIProvider {
        fn name(&self) -> &str {
            "openai"
        }

        fn model(&self) -> &str {
            &self.model
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse> {
            let messages: Vec<ChatCompletionRequestMessage> = request.messages.iter().map(to_request_message).collect();

            let mut builder = CreateChatCompletionRequestArgs::default();
            builder.model(&self.model).messages(messages);
            if let Some(temp) = request.temperature {
                builder.temperature(temp);
            }
            if let Some(max) = request.max_tokens {
                builder.max_completion_tokens(max);
            }

            let req = builder.build()?;
            let response = self.client.chat().create(req).await?;
            let choice = response.choices.first().context("no completion choices returned")?;
            let content = choice.message.content.clone().unwrap_or_default();

            let usage = response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

            Ok(LlmResponse {
                content,
                model: response.model,
                usage,
                finish_reason: choice.finish_reason.as_ref().map(|r| format!("{r:?}")),
            })
        }
    }
}

/// Which provider backend to construct (§6 `RANKER_LLM_PROVIDER`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown LLM provider: {other}")),
        }
    }
}

use std::sync::Arc;

/// Builds a provider from environment configuration (§6): `RANKER_LLM_PROVIDER`,
/// `RANKER_OLLAMA_HOST`/`RANKER_OLLAMA_MODEL`, `RANKER_OPENAI_API_KEY`/
/// `RANKER_OPENAI_MODEL`/`RANKER_OPENAI_BASE_URL`.
pub fn create_llm_provider_from_env() -> Result<Arc<dyn LlmProvider>> {
    let kind: ProviderKind = std::env::var("RANKER_LLM_PROVIDER")
        .unwrap_or_else(|_| "ollama".to_string())
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    match kind {
        ProviderKind::Ollama => {
            let host = std::env::var("RANKER_OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
            let model = std::env::var("RANKER_OLLAMA_MODEL").unwrap_or_else(|_| "llama3".to_string());
            Ok(Arc::new(ollama::OllamaProvider::new(&host, &model)?))
        }
        ProviderKind::OpenAi => {
            let model = std::env::var("RANKER_OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            let provider = match (std::env::var("RANKER_OPENAI_API_KEY"), std::env::var("RANKER_OPENAI_BASE_URL")) {
                (Ok(key), Ok(base)) => openai::OpenAIProvider::with_base_url(&key, &base, &model),
                (Ok(key), Err(_)) => openai::OpenAIProvider::with_api_key(&key, &model),
                (Err(_), _) => openai::OpenAIProvider::new(&model),
            };
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_request_with_system_has_two_messages() {
        let req = CompletionRequest::with_system("sys", "user").temperature(0.7).max_tokens(500);
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.temperature, Some(0.7));
        assert_eq!(req.max_tokens, Some(500));
    }

    #[test]
    fn temperature_clamps_to_valid_range() {
        let req = CompletionRequest::with_system("s", "u").temperature(5.0);
        assert_eq!(req.temperature, Some(2.0));
        let req = CompletionRequest::with_system("s", "u").temperature(-1.0);
        assert_eq!(req.temperature, Some(0.0));
    }

    #[test]
    fn provider_kind_parses_known_values() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("bedrock".parse::<ProviderKind>().is_err());
    }
}
