use async_trait::async_trait;
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;
use rig::completion::{CompletionModel, CompletionRequest, Message};
use rig::message::{AssistantContent, Text, UserContent};
use rig::OneOrMany;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("{0}")]
    Completion(String),
    #[error("model '{0}' returned no text")]
    Empty(String),
    #[error("no API key configured for {0}")]
    MissingCredential(String),
}

/// A text-in, text-out language model.
#[async_trait]
pub trait TextModel: Send + Sync {
    fn name(&self) -> &str;
    async fn predict(&self, prompt: &str) -> Result<String, ModelError>;
}

/// [`TextModel`] over a rig completion model.
///
/// Each prediction is a single user message holding the rendered prompt.
#[allow(deprecated)]
pub struct RigModel {
    handle: CompletionModelHandle<'static>,
    name: String,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
}

#[allow(deprecated)]
impl RigModel {
    pub fn new(handle: CompletionModelHandle<'static>, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u64>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[allow(deprecated)]
#[async_trait]
impl TextModel for RigModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(
            "LLM request to '{}': {} chars, temp={:?}, max_tokens={:?}",
            self.name,
            prompt.len(),
            self.temperature,
            self.max_tokens
        );

        let request = CompletionRequest {
            preamble: None,
            chat_history: OneOrMany::one(Message::User {
                content: OneOrMany::one(UserContent::Text(Text {
                    text: prompt.to_string(),
                })),
            }),
            documents: Vec::new(),
            tools: Vec::new(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tool_choice: None,
            additional_params: None,
        };

        let response = self
            .handle
            .completion(request)
            .await
            .map_err(|e| ModelError::Completion(e.to_string()))?;

        let text: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(ModelError::Empty(self.name.clone()));
        }
        Ok(text)
    }
}

/// Stand-in for a provider whose credential is missing. Every call fails,
/// so the problem shows up on the first turn rather than at startup.
pub struct UnconfiguredModel {
    provider: String,
    name: String,
}

impl UnconfiguredModel {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl TextModel for UnconfiguredModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, _prompt: &str) -> Result<String, ModelError> {
        Err(ModelError::MissingCredential(self.provider.clone()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_model_always_fails() {
        let model = UnconfiguredModel::new("OpenAI", "gpt-3.5-turbo-instruct");
        assert_eq!(model.name(), "gpt-3.5-turbo-instruct");
        let err = model.predict("hello").await.unwrap_err();
        assert_eq!(err.to_string(), "no API key configured for OpenAI");
    }

    #[test]
    fn test_completion_error_displays_provider_text() {
        let err = ModelError::Completion("HTTP 429: rate limited".into());
        assert_eq!(err.to_string(), "HTTP 429: rate limited");
    }
}
