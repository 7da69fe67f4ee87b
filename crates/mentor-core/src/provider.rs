use std::sync::Arc;

use anyhow::Result;
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;
use rig::client::{CompletionClient, Nothing};
use rig::providers::{ollama, openai};

use mentor_config::{resolve_api_key, Config};

use crate::model::{RigModel, TextModel, UnconfiguredModel};

const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Whether the configured provider has what it needs to make calls.
pub fn has_credentials(config: &Config) -> bool {
    match config.model.provider.as_str() {
        "openai" => resolve_api_key(&config.providers.openai, OPENAI_KEY_VAR).is_some(),
        "ollama" => true,
        _ => false,
    }
}

/// Create a text model for the configured provider.
///
/// A missing OpenAI key is not an error here: the returned model fails on
/// every call instead.
#[allow(deprecated)]
pub fn create_model(
    model_name: &str,
    temperature: f32,
    max_tokens: Option<u64>,
    config: &Config,
) -> Result<Arc<dyn TextModel>> {
    let provider = config.model.provider.as_str();
    if model_name.is_empty() {
        anyhow::bail!("No model configured for provider '{provider}'.");
    }

    let handle = match provider {
        "openai" => {
            let Some(key) = resolve_api_key(&config.providers.openai, OPENAI_KEY_VAR) else {
                tracing::warn!(
                    "No OpenAI API key found. Set providers.openai.apiKey in the config \
                     or the {OPENAI_KEY_VAR} env var."
                );
                return Ok(Arc::new(UnconfiguredModel::new("OpenAI", model_name)));
            };
            let mut builder = openai::CompletionsClient::builder().api_key(&key);
            if let Some(ref base) = config
                .providers
                .openai
                .as_ref()
                .and_then(|c| c.api_base.clone())
                .filter(|b| !b.is_empty())
            {
                builder = builder.base_url(base);
                tracing::info!("Using OpenAI provider with custom base: {base}");
            }
            let client: openai::CompletionsClient = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create OpenAI client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using OpenAI provider with model '{model_name}'");
            CompletionModelHandle::new(Arc::new(model))
        }

        "ollama" => {
            let mut builder = ollama::Client::builder().api_key(Nothing);
            if let Some(ref base) = config
                .providers
                .ollama
                .as_ref()
                .and_then(|c| c.api_base.clone())
                .filter(|b| !b.is_empty())
            {
                builder = builder.base_url(base);
            }
            let client: ollama::Client = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create Ollama client: {e}"))?;
            let model = client.completion_model(model_name);
            tracing::info!("Using Ollama provider with model '{model_name}'");
            CompletionModelHandle::new(Arc::new(model))
        }

        other => anyhow::bail!("Unknown provider '{other}'. Valid providers: openai, ollama"),
    };

    Ok(Arc::new(
        RigModel::new(handle, model_name)
            .with_temperature(f64::from(temperature))
            .with_max_tokens(max_tokens),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_config::ProviderConfig;

    fn openai_config(key: Option<&str>) -> Config {
        let mut config = Config::default();
        config.providers.openai = Some(ProviderConfig {
            api_key: key.map(str::to_string),
            api_base: None,
        });
        config
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut config = Config::default();
        config.model.provider = "carrier-pigeon".into();
        assert!(!has_credentials(&config));
        let err = create_model("m", 0.9, None, &config).err().unwrap();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn test_empty_model_name_is_rejected() {
        let config = openai_config(Some("sk-test"));
        assert!(create_model("", 0.9, None, &config).is_err());
    }

    #[test]
    fn test_configured_key_counts_as_credentials() {
        assert!(has_credentials(&openai_config(Some("sk-test"))));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let mut config = Config::default();
        config.model.provider = "ollama".into();
        assert!(has_credentials(&config));
    }
}
