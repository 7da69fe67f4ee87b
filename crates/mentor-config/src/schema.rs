use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub model: ModelConfig,
    #[serde(deserialize_with = "thought_pipeline")]
    pub thought: PipelineConfig,
    #[serde(deserialize_with = "response_pipeline")]
    pub response: PipelineConfig,
    pub prompts: PromptsConfig,
    pub providers: ProvidersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            thought: PipelineConfig::thought(),
            response: PipelineConfig::response(),
            prompts: PromptsConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Settings for the generation model and the two summary models.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    /// Output cap for the generation model. `None` leaves it to the provider.
    pub max_tokens: Option<u64>,
    /// Model used for the rolling summaries. Falls back to `model`.
    pub summary_model: Option<String>,
    pub summary_temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-3.5-turbo-instruct".into(),
            temperature: 0.9,
            max_tokens: None,
            summary_model: None,
            summary_temperature: 0.7,
        }
    }
}

impl ModelConfig {
    pub fn summary_model_name(&self) -> &str {
        self.summary_model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.model)
    }
}

/// Per-pipeline memory settings.
///
/// Fields missing from a `thought` or `response` block take that pipeline's
/// own defaults.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub ai_prefix: String,
    pub human_prefix: String,
    /// Token budget of the raw buffer before older lines get summarized.
    pub max_token_limit: usize,
    /// Output cap of this pipeline's summary model.
    pub summary_max_tokens: u64,
}

impl PipelineConfig {
    pub fn thought() -> Self {
        Self {
            ai_prefix: "Thought".into(),
            human_prefix: "Student".into(),
            max_token_limit: 100,
            summary_max_tokens: 75,
        }
    }

    pub fn response() -> Self {
        Self {
            ai_prefix: "Tutor".into(),
            human_prefix: "Student".into(),
            max_token_limit: 100,
            summary_max_tokens: 150,
        }
    }
}

/// A pipeline block as written in the file, before defaults are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PipelineOverrides {
    ai_prefix: Option<String>,
    human_prefix: Option<String>,
    max_token_limit: Option<usize>,
    summary_max_tokens: Option<u64>,
}

impl PipelineOverrides {
    fn apply(self, base: PipelineConfig) -> PipelineConfig {
        PipelineConfig {
            ai_prefix: self.ai_prefix.unwrap_or(base.ai_prefix),
            human_prefix: self.human_prefix.unwrap_or(base.human_prefix),
            max_token_limit: self.max_token_limit.unwrap_or(base.max_token_limit),
            summary_max_tokens: self.summary_max_tokens.unwrap_or(base.summary_max_tokens),
        }
    }
}

fn thought_pipeline<'de, D: Deserializer<'de>>(d: D) -> Result<PipelineConfig, D::Error> {
    Ok(PipelineOverrides::deserialize(d)?.apply(PipelineConfig::thought()))
}

fn response_pipeline<'de, D: Deserializer<'de>>(d: D) -> Result<PipelineConfig, D::Error> {
    Ok(PipelineOverrides::deserialize(d)?.apply(PipelineConfig::response()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptsConfig {
    /// Directory holding the prompt files. Bundled prompts are used when unset.
    pub dir: Option<String>,
    pub thought: String,
    pub response: String,
    pub thought_summary: String,
    pub response_summary: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            thought: "thought_prompt.yaml".into(),
            response: "response_prompt.yaml".into(),
            thought_summary: "thought_summary_prompt.yaml".into(),
            response_summary: "response_summary_prompt.yaml".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub openai: Option<ProviderConfig>,
    pub ollama: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_tutor_defaults() {
        let cfg: Config = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(cfg.model.provider, "openai");
        assert!((cfg.model.temperature - 0.9).abs() < f32::EPSILON);
        assert!(cfg.model.max_tokens.is_none());
        assert_eq!(cfg.thought.ai_prefix, "Thought");
        assert_eq!(cfg.thought.summary_max_tokens, 75);
        assert_eq!(cfg.response.ai_prefix, "Tutor");
        assert_eq!(cfg.response.human_prefix, "Student");
        assert_eq!(cfg.response.summary_max_tokens, 150);
        assert_eq!(cfg.response.max_token_limit, 100);
        assert!(cfg.prompts.dir.is_none());
    }

    #[test]
    fn partial_pipeline_block_keeps_other_defaults() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "thought": { "maxTokenLimit": 250 }
        }))
        .unwrap();
        assert_eq!(cfg.thought.max_token_limit, 250);
        assert_eq!(cfg.thought.ai_prefix, "Thought");
        assert_eq!(cfg.response, PipelineConfig::response());
    }

    #[test]
    fn partial_response_block_keeps_response_defaults() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "response": { "maxTokenLimit": 250 }
        }))
        .unwrap();
        assert_eq!(cfg.response.max_token_limit, 250);
        assert_eq!(cfg.response.ai_prefix, "Tutor");
        assert_eq!(cfg.response.human_prefix, "Student");
        assert_eq!(cfg.response.summary_max_tokens, 150);
        assert_eq!(cfg.thought, PipelineConfig::thought());
    }

    #[test]
    fn pipeline_blocks_roundtrip_through_json() {
        let mut cfg = Config::default();
        cfg.response.ai_prefix = "Coach".into();
        let json = serde_json::to_value(&cfg).unwrap();
        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back.response.ai_prefix, "Coach");
        assert_eq!(back.response.summary_max_tokens, 150);
        assert_eq!(back.thought, PipelineConfig::thought());
    }

    #[test]
    fn summary_model_falls_back_to_main_model() {
        let mut model = ModelConfig::default();
        assert_eq!(model.summary_model_name(), "gpt-3.5-turbo-instruct");

        model.summary_model = Some(String::new());
        assert_eq!(model.summary_model_name(), "gpt-3.5-turbo-instruct");

        model.summary_model = Some("gpt-4o-mini".into());
        assert_eq!(model.summary_model_name(), "gpt-4o-mini");
    }

    #[test]
    fn provider_fields_parsed() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "providers": {
                "openai": { "apiKey": "sk-test", "apiBase": "http://localhost:8080/v1" }
            },
            "prompts": { "dir": "data/prompts" }
        }))
        .unwrap();
        let openai = cfg.providers.openai.unwrap();
        assert_eq!(openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(openai.api_base.as_deref(), Some("http://localhost:8080/v1"));
        assert!(cfg.providers.ollama.is_none());
        assert_eq!(cfg.prompts.dir.as_deref(), Some("data/prompts"));
        assert_eq!(cfg.prompts.thought, "thought_prompt.yaml");
    }
}
