use std::sync::Arc;

use anyhow::{Context, Result};
use mentor_config::{Config, PipelineConfig};
use tracing::info;

use crate::chain::memory::{MemorySettings, SummaryBufferMemory};
use crate::chain::pipeline::Pipeline;
use crate::model::TextModel;
use crate::prompt::{PromptSet, PromptTemplate};
use crate::provider::create_model;

/// Build the thought and response pipelines from config.
///
/// One generation model is shared by both pipelines; each pipeline gets its
/// own summary model with its own output cap.
pub fn load_chains(config: &Config, prompts: &PromptSet) -> Result<(Pipeline, Pipeline)> {
    let model = &config.model;
    let primary = create_model(&model.model, model.temperature, model.max_tokens, config)
        .context("failed to create generation model")?;
    let thought_summary = create_model(
        model.summary_model_name(),
        model.summary_temperature,
        Some(config.thought.summary_max_tokens),
        config,
    )
    .context("failed to create thought summary model")?;
    let response_summary = create_model(
        model.summary_model_name(),
        model.summary_temperature,
        Some(config.response.summary_max_tokens),
        config,
    )
    .context("failed to create response summary model")?;

    Ok(build_chains(
        primary,
        thought_summary,
        response_summary,
        prompts,
        config,
    ))
}

/// Assemble both pipelines from already constructed models.
pub fn build_chains(
    primary: Arc<dyn TextModel>,
    thought_summary: Arc<dyn TextModel>,
    response_summary: Arc<dyn TextModel>,
    prompts: &PromptSet,
    config: &Config,
) -> (Pipeline, Pipeline) {
    let thought = pipeline(
        "thought",
        Arc::clone(&primary),
        thought_summary,
        &prompts.thought,
        &prompts.thought_summary,
        &config.thought,
    );
    let response = pipeline(
        "response",
        primary,
        response_summary,
        &prompts.response,
        &prompts.response_summary,
        &config.response,
    );
    info!(
        "Chains ready: thought ({}), response ({})",
        config.thought.ai_prefix, config.response.ai_prefix
    );
    (thought, response)
}

fn pipeline(
    name: &str,
    model: Arc<dyn TextModel>,
    summarizer: Arc<dyn TextModel>,
    prompt: &PromptTemplate,
    summary_prompt: &PromptTemplate,
    settings: &PipelineConfig,
) -> Pipeline {
    let memory = SummaryBufferMemory::new(
        MemorySettings::new(
            &settings.human_prefix,
            &settings.ai_prefix,
            settings.max_token_limit,
        ),
        summarizer,
        summary_prompt.clone(),
    );
    Pipeline::new(name, model, prompt.clone(), memory)
}
