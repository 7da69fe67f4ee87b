use std::sync::Arc;

use tracing::debug;

use crate::chain::memory::SummaryBufferMemory;
use crate::model::{ModelError, TextModel};
use crate::prompt::{PromptError, PromptInputs, PromptTemplate};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("missing input '{0}'")]
    MissingInput(String),
}

/// A model, a prompt and a rolling memory that together produce one kind of
/// output ("thought" or "response").
pub struct Pipeline {
    name: String,
    model: Arc<dyn TextModel>,
    prompt: PromptTemplate,
    memory: SummaryBufferMemory,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        model: Arc<dyn TextModel>,
        prompt: PromptTemplate,
        memory: SummaryBufferMemory,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            prompt,
            memory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &SummaryBufferMemory {
        &self.memory
    }

    pub fn reset_memory(&mut self) {
        self.memory.clear();
    }

    /// Render the prompt with memory merged in, call the model and record the
    /// exchange. Returns the raw model output.
    ///
    /// The memory's value replaces any caller-supplied input under the same key.
    pub async fn predict(&mut self, inputs: &PromptInputs) -> Result<String, PipelineError> {
        let input_key = &self.memory.settings().input_key;
        let input = inputs
            .get(input_key)
            .cloned()
            .ok_or_else(|| PipelineError::MissingInput(input_key.clone()))?;

        let mut merged = inputs.clone();
        let (memory_key, memory_value) = self.memory.load_variables();
        merged.insert(memory_key, memory_value);

        let prompt = self.prompt.format(&merged)?;
        debug!("[{}] prompt:\n{prompt}", self.name);

        let output = self.model.predict(&prompt).await?;
        debug!("[{}] raw output: {output}", self.name);

        self.memory.save_context(&input, &output).await;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::MemorySettings;
    use crate::model::testing::ScriptedModel;

    fn pipeline(model: &ScriptedModel) -> Pipeline {
        let prompt = PromptTemplate::new(
            "{context}|{history}|{input}",
            vec!["context".into(), "history".into(), "input".into()],
        )
        .unwrap();
        let summary = PromptTemplate::new(
            "{summary}{new_lines}",
            vec!["summary".into(), "new_lines".into()],
        )
        .unwrap();
        let memory = SummaryBufferMemory::new(
            MemorySettings::new("Student", "Thought", 1000),
            Arc::new(ScriptedModel::new()),
            summary,
        );
        Pipeline::new("thought", Arc::new(model.clone()), prompt, memory)
    }

    fn inputs(context: &str, input: &str) -> PromptInputs {
        PromptInputs::from([
            ("context".to_string(), context.to_string()),
            ("input".to_string(), input.to_string()),
            ("history".to_string(), "caller history".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_memory_replaces_caller_history() {
        let model = ScriptedModel::new().reply("one").reply("two");
        let mut p = pipeline(&model);

        assert_eq!(p.predict(&inputs("algebra", "hi")).await.unwrap(), "one");
        assert_eq!(p.predict(&inputs("algebra", "again")).await.unwrap(), "two");

        let prompts = model.prompts();
        assert_eq!(prompts[0], "algebra||hi");
        assert_eq!(prompts[1], "algebra|Student: hi\nThought: one|again");
    }

    #[tokio::test]
    async fn test_model_failure_leaves_memory_untouched() {
        let model = ScriptedModel::new().fail("timeout");
        let mut p = pipeline(&model);

        let err = p.predict(&inputs("algebra", "hi")).await.unwrap_err();
        assert_eq!(err.to_string(), "timeout");
        assert_eq!(p.memory().buffer_len(), 0);
    }

    #[tokio::test]
    async fn test_missing_input_key() {
        let model = ScriptedModel::new().reply("unused");
        let mut p = pipeline(&model);

        let err = p.predict(&PromptInputs::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(ref k) if k == "input"));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_template_variable() {
        let model = ScriptedModel::new().reply("unused");
        let mut p = pipeline(&model);

        let only_input = PromptInputs::from([("input".to_string(), "hi".to_string())]);
        let err = p.predict(&only_input).await.unwrap_err();
        assert_eq!(err.to_string(), "missing value for prompt variable 'context'");
    }

    #[tokio::test]
    async fn test_declared_variable_without_value_skips_model() {
        let model = ScriptedModel::new().reply("unused");
        let prompt = PromptTemplate::new(
            "{input} / {thought}",
            vec!["input".into(), "history".into(), "thought".into()],
        )
        .unwrap();
        let mut p = pipeline(&model);
        p.prompt = prompt;

        let err = p.predict(&inputs("algebra", "hi")).await.unwrap_err();
        assert_eq!(err.to_string(), "missing value for prompt variable 'thought'");
        assert!(model.prompts().is_empty());
        assert_eq!(p.memory().buffer_len(), 0);
    }

    #[tokio::test]
    async fn test_reset_memory() {
        let model = ScriptedModel::new().reply("one");
        let mut p = pipeline(&model);
        p.predict(&inputs("algebra", "hi")).await.unwrap();
        assert_eq!(p.memory().buffer_len(), 2);

        p.reset_memory();
        assert_eq!(p.memory().buffer_len(), 0);
    }
}
