use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::TextModel;
use crate::prompt::{PromptInputs, PromptTemplate};

/// Rough token estimate: about four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        (text.len() / 4).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Human,
    Ai,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMessage {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct MemorySettings {
    pub human_prefix: String,
    pub ai_prefix: String,
    /// Input whose value is recorded as the human line.
    pub input_key: String,
    /// Template variable the rendered memory is exposed under.
    pub memory_key: String,
    pub max_token_limit: usize,
}

impl MemorySettings {
    pub fn new(human_prefix: &str, ai_prefix: &str, max_token_limit: usize) -> Self {
        Self {
            human_prefix: human_prefix.to_string(),
            ai_prefix: ai_prefix.to_string(),
            input_key: "input".to_string(),
            memory_key: "history".to_string(),
            max_token_limit,
        }
    }
}

/// Recent exchanges kept verbatim, older ones folded into a running summary.
///
/// The summary is derived from this pipeline's own inputs and outputs, not
/// from the caller's turn history, so the two can drift apart.
pub struct SummaryBufferMemory {
    settings: MemorySettings,
    summarizer: Arc<dyn TextModel>,
    prompt: PromptTemplate,
    buffer: VecDeque<MemoryMessage>,
    summary: String,
}

impl SummaryBufferMemory {
    pub fn new(
        settings: MemorySettings,
        summarizer: Arc<dyn TextModel>,
        prompt: PromptTemplate,
    ) -> Self {
        Self {
            settings,
            summarizer,
            prompt,
            buffer: VecDeque::new(),
            summary: String::new(),
        }
    }

    pub fn settings(&self) -> &MemorySettings {
        &self.settings
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.summary.clear();
    }

    /// The memory rendered for the prompt, keyed by `memory_key`.
    pub fn load_variables(&self) -> (String, String) {
        let mut lines = Vec::with_capacity(self.buffer.len() + 1);
        if !self.summary.is_empty() {
            lines.push(format!("System: {}", self.summary));
        }
        lines.extend(self.buffer.iter().map(|m| self.render(m)));
        (self.settings.memory_key.clone(), lines.join("\n"))
    }

    /// Record one exchange, then fold old lines into the summary if the buffer
    /// has grown past its token budget.
    pub async fn save_context(&mut self, input: &str, output: &str) {
        self.buffer.push_back(MemoryMessage {
            speaker: Speaker::Human,
            text: input.to_string(),
        });
        self.buffer.push_back(MemoryMessage {
            speaker: Speaker::Ai,
            text: output.to_string(),
        });
        self.prune().await;
    }

    async fn prune(&mut self) {
        let mut tokens = self.buffer_tokens();
        if tokens <= self.settings.max_token_limit {
            return;
        }

        let mut pruned = Vec::new();
        while tokens > self.settings.max_token_limit {
            let Some(oldest) = self.buffer.pop_front() else {
                break;
            };
            pruned.push(oldest);
            tokens = self.buffer_tokens();
        }

        debug!(
            "Summarizing {} memory lines ({}, buffer now ~{tokens} tokens)",
            pruned.len(),
            self.settings.ai_prefix
        );

        match self.summarize(&pruned).await {
            Ok(summary) => self.summary = summary,
            Err(e) => {
                warn!(
                    "Memory summarization failed for {}, dropping {} lines: {e}",
                    self.settings.ai_prefix,
                    pruned.len()
                );
            }
        }
    }

    async fn summarize(&self, pruned: &[MemoryMessage]) -> anyhow::Result<String> {
        let new_lines = pruned
            .iter()
            .map(|m| self.render(m))
            .collect::<Vec<_>>()
            .join("\n");
        let inputs = PromptInputs::from([
            ("summary".to_string(), self.summary.clone()),
            ("new_lines".to_string(), new_lines),
        ]);
        let prompt = self.prompt.format(&inputs)?;
        let summary = self.summarizer.predict(&prompt).await?;
        Ok(summary.trim().to_string())
    }

    fn buffer_tokens(&self) -> usize {
        let rendered = self
            .buffer
            .iter()
            .map(|m| self.render(m))
            .collect::<Vec<_>>()
            .join("\n");
        estimate_tokens(&rendered)
    }

    fn render(&self, message: &MemoryMessage) -> String {
        let prefix = match message.speaker {
            Speaker::Human => &self.settings.human_prefix,
            Speaker::Ai => &self.settings.ai_prefix,
        };
        format!("{prefix}: {}", message.text)
    }
}
