use tracing::{info, warn};

use crate::chain::{Pipeline, PipelineError};
use crate::prompt::PromptInputs;

/// Shown in place of a reply when the pipelines were never built.
pub const UNAVAILABLE_NOTICE: &str = "Please set your OpenAI key to use";

const THOUGHT_STOP: &str = "Tutor:";
const RESPONSE_STOP: &str = "Student:";
// Seen once in the wild.
const RESPONSE_STOP_TYPO: &str = "Studen:";

/// One exchange. `thought` is `None` only for turns recorded while the
/// pipelines were unavailable, where `response` holds the notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub input: String,
    pub thought: Option<String>,
    pub response: String,
}

impl Turn {
    pub fn unavailable(input: &str) -> Self {
        Self {
            input: input.to_string(),
            thought: None,
            response: UNAVAILABLE_NOTICE.to_string(),
        }
    }
}

/// Caller-owned, append-only record of a conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Result of one generation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Generated(String),
    /// The step failed; holds the error's description.
    Failed(String),
}

impl StepOutcome {
    /// Text to show and to pass downstream, whether generated or not.
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) | Self::Failed(text) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    fn from_result(result: Result<String, PipelineError>, clean: fn(&str) -> String) -> Self {
        match result {
            Ok(raw) => Self::Generated(clean(&raw)),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The pipelines are missing. `history` is a snapshot taken after the
    /// notice turn was appended.
    Unavailable { history: Vec<Turn> },
    Completed {
        response: StepOutcome,
        thought: StepOutcome,
    },
}

/// Cut a thought where the model starts writing the tutor's line.
pub fn clean_thought(raw: &str) -> String {
    match raw.split_once(THOUGHT_STOP) {
        Some((before, _)) => before.trim().to_string(),
        None => raw.to_string(),
    }
}

/// Cut a response where the model starts writing the student's line.
pub fn clean_response(raw: &str) -> String {
    let mut response = match raw.split_once(RESPONSE_STOP) {
        Some((before, _)) => before.trim().to_string(),
        None => raw.to_string(),
    };
    if let Some((before, _)) = response.split_once(RESPONSE_STOP_TYPO) {
        response = before.trim().to_string();
    }
    response
}

/// Run one tutoring turn: thought, then response, then record the turn.
///
/// Model failures never escape; they come back as [`StepOutcome::Failed`]
/// and their text flows on as if the model had produced it.
pub async fn chat(
    context: &str,
    input: &str,
    history: &mut History,
    thought_chain: Option<&mut Pipeline>,
    response_chain: Option<&mut Pipeline>,
) -> TurnOutcome {
    let (Some(thought_chain), Some(response_chain)) = (thought_chain, response_chain) else {
        warn!("Chains unavailable, recording notice turn");
        history.push(Turn::unavailable(input));
        return TurnOutcome::Unavailable {
            history: history.turns().to_vec(),
        };
    };

    let mut inputs = PromptInputs::from([
        ("context".to_string(), context.to_string()),
        ("input".to_string(), input.to_string()),
    ]);

    let thought = StepOutcome::from_result(thought_chain.predict(&inputs).await, clean_thought);
    match &thought {
        StepOutcome::Generated(text) => info!("Thought: {text}"),
        StepOutcome::Failed(reason) => warn!("Thought step failed: {reason}"),
    }

    inputs.insert("thought".to_string(), thought.text().to_string());
    let response =
        StepOutcome::from_result(response_chain.predict(&inputs).await, clean_response);
    match &response {
        StepOutcome::Generated(text) => info!("Response: {text}"),
        StepOutcome::Failed(reason) => warn!("Response step failed: {reason}"),
    }

    history.push(Turn {
        input: input.to_string(),
        thought: Some(thought.text().to_string()),
        response: response.text().to_string(),
    });

    TurnOutcome::Completed { response, thought }
}
