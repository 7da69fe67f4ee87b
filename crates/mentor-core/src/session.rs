use anyhow::Result;
use mentor_config::{find_config_path, load_config, Config};
use tracing::info;

use crate::chain::{load_chains, Pipeline};
use crate::chat::{chat, History, TurnOutcome};
use crate::prompt::PromptSet;
use crate::provider::has_credentials;

/// Conversation state a front end keeps between turns.
///
/// Two stores are tracked: `history` is the full turn list, and each
/// pipeline's memory holds a summarized view of what it has seen.
pub struct TutorSession {
    context: String,
    history: History,
    chains: Option<(Pipeline, Pipeline)>,
}

impl TutorSession {
    pub fn new(context: impl Into<String>, chains: Option<(Pipeline, Pipeline)>) -> Self {
        Self {
            context: context.into(),
            history: History::new(),
            chains,
        }
    }

    /// Build a session from config. Without credentials the session is
    /// created without pipelines and every turn records the notice.
    pub fn from_config(context: impl Into<String>, config: &Config) -> Result<Self> {
        let chains = if has_credentials(config) {
            let prompts = PromptSet::load(&config.prompts)?;
            Some(load_chains(config, &prompts)?)
        } else {
            info!("No credentials for '{}', starting without chains", config.model.provider);
            None
        };
        Ok(Self::new(context, chains))
    }

    /// Like [`TutorSession::from_config`], reading config from the standard
    /// location (`./mentor.json`, then `~/.mentor/config.json`).
    pub fn from_default_config(context: impl Into<String>) -> Result<Self> {
        let path = find_config_path();
        info!("Using config {}", path.display());
        let config = load_config(&path)?;
        Self::from_config(context, &config)
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_available(&self) -> bool {
        self.chains.is_some()
    }

    pub async fn send(&mut self, input: &str) -> TurnOutcome {
        let (thought, response) = match self.chains.as_mut() {
            Some((thought, response)) => (Some(thought), Some(response)),
            None => (None, None),
        };
        chat(&self.context, input, &mut self.history, thought, response).await
    }

    /// Start over: drop the turn history and both pipelines' memories.
    pub fn reset(&mut self) {
        self.history = History::new();
        if let Some((thought, response)) = self.chains.as_mut() {
            thought.reset_memory();
            response.reset_memory();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chain::build_chains;
    use crate::chat::{StepOutcome, UNAVAILABLE_NOTICE};
    use crate::model::testing::ScriptedModel;

    fn session(primary: &ScriptedModel) -> TutorSession {
        let chains = build_chains(
            Arc::new(primary.clone()),
            Arc::new(ScriptedModel::new()),
            Arc::new(ScriptedModel::new()),
            &PromptSet::bundled().unwrap(),
            &Config::default(),
        );
        TutorSession::new("photosynthesis", Some(chains))
    }

    #[tokio::test]
    async fn test_send_runs_both_steps() {
        let primary = ScriptedModel::new()
            .reply("Knows plants need light.")
            .reply("Where do you think the sugar comes from?");
        let mut s = session(&primary);
        assert!(s.is_available());

        let outcome = s.send("How do plants eat?").await;
        assert_eq!(
            outcome,
            TurnOutcome::Completed {
                response: StepOutcome::Generated("Where do you think the sugar comes from?".into()),
                thought: StepOutcome::Generated("Knows plants need light.".into()),
            }
        );
        assert_eq!(s.history().len(), 1);
        assert!(primary.prompts()[0].contains("photosynthesis"));
    }

    #[tokio::test]
    async fn test_session_without_chains() {
        let mut s = TutorSession::new("ctx", None);
        assert!(!s.is_available());

        let outcome = s.send("hello").await;
        let TurnOutcome::Unavailable { history } = outcome else {
            panic!("expected unavailable");
        };
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].response, UNAVAILABLE_NOTICE);
    }

    #[test]
    fn test_from_config_without_credentials_has_no_chains() {
        let mut config = Config::default();
        config.model.provider = "unsupported".into();
        let s = TutorSession::from_config("ctx", &config).unwrap();
        assert!(!s.is_available());
    }

    #[test]
    fn test_from_config_keyless_provider_builds_chains() {
        let mut config = Config::default();
        config.model.provider = "ollama".into();
        config.model.model = "llama3".into();
        let s = TutorSession::from_config("ctx", &config).unwrap();
        assert!(s.is_available());
        assert_eq!(s.context(), "ctx");
    }

    #[test]
    fn test_from_default_config_starts_a_session() {
        let s = TutorSession::from_default_config("algebra").unwrap();
        assert_eq!(s.context(), "algebra");
        assert!(s.history().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_history_and_memory() {
        let primary = ScriptedModel::new().reply("t").reply("r").reply("t2").reply("r2");
        let mut s = session(&primary);
        s.send("first").await;
        s.reset();
        assert!(s.history().is_empty());

        s.set_context("new topic");
        s.send("second").await;
        let prompts = primary.prompts();
        assert!(prompts[2].contains("new topic"));
        assert!(!prompts[2].contains("Student: first"));
    }
}
