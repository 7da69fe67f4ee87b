use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use mentor_config::{resolve_path, PromptsConfig};
use regex::Regex;
use serde::Deserialize;

/// Values substituted into a template, keyed by variable name.
pub type PromptInputs = HashMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([^{}]*)\}|[{}]").expect("placeholder pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read prompt '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse prompt '{origin}': {source}")]
    Parse {
        origin: String,
        source: serde_yaml::Error,
    },
    #[error("unsupported prompt file: {0}")]
    Unsupported(String),
    #[error("unbalanced brace at byte {0}")]
    Malformed(usize),
    #[error("template uses '{{{0}}}' but does not declare it as an input variable")]
    UndeclaredVariable(String),
    #[error("missing value for prompt variable '{0}'")]
    MissingVariable(String),
}

/// On-disk prompt layout (`_type: prompt`, `input_variables`, `template`).
#[derive(Debug, Deserialize)]
struct PromptFile {
    #[serde(rename = "_type", default)]
    kind: Option<String>,
    #[serde(default)]
    input_variables: Vec<String>,
    template: Option<String>,
    #[serde(default)]
    template_format: Option<String>,
}

/// Text with `{name}` placeholders. `{{` and `}}` render literal braces.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Build a template, checking that every placeholder is declared.
    pub fn new(
        template: impl Into<String>,
        input_variables: Vec<String>,
    ) -> Result<Self, PromptError> {
        let template = template.into();
        for name in referenced_variables(&template)? {
            if !input_variables.iter().any(|v| v == &name) {
                return Err(PromptError::UndeclaredVariable(name));
            }
        }
        Ok(Self {
            template,
            input_variables,
        })
    }

    /// Parse a prompt file's contents. `origin` only labels errors.
    pub fn from_yaml_str(contents: &str, origin: &str) -> Result<Self, PromptError> {
        let file: PromptFile =
            serde_yaml::from_str(contents).map_err(|source| PromptError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        if let Some(kind) = file.kind.as_deref() {
            if kind != "prompt" {
                return Err(PromptError::Unsupported(format!(
                    "{origin}: _type '{kind}' (expected 'prompt')"
                )));
            }
        }
        if let Some(format) = file.template_format.as_deref() {
            if format != "f-string" {
                return Err(PromptError::Unsupported(format!(
                    "{origin}: template_format '{format}'"
                )));
            }
        }
        let template = file.template.ok_or_else(|| {
            PromptError::Unsupported(format!("{origin}: no 'template' field"))
        })?;

        Self::new(template, file.input_variables)
    }

    pub fn load(path: &Path) -> Result<Self, PromptError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents, &path.display().to_string())
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the template. Every declared variable must have a value; inputs
    /// the template never declares are ignored.
    pub fn format(&self, inputs: &PromptInputs) -> Result<String, PromptError> {
        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|name| !inputs.contains_key(name.as_str()))
        {
            return Err(PromptError::MissingVariable(missing.clone()));
        }

        let mut out = String::with_capacity(self.template.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(&self.template) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&self.template[last..whole.start()]);
            last = whole.end();
            match whole.as_str() {
                "{{" => out.push('{'),
                "}}" => out.push('}'),
                "{" | "}" => return Err(PromptError::Malformed(whole.start())),
                _ => {
                    let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                    let value = inputs
                        .get(name)
                        .ok_or_else(|| PromptError::MissingVariable(name.to_string()))?;
                    out.push_str(value);
                }
            }
        }
        out.push_str(&self.template[last..]);
        Ok(out)
    }
}

fn referenced_variables(template: &str) -> Result<BTreeSet<String>, PromptError> {
    let mut names = BTreeSet::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        match whole.as_str() {
            "{{" | "}}" => {}
            "{" | "}" => return Err(PromptError::Malformed(whole.start())),
            _ => {
                let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                if name.is_empty() {
                    return Err(PromptError::Malformed(whole.start()));
                }
                names.insert(name.to_string());
            }
        }
    }
    Ok(names)
}

const BUNDLED_THOUGHT: &str = include_str!("../prompts/thought_prompt.yaml");
const BUNDLED_RESPONSE: &str = include_str!("../prompts/response_prompt.yaml");
const BUNDLED_THOUGHT_SUMMARY: &str = include_str!("../prompts/thought_summary_prompt.yaml");
const BUNDLED_RESPONSE_SUMMARY: &str = include_str!("../prompts/response_summary_prompt.yaml");

/// The four templates the tutor needs. Loaded once at startup.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub thought: PromptTemplate,
    pub response: PromptTemplate,
    pub thought_summary: PromptTemplate,
    pub response_summary: PromptTemplate,
}

impl PromptSet {
    /// Templates compiled into the crate.
    pub fn bundled() -> Result<Self, PromptError> {
        Ok(Self {
            thought: PromptTemplate::from_yaml_str(BUNDLED_THOUGHT, "bundled thought_prompt")?,
            response: PromptTemplate::from_yaml_str(BUNDLED_RESPONSE, "bundled response_prompt")?,
            thought_summary: PromptTemplate::from_yaml_str(
                BUNDLED_THOUGHT_SUMMARY,
                "bundled thought_summary_prompt",
            )?,
            response_summary: PromptTemplate::from_yaml_str(
                BUNDLED_RESPONSE_SUMMARY,
                "bundled response_summary_prompt",
            )?,
        })
    }

    /// Load from `config.dir`, or use the bundled set when no directory is set.
    pub fn load(config: &PromptsConfig) -> Result<Self> {
        let Some(dir) = config.dir.as_deref().filter(|d| !d.is_empty()) else {
            tracing::debug!("No prompt directory configured, using bundled prompts");
            return Self::bundled().context("bundled prompts are invalid");
        };

        let dir = resolve_path(dir);
        let load = |file: &str| {
            let path = dir.join(file);
            PromptTemplate::load(&path)
                .with_context(|| format!("failed to load prompt '{}'", path.display()))
        };
        let set = Self {
            thought: load(&config.thought)?,
            response: load(&config.response)?,
            thought_summary: load(&config.thought_summary)?,
            response_summary: load(&config.response_summary)?,
        };
        tracing::info!("Loaded prompts from {}", dir.display());
        Ok(set)
    }
}
