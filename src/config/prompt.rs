use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::sync::Arc;
use log::info;
use crate::history::DEFAULT_GREETING;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful and friendly AI assistant. Please respond to user queries in a clear and concise way.";

pub const DEFAULT_ERROR_TEMPLATE: &str =
    "Sorry, I encountered an error. Please try again. Details: {reason}";

#[derive(Debug)]
pub enum PromptError {
    MissingPlaceholder { field: &'static str, placeholder: &'static str },
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::MissingPlaceholder { field, placeholder } =>
                write!(f, "Prompt field '{}' must contain '{}'", field, placeholder),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// Texts the chat uses. Any field left out of the prompts file keeps
/// its built-in value.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub system_instruction: String,
    pub greeting: String,
    pub error_template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            error_template: DEFAULT_ERROR_TEMPLATE.to_string(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if !self.error_template.contains("{reason}") {
            return Err(PromptError::MissingPlaceholder {
                field: "error_template",
                placeholder: "{reason}",
            });
        }
        Ok(())
    }

    /// Apology shown in the chat when a turn fails.
    pub fn error_message(&self, reason: &str) -> String {
        self.error_template.replace("{reason}", reason)
    }
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    info!("Loaded prompts from: {}", path);
    Ok(Arc::new(config))
}

/// Loads `path` if given, otherwise the built-in texts.
pub fn load_prompts_or_default(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_prompts(p),
        _ => Ok(Arc::new(PromptConfig::default())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system_instruction: String,
    pub question: String,
}

impl Prompt {
    /// Text form sent to a completion backend: a system line followed by
    /// the human line carrying the question.
    pub fn render(&self) -> String {
        format!("System: {}\nHuman: Question: {}", self.system_instruction, self.question)
    }
}

/// Turns a single utterance into a `Prompt`. Holds no conversation
/// state, so every call is independent of what was said before.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    config: Arc<PromptConfig>,
}

impl PromptBuilder {
    pub fn new(config: Arc<PromptConfig>) -> Self {
        Self { config }
    }

    pub fn build(&self, question: &str) -> Prompt {
        Prompt {
            system_instruction: self.config.system_instruction.clone(),
            question: question.to_string(),
        }
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(Arc::new(PromptConfig::default()))
    }
}
