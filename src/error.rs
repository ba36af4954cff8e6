use thiserror::Error;

/// Failures that stop a session before any chat happens, plus the
/// orchestration misuse error. Per-turn backend failures never surface
/// as `ChatError`; see `llm::completion::CompletionResult`.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("backend at {url} is unreachable: {reason}")]
    BackendUnreachable { url: String, reason: String },

    #[error("model '{model}' not found (available: {})", available.join(", "))]
    ModelNotFound { model: String, available: Vec<String> },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("a turn is already pending")]
    Busy,

    #[error("no turn is pending")]
    NoPendingTurn,
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_not_found_lists_available() {
        let err = ChatError::ModelNotFound {
            model: "llama3".into(),
            available: vec!["mistral:latest".into(), "phi3:mini".into()],
        };
        assert_eq!(
            err.to_string(),
            "model 'llama3' not found (available: mistral:latest, phi3:mini)"
        );
    }
}
