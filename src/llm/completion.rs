use std::error::Error as StdError;
use std::sync::Arc;
use log::{ info, warn };
use super::chat::ChatClient;
use super::chat::ollama::OllamaClient;
use super::LlmConfig;
use crate::config::prompt::Prompt;
use crate::error::{ ChatError, Result };

/// Outcome of one backend call: the reply text, or a diagnostic.
pub type CompletionResult = std::result::Result<String, String>;

/// Handle bound to one backend and one model.
///
/// Construction verifies the backend answers and serves the model; once
/// built, `complete` never fails past its return value. There is no
/// retry and no timeout beyond what the backend call itself exhibits.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn ChatClient>,
}

impl CompletionClient {
    pub async fn connect(backend: Arc<dyn ChatClient>) -> Result<Self> {
        let model = backend.get_model();
        let url = backend.get_base_url();

        let available = backend.list_models().await.map_err(|e| ChatError::BackendUnreachable {
            url: url.clone(),
            reason: describe_error(&*e),
        })?;

        if !model_available(&model, &available) {
            return Err(ChatError::ModelNotFound { model, available });
        }

        info!("Completion client ready: Model={}, BaseURL={}", model, url);
        Ok(Self { backend })
    }

    pub async fn from_config(config: &LlmConfig) -> Result<Self> {
        let backend = OllamaClient::from_config(config)?;
        Self::connect(Arc::new(backend)).await
    }

    pub async fn complete(&self, prompt: &Prompt) -> CompletionResult {
        let rendered = prompt.render();
        match self.backend.complete(&rendered).await {
            Ok(resp) => Ok(resp.response),
            Err(e) => {
                let reason = describe_error(&*e);
                warn!("Completion failed for model {}: {}", self.backend.get_model(), reason);
                Err(reason)
            }
        }
    }

    pub fn model(&self) -> String {
        self.backend.get_model()
    }
}

/// An untagged name such as `llama3` also matches `llama3:latest`.
pub fn model_available(model: &str, available: &[String]) -> bool {
    available.iter().any(|name| {
        name == model || (!model.contains(':') && name.strip_suffix(":latest") == Some(model))
    })
}

/// Flattens an error and its sources into one line, so transport
/// causes such as "Connection refused" are not lost.
pub fn describe_error(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[test]
    fn untagged_model_matches_latest() {
        let available = vec!["llama3:latest".to_string(), "phi3:mini".to_string()];
        assert!(model_available("llama3", &available));
        assert!(model_available("llama3:latest", &available));
        assert!(model_available("phi3:mini", &available));
        assert!(!model_available("phi3", &available));
        assert!(!model_available("llama3:70b", &available));
        assert!(!model_available("llama3", &[]));
    }

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "error sending request")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn describe_error_includes_sources() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"));
        assert_eq!(describe_error(&err), "error sending request: connection refused");
    }
}
