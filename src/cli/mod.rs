use clap::Parser;
use url::Url;
use crate::error::ChatError;
use crate::llm::{ LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Backend Args ---
    /// Base URL of the Ollama-compatible backend
    #[arg(long, env = "CHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub chat_base_url: String,

    /// Model name every session's completion client is bound to
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub chat_model: String,

    /// Optional JSON file overriding the system instruction, greeting and error template.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port of the HTTP server that serves the chat page.
    #[arg(long, env = "HTTP_PORT", default_value = "8080")]
    pub http_port: u16,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Largest client frame accepted, in bytes.
    #[arg(long, env = "MAX_MESSAGE_SIZE", default_value = "1048576")]
    pub max_message_size: usize,

    // --- Tracing Args ---
    /// Run-tracing API key. Tracing stays off without it.
    #[arg(long, env = "LANGCHAIN_API_KEY", hide_env_values = true)]
    pub tracing_api_key: Option<String>,

    #[arg(long, env = "LANGCHAIN_TRACKING_V2", default_value = "true")]
    pub tracing_v2: bool,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS/HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS/HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn validate(&self) -> Result<(), ChatError> {
        Url::parse(&self.chat_base_url).map_err(|e|
            ChatError::InvalidConfig(format!("invalid CHAT_BASE_URL '{}': {}", self.chat_base_url, e))
        )?;
        if self.chat_model.trim().is_empty() {
            return Err(ChatError::InvalidConfig("CHAT_MODEL is empty".into()));
        }
        if self.enable_tls && (self.tls_cert_path.is_none() || self.tls_key_path.is_none()) {
            return Err(
                ChatError::InvalidConfig(
                    "Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".into()
                )
            );
        }
        Ok(())
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            completion_model: Some(self.chat_model.clone()),
            base_url: Some(self.chat_base_url.clone()),
        }
    }

    pub fn tls_enabled(&self) -> bool {
        self.enable_tls && self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }

    /// API key with blank values treated as unset.
    pub fn required_api_key(&self) -> Option<String> {
        self.server_api_key.clone().filter(|k| !k.trim().is_empty())
    }
}
