pub mod chat;
pub mod completion;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}
