use reqwest::{ Client as HttpClient, Response, StatusCode };
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;
use async_trait::async_trait;
use url::Url;
use log::debug;
use super::{ ChatClient, CompletionResponse };
use crate::error::ChatError;
use crate::llm::{ LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL };

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        if let Some(raw) = &config.base_url {
            Url::parse(raw).map_err(|e|
                ChatError::InvalidConfig(format!("invalid base URL '{}': {}", raw, e))
            )?;
        }
        if let Some(model) = &config.completion_model {
            if model.trim().is_empty() {
                return Err(ChatError::InvalidConfig("model name is empty".into()));
            }
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }

    pub async fn generate(
        &self,
        prompt: &str
    ) -> Result<GenerateResponse, Box<dyn StdError + Send + Sync>> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model: self.completion_model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };
        debug!("POST {} (model={}, {} prompt bytes)", url, req.model, req.prompt.len());
        let resp = check_status(self.http.post(&url).json(&req).send().await?).await?;
        let data = resp.json::<GenerateResponse>().await?;
        Ok(data)
    }

    pub async fn tags(&self) -> Result<Vec<String>, Box<dyn StdError + Send + Sync>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = check_status(self.http.get(&url).send().await?).await?;
        let data = resp.json::<TagsResponse>().await?;
        Ok(data.models.into_iter().map(|m| m.name).collect())
    }
}

/// Describes a failed backend reply, keeping the `error` text Ollama
/// puts in the body (or the raw body when it is not JSON).
pub fn backend_error_message(status: StatusCode, url: &str, body: &str) -> String {
    let detail = serde_json
        ::from_str::<ErrorResponse>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    if detail.is_empty() {
        format!("HTTP {} from {}", status, url)
    } else {
        format!("HTTP {} from {}: {}", status, url, detail)
    }
}

async fn check_status(resp: Response) -> Result<Response, Box<dyn StdError + Send + Sync>> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(backend_error_message(status, &url, &body).into())
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(
        &self,
        prompt: &str
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let gen_resp = self.generate(prompt).await?;
        Ok(CompletionResponse { response: gen_resp.response })
    }

    async fn list_models(&self) -> Result<Vec<String>, Box<dyn StdError + Send + Sync>> {
        self.tags().await
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}
