pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod markdown;
pub mod models;
pub mod run_trace;
pub mod server;

use cli::Args;
use config::prompt::load_prompts_or_default;
use llm::completion::CompletionClient;
use llm::LlmConfig;
use log::{ error, info, warn };
use run_trace::RunTracer;
use server::websocket::{ fatal_message, SessionConfig };
use server::Server;
use std::error::Error;

/// Startup check against the backend. Sessions still build their own
/// client; a failure here is only reported to the operator.
pub async fn check_backend(llm_config: &LlmConfig) -> Result<String, String> {
    let model = llm_config.completion_model.clone().unwrap_or_default();
    match CompletionClient::from_config(llm_config).await {
        Ok(client) => {
            info!("Backend check passed: model {} is available.", client.model());
            Ok(client.model())
        }
        Err(e) => {
            let message = fatal_message(&model, &e.to_string());
            error!("{}", message);
            Err(message)
        }
    }
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    args.validate()?;

    info!("--- Core Configuration ---");
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Port: {}", args.http_port);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Chat Model: {}", args.chat_model);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Max Message Size: {}", args.max_message_size);
    info!("TLS Enabled: {}", args.tls_enabled());
    info!("-------------------------");

    let tracer = RunTracer::new(args.tracing_api_key.as_deref(), args.tracing_v2);
    if tracer.is_enabled() {
        info!("Run tracing enabled.");
    } else {
        warn!("Run tracing disabled.");
    }

    let session_config = SessionConfig {
        llm_config: args.llm_config(),
        prompt_config: load_prompts_or_default(args.prompts_path.as_deref()).map_err(|e|
            format!("Failed to load prompts file '{}': {}", args.prompts_path.as_deref().unwrap_or_default(), e)
        )?,
        tracer,
        max_message_size: args.max_message_size,
    };

    let _ = check_backend(&session_config.llm_config).await;

    let server = Server::new(args, session_config);
    server.run().await?;

    Ok(())
}
