use crate::agent::ChatAgent;
use crate::config::prompt::PromptConfig;
use crate::llm::chat::new_client;
use crate::llm::LlmConfig;
use crate::models::websocket::{ ClientMessage, RenderedMessage, ServerMessage };
use crate::run_trace::RunTracer;
use futures::stream::SplitSink;
use futures::{ SinkExt, StreamExt };
use log::{ debug, info, warn, error };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };
use uuid::Uuid;

pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// What every new session is built from. Sessions share this read-only
/// configuration and nothing else.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub llm_config: LlmConfig,
    pub prompt_config: Arc<PromptConfig>,
    pub tracer: RunTracer,
    pub max_message_size: usize,
}

type WsSink<S> = SplitSink<WebSocketStream<S>, Message>;

async fn send_server_message<S>(
    tx: &mut WsSink<S>,
    msg: &ServerMessage
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

pub fn fatal_message(model: &str, reason: &str) -> String {
    format!(
        "Failed to initialize Ollama model. Please ensure Ollama is running and the '{}' model is available. Error: {}",
        model,
        reason
    )
}

/// Builds the session's own backend handle and orchestrator.
async fn start_session(
    session_id: &str,
    config: &SessionConfig
) -> Result<ChatAgent, Box<dyn Error + Send + Sync>> {
    let backend = new_client(&config.llm_config)?;
    let agent = ChatAgent::connect(
        session_id,
        backend,
        Arc::clone(&config.prompt_config),
        config.tracer.clone()
    ).await?;
    Ok(agent)
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    config: Arc<SessionConfig>
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);
    let (mut tx, mut rx) = websocket.split();
    let session_id = Uuid::new_v4().to_string();
    info!("Assigned session ID {} to {}", session_id, peer);

    let mut agent = match start_session(&session_id, &config).await {
        Ok(agent) => agent,
        Err(e) => {
            let model = config.llm_config.completion_model.as_deref().unwrap_or_default();
            let message = fatal_message(model, &e.to_string());
            error!("Session {} cannot start: {}", session_id, e);
            if let Err(e) = send_server_message(&mut tx, &(ServerMessage::Fatal { message })).await {
                error!("Failed to send fatal error to {}: {}", peer, e);
            }
            let _ = tx.send(Message::Close(None)).await;
            return;
        }
    };

    let history = ServerMessage::History {
        messages: agent.conversation().iter().map(RenderedMessage::from).collect(),
    };
    if let Err(e) = send_server_message(&mut tx, &history).await {
        error!("Error sending history to {}: {}", peer, e);
        return;
    }

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > config.max_message_size {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        config.max_message_size
                    );
                    let error_msg = ServerMessage::Error {
                        message: "Message too large".to_string(),
                    };
                    if send_server_message(&mut tx, &error_msg).await.is_err() {
                        error!("Failed to send size limit error to {}", peer);
                    }
                    let _ = tx.send(Message::Close(None)).await;
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Chat { content }) => {
                                if content.trim().is_empty() {
                                    debug!("Ignoring blank submission from {}", peer);
                                    continue;
                                }
                                if let Err(e) = run_turn(&mut tx, &mut agent, &content).await {
                                    error!("Error sending turn to {}: {}", peer, e);
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                let error_msg = ServerMessage::Error {
                                    message: format!("Failed to parse message: {}", e),
                                };
                                if let Err(e) = send_server_message(&mut tx, &error_msg).await {
                                    error!("Error sending parse error to {}: {}", peer, e);
                                    break;
                                }
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }
    info!(
        "WebSocket connection closed for {} (Session ID: {}, {} messages)",
        peer,
        session_id,
        agent.conversation().len()
    );
}

/// One full turn as the browser sees it: the user bubble, the thinking
/// indicator, then the assistant bubble.
async fn run_turn<S>(
    tx: &mut WsSink<S>,
    agent: &mut ChatAgent,
    content: &str
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin
{
    let user_message = match agent.begin_turn(content) {
        Ok(msg) => msg,
        Err(e) => {
            let error_msg = ServerMessage::Error { message: e.to_string() };
            return send_server_message(tx, &error_msg).await;
        }
    };
    send_server_message(tx, &ServerMessage::from(&user_message)).await?;
    send_server_message(tx, &ServerMessage::Processing).await?;

    match agent.resolve_turn().await {
        Ok(reply) => send_server_message(tx, &ServerMessage::from(&reply)).await,
        Err(e) => {
            let error_msg = ServerMessage::Error { message: e.to_string() };
            send_server_message(tx, &error_msg).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_message_names_model_and_reason() {
        let msg = fatal_message("llama3", "connection refused");
        assert!(msg.contains("'llama3' model is available"));
        assert!(msg.ends_with("Error: connection refused"));
    }
}
