use crate::cli::Args;
use crate::markdown::escape_html;
use std::error::Error;
use std::net::SocketAddr;
use axum::{
    routing::get,
    Router,
    extract::State,
    response::{ Html, IntoResponse },
    Json,
};
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
}

#[derive(Clone)]
struct AppState {
    page: String,
    model: String,
}

/// Fills the page template with the model name and the WebSocket
/// endpoint the browser should connect to.
pub fn render_index(model: &str, ws_port: &str, secure: bool) -> String {
    INDEX_HTML
        .replace("{{MODEL}}", &escape_html(model))
        .replace("{{WS_PORT}}", ws_port)
        .replace("{{WS_SCHEME}}", if secure { "wss" } else { "ws" })
}

pub fn router(args: &Args) -> Router {
    let ws_port = args.server_addr.rsplit(':').next().unwrap_or("4000");
    let app_state = AppState {
        page: render_index(&args.chat_model, ws_port, args.tls_enabled()),
        model: args.chat_model.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .with_state(app_state)
}

pub async fn start_http_server(
    http_port: u16,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router(args);

    match (&args.tls_cert_path, &args.tls_key_path) {
        (Some(cert_path), Some(key_path)) if args.enable_tls => {
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;

            info!("Starting HTTPS chat page on: https://{}", addr);
            tokio::spawn(async move {
                let result = axum_server::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service())
                    .await;

                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });
        }
        _ => {
            info!("Starting HTTP chat page on: http://{}", addr);
            tokio::spawn(async move {
                match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => {
                        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                            error!("HTTP server error: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                    }
                }
            });
        }
    }

    Ok(())
}

async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    Html(state.page)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse { status: "ok", model: state.model })
}
