pub mod api;
pub mod websocket;

use crate::cli::Args;
use self::websocket::{ handle_connection, SessionConfig };
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::http::response::Response as HttpResponse;
use tokio_rustls::TlsAcceptor;
use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };
use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use url::form_urlencoded;

use log::{ info, warn, error, debug };

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::MIN.saturating_add(9)));
}

pub struct Server {
    addr: String,
    session_config: Arc<SessionConfig>,
    api_key: Option<String>,
    args: Args,
}

pub fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;

    Ok(Arc::new(config))
}

/// Key offered by a client, from the `X-API-Key` header or else the
/// `api_key` query parameter.
pub fn provided_api_key(header: Option<&str>, query: Option<&str>) -> Option<String> {
    if let Some(h) = header {
        return Some(h.to_string());
    }
    query.and_then(|q| {
        form_urlencoded
            ::parse(q.as_bytes())
            .find(|(k, _)| k == "api_key")
            .map(|(_, v)| v.into_owned())
    })
}

impl Server {
    pub fn new(args: Args, session_config: SessionConfig) -> Self {
        let api_key = args.required_api_key();

        if api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }

        Self {
            addr: args.server_addr.clone(),
            session_config: Arc::new(session_config),
            api_key,
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(self.args.http_port, &self.args).await?;

        let listener = TcpListener::bind(&self.addr).await?;

        let protocol = if self.args.tls_enabled() { "wss" } else { "ws" };
        info!("{} server listening on: {}", protocol.to_uppercase(), self.addr);

        let tls_acceptor = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
            (Some(cert_path), Some(key_path)) if self.args.enable_tls => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            _ if self.args.enable_tls => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            _ => {
                info!("TLS not enabled. Running plain WebSocket (WS) server.");
                None
            }
        };

        loop {
            let (stream, peer) = listener.accept().await?;

            if CONNECTION_LIMITER.check().is_err() {
                warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
                continue;
            }

            info!("Incoming connection from: {}", peer);
            let session_config = Arc::clone(&self.session_config);
            let required_api_key = self.api_key.clone();
            let tls_acceptor_clone = tls_acceptor.clone();

            tokio::spawn(async move {
                let process_result = if let Some(acceptor) = tls_acceptor_clone {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            info!("TLS handshake successful for {}", peer);
                            Self::process_connection(
                                peer,
                                tls_stream,
                                session_config,
                                required_api_key
                            ).await
                        }
                        Err(e) => {
                            error!("TLS handshake error for {}: {}", peer, e);
                            Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                        }
                    }
                } else {
                    Self::process_connection(peer, stream, session_config, required_api_key).await
                };

                if let Err(e) = process_result {
                    error!("Failed to process connection for {}: {}", peer, e);
                }
            });
        }
    }

    pub async fn process_connection<S>(
        peer: SocketAddr,
        stream: S,
        session_config: Arc<SessionConfig>,
        required_api_key: Option<String>
    ) -> Result<(), Box<dyn Error + Send + Sync>>
        where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
    {
        let auth_callback = |
            req: &Request,
            response: Response
        | -> Result<Response, HttpResponse<Option<String>>> {
            debug!("Handshake from {}", peer);

            let Some(ref required) = required_api_key else {
                return Ok(response);
            };

            let provided = provided_api_key(
                req
                    .headers()
                    .get("X-API-Key")
                    .and_then(|v| v.to_str().ok()),
                req.uri().query()
            );

            if provided.as_deref() != Some(required.as_str()) {
                warn!("{}: bad or missing API key", peer);
                let mut resp = HttpResponse::new(Some("Unauthorized".to_string()));
                *resp.status_mut() = StatusCode::UNAUTHORIZED;
                return Err(resp);
            }
            info!("{} authenticated", peer);
            Ok(response)
        };

        match accept_hdr_async(stream, auth_callback).await {
            Ok(ws) => {
                handle_connection(peer, ws, session_config).await;
                Ok(())
            }
            Err(e) => {
                error!("Handshake failed for {}: {}", peer, e);
                Err(Box::new(e) as _)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_key_wins_over_query() {
        assert_eq!(
            provided_api_key(Some("from-header"), Some("api_key=from-query")).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn query_key_is_url_decoded() {
        assert_eq!(
            provided_api_key(None, Some("x=1&api_key=a%2Bb")).as_deref(),
            Some("a+b")
        );
        assert_eq!(provided_api_key(None, Some("x=1")), None);
        assert_eq!(provided_api_key(None, None), None);
    }
}
