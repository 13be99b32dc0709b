//! WebSocket connection establishment for task streams
//!
//! Handles plain and TLS WebSocket setup with proper error handling.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use rustls::RootCertStore;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{
    connect_async_tls_with_config, Connector as TlsConnector, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use super::transport::{Connector, Endpoint, Transport};
use crate::error::StreamError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Create a TLS client config with webpki root certificates for cross-platform compatibility
pub fn create_tls_config() -> Result<Arc<rustls::ClientConfig>, StreamError> {
    let mut root_store = RootCertStore::empty();

    // Use webpki-roots for cross-platform compatibility
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| StreamError::Connect(format!("TLS setup failed: {}", e)))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Connects to `ws://` / `wss://` task endpoints
#[derive(Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>, StreamError> {
        let url = endpoint.url();

        let tls = if endpoint.is_secure() {
            Some(TlsConnector::Rustls(create_tls_config()?))
        } else {
            None
        };

        let (ws, response) = connect_async_tls_with_config(url.as_str(), None, false, tls)
            .await
            .map_err(|e| StreamError::Connect(format!("WebSocket connect to {} failed: {}", url, e)))?;

        debug!(%url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsTransport { ws }))
    }
}

/// A connected WebSocket carrying one JSON event per text frame
pub struct WsTransport {
    ws: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_frame(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        warn!(len = bytes.len(), "skipping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(e) => return Some(Err(StreamError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        // The peer may already be gone; nothing useful to do with the error
        let _ = self.ws.close(None).await;
    }
}
