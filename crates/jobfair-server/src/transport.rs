//! WebSocket transport over TCP.
//!
//! Accepts TCP connections and upgrades them to WebSocket. Only the
//! [`CONNECT_PATH`] endpoint is served; any other request path is answered
//! with `404 Not Found` during the handshake.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};

use crate::error::ServerError;

/// Path clients connect to.
pub const CONNECT_PATH: &str = "/connect";

/// An upgraded client connection.
pub type WsConnection = WebSocketStream<TcpStream>;

/// WebSocket listener.
pub struct WsTransport {
    listener: TcpListener,
}

impl WsTransport {
    /// Bind a listener on `address`.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if the address does not parse
    /// - `ServerError::Transport` if the socket cannot be bound
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("WebSocket transport bound to {}", listener.local_addr()?);

        Ok(Self { listener })
    }

    /// Accept the next TCP connection.
    ///
    /// The WebSocket handshake is not performed here; call [`upgrade`] on the
    /// stream from the connection's own task so a slow handshake never blocks
    /// the accept loop.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        Ok(self.listener.accept().await?)
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Perform the WebSocket handshake, refusing paths other than
/// [`CONNECT_PATH`].
pub async fn upgrade(stream: TcpStream) -> Result<WsConnection, ServerError> {
    let check_path = |request: &Request, response: Response| {
        if request.uri().path() == CONNECT_PATH {
            Ok(response)
        } else {
            let mut refusal = ErrorResponse::new(Some("not found".to_string()));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    };

    Ok(accept_hdr_async(stream, check_path).await?)
}
