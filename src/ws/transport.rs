//! Socket abstraction the connection state machine runs on.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};

use crate::error::TransportError;

/// Normal closure status code.
pub const CLOSE_NORMAL: u16 = 1000;

/// Minimal text-frame socket.
#[async_trait]
pub trait Transport: Send {
    /// Writes one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Send`] if the socket is broken.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Waits for the next text frame. `None` means the peer closed.
    async fn receive(&mut self) -> Option<Result<String, TransportError>>;

    /// Closes the socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Close`] if the close frame cannot be sent.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}

/// [`Transport`] over an upgraded axum [`WebSocket`].
///
/// Binary, ping and pong frames are skipped; axum answers pings itself.
#[derive(Debug)]
pub struct AxumTransport {
    socket: WebSocket,
}

impl AxumTransport {
    /// Wraps an upgraded socket.
    #[must_use]
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Transport for AxumTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn receive(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.socket.recv().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_string())),
                Ok(Message::Close(_)) => return None,
                Ok(Message::Binary(_)) => {
                    tracing::debug!("ignoring binary frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {}
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code,
            reason: reason.into(),
        };
        self.socket
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}
