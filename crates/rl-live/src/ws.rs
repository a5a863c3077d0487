//! WebSocket telemetry transport built on `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::StreamExt;
use rl_types::StreamError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::transport::{StreamConnection, StreamTransport};

/// Opens `/ws/stream` subscriptions.
#[derive(Debug, Clone)]
pub struct WsStreamTransport {
    url: String,
}

impl WsStreamTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl StreamTransport for WsStreamTransport {
    async fn connect(&self) -> Result<Box<dyn StreamConnection>, StreamError> {
        let (stream, response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| StreamError::Connect {
                    url: self.url.clone(),
                    message: e.to_string(),
                })?;
        debug!(url = %self.url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsConnection { stream }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// One open WebSocket subscription.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn next_message(&mut self) -> Result<Option<String>, StreamError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                // Payload validation happens upstream; binary frames are
                // handed over as text and usually fail to parse there.
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    return Err(StreamError::Transport {
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(StreamError::Transport {
                message: e.to_string(),
            }),
        }
    }
}
