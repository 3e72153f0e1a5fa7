use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{Transport, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport to the live venue
pub struct WsTransport {
    url: String,
    stream: Option<WsStream>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
        }
    }
}

impl Transport for WsTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.stream = None;
        let url = self.url.clone();

        let (stream, response) = timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| TransportError::Connect(format!("timed out connecting to {}", url)))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::info!("🔌 Connected to {} (status {})", url, response.status());
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        if let Err(e) = stream.send(Message::Text(frame)).await {
            self.stream = None;
            return Err(TransportError::Send(e.to_string()));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Ping(payload))) => {
                    // Some servers expect explicit Pong frames
                    let _ = stream.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::warn!("WebSocket closed by venue: {:?}", frame);
                    self.stream = None;
                    return Ok(None);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(TransportError::Connect(format!("read error: {}", e)));
                }
                None => {
                    self.stream = None;
                    return Ok(None);
                }
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
