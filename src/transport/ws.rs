// src/transport/ws.rs — WebSocket transport (tokio-tungstenite)

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{InboundEvent, Transport};
use crate::infra::errors::AuditChatError;
use crate::protocol::{self, Command};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    url: String,
    sink: SplitSink<WsStream, WsMessage>,
    stream: SplitStream<WsStream>,
    open: bool,
    failed: bool,
    closed_reported: bool,
}

impl WsTransport {
    /// Open the connection. There is no reconnect; one connection per session.
    pub async fn connect(url: &str) -> Result<Self, AuditChatError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| AuditChatError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        info!("connected to {url}");

        let (sink, stream) = ws.split();
        Ok(Self {
            url: url.to_string(),
            sink,
            stream,
            open: true,
            failed: false,
            closed_reported: false,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn text_frame(text: &str) -> InboundEvent {
        InboundEvent::Frame(protocol::classify(text))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, command: &Command) -> Result<(), AuditChatError> {
        if !self.open {
            return Err(AuditChatError::NotConnected);
        }
        let text = protocol::encode(command)?;
        debug!("sending {} ({} bytes)", command.name(), text.len());

        match self.sink.send(WsMessage::Text(text)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.open = false;
                Err(AuditChatError::Send(e.to_string()))
            }
        }
    }

    async fn next_event(&mut self) -> Option<InboundEvent> {
        if self.closed_reported {
            return None;
        }
        if self.failed {
            self.closed_reported = true;
            return Some(InboundEvent::Closed);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Some(Self::text_frame(&text)),
                Some(Ok(WsMessage::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => return Some(Self::text_frame(text)),
                    Err(_) => debug!("dropping non-UTF-8 binary frame ({} bytes)", bytes.len()),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("server closed the connection: {frame:?}");
                    self.open = false;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.open = false;
                    self.failed = true;
                    return Some(InboundEvent::Error(e.to_string()));
                }
                None => {
                    info!("connection to {} closed", self.url);
                    self.open = false;
                    self.closed_reported = true;
                    return Some(InboundEvent::Closed);
                }
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<(), AuditChatError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.sink
            .close()
            .await
            .map_err(|e| AuditChatError::Send(e.to_string()))
    }
}
