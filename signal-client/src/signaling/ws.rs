//! WebSocket signaling channel.
//!
//! Production transport for the client↔relay Signaling Channel. Frames are
//! JSON text messages, matching what browser clients speak.

use super::{SignalingChannel, SignalingError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use signal_types::{ClientFrame, ServerFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// WebSocket implementation of [`SignalingChannel`].
///
/// Read and write halves are locked independently so an in-flight `recv`
/// never blocks `send` or `close`.
#[derive(Default)]
pub struct WsSignaling {
    write: Mutex<Option<WsSink>>,
    read: Mutex<Option<WsSource>>,
    connected: AtomicBool,
}

impl WsSignaling {
    /// Create an unconnected channel.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalingChannel for WsSignaling {
    async fn connect(&self, address: &str) -> Result<(), SignalingError> {
        let (stream, _response) = connect_async(address)
            .await
            .map_err(|e| SignalingError::ConnectionFailed(e.to_string()))?;
        let (write, read) = stream.split();

        *self.write.lock().await = Some(write);
        *self.read.lock().await = Some(read);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("signaling channel connected to {}", address);
        Ok(())
    }

    async fn send(&self, frame: &ClientFrame) -> Result<(), SignalingError> {
        let bytes = frame.to_bytes()?;
        let text =
            String::from_utf8(bytes).map_err(|e| SignalingError::SendFailed(e.to_string()))?;

        let mut guard = self.write.lock().await;
        let write = guard.as_mut().ok_or(SignalingError::NotConnected)?;
        write
            .send(Message::Text(text))
            .await
            .map_err(|e| SignalingError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<ServerFrame, SignalingError> {
        let mut guard = self.read.lock().await;
        let read = guard.as_mut().ok_or(SignalingError::NotConnected)?;

        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return ServerFrame::from_bytes(text.as_bytes()).map_err(SignalingError::Codec)
                }
                Some(Ok(Message::Binary(data))) => {
                    return ServerFrame::from_bytes(&data).map_err(SignalingError::Codec)
                }
                // Keepalive traffic is transparent to callers
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(SignalingError::ConnectionClosed);
                }
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(SignalingError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), SignalingError> {
        self.connected.store(false, Ordering::SeqCst);
        let mut guard = self.write.lock().await;
        if let Some(write) = guard.as_mut() {
            let _ = write.send(Message::Close(None)).await;
        }
        *guard = None;
        *self.read.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let channel = WsSignaling::new();
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let channel = WsSignaling::new();
        let result = channel.send(&ClientFrame::Bye).await;
        assert!(matches!(result, Err(SignalingError::NotConnected)));
    }

    #[tokio::test]
    async fn recv_before_connect_fails() {
        let channel = WsSignaling::new();
        let result = channel.recv().await;
        assert!(matches!(result, Err(SignalingError::NotConnected)));
    }

    #[tokio::test]
    async fn close_is_safe_when_disconnected() {
        let channel = WsSignaling::new();
        channel.close().await.unwrap();
        assert!(!channel.is_connected());
    }
}
