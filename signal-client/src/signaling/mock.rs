//! Mock signaling channel for testing.
//!
//! Allows queueing server frames and capturing sent frames for verification.

use super::{SignalingChannel, SignalingError};
use async_trait::async_trait;
use signal_types::{ClientFrame, ServerFrame};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct MockSignalingInner {
    connected: bool,
    connected_address: Option<String>,
    sent_frames: Vec<ClientFrame>,
    receive_queue: VecDeque<ServerFrame>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

/// Mock signaling channel for testing.
///
/// Allows queueing server frames and capturing sent frames for verification.
/// Clones share state, so a test can hold one handle while the client owns
/// another.
#[derive(Debug, Default)]
pub struct MockSignaling {
    inner: Arc<Mutex<MockSignalingInner>>,
    queued: Arc<Notify>,
}

impl MockSignaling {
    /// Create a new mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame to be returned by a `recv()` call.
    pub fn queue_frame(&self, frame: ServerFrame) {
        self.inner.lock().unwrap().receive_queue.push_back(frame);
        self.queued.notify_one();
    }

    /// All frames that were sent.
    pub fn sent_frames(&self) -> Vec<ClientFrame> {
        self.inner.lock().unwrap().sent_frames.clone()
    }

    /// The last frame that was sent.
    pub fn last_sent(&self) -> Option<ClientFrame> {
        self.inner.lock().unwrap().sent_frames.last().cloned()
    }

    /// The address passed to `connect`.
    pub fn connected_address(&self) -> Option<String> {
        self.inner.lock().unwrap().connected_address.clone()
    }

    /// Cause the next `connect()` to fail.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next `send()` to fail.
    pub fn fail_next_send(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_send = Some(error.to_string());
    }
}

impl Clone for MockSignaling {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            queued: Arc::clone(&self.queued),
        }
    }
}

#[async_trait]
impl SignalingChannel for MockSignaling {
    async fn connect(&self, address: &str) -> Result<(), SignalingError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(SignalingError::ConnectionFailed(error));
        }
        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn send(&self, frame: &ClientFrame) -> Result<(), SignalingError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(SignalingError::NotConnected);
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(SignalingError::SendFailed(error));
        }
        inner.sent_frames.push(frame.clone());
        Ok(())
    }

    async fn recv(&self) -> Result<ServerFrame, SignalingError> {
        loop {
            {
                let mut inner = self.inner.lock().unwrap();
                if !inner.connected {
                    return Err(SignalingError::NotConnected);
                }
                if let Some(frame) = inner.receive_queue.pop_front() {
                    return Ok(frame);
                }
            }
            // Wait for a test to queue the next frame
            self.queued.notified().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    async fn close(&self) -> Result<(), SignalingError> {
        self.inner.lock().unwrap().connected = false;
        self.queued.notify_one();
        Ok(())
    }
}
