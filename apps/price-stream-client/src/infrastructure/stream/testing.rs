//! In-memory transport for exercising the connection actor without sockets.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::messages::ClientCommand;
use crate::application::ports::{TransportConnector, TransportError, TransportSession};

enum Frame {
    Text(String),
    Close,
    Fail(String),
}

/// Connector whose opens succeed or fail according to a plan.
pub struct MemoryConnector {
    attempts: AtomicUsize,
    plan: Mutex<VecDeque<bool>>,
    accept_by_default: bool,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Every open succeeds.
    pub fn accepting() -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryPeer>) {
        Self::with_plan([], true)
    }

    /// Every open fails.
    pub fn refusing() -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryPeer>) {
        Self::with_plan([], false)
    }

    /// Follow `plan` for the first opens, then fall back to `accept_by_default`.
    pub fn with_plan(
        plan: impl IntoIterator<Item = bool>,
        accept_by_default: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: AtomicUsize::new(0),
            plan: Mutex::new(plan.into_iter().collect()),
            accept_by_default,
            peers,
        });
        (connector, rx)
    }

    /// Number of opens attempted so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for MemoryConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn TransportSession>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let accept = self.plan.lock().pop_front().unwrap_or(self.accept_by_default);
        if !accept {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let _ = self.peers.send(MemoryPeer {
            outbound: outbound_rx,
            inbound: inbound_tx,
        });

        Ok(Box::new(MemorySession {
            outbound: outbound_tx,
            inbound: inbound_rx,
        }))
    }
}

/// Server side of one accepted session.
pub struct MemoryPeer {
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<Frame>,
}

impl MemoryPeer {
    /// Deliver a JSON frame to the client.
    pub fn send(&self, frame: &Value) {
        self.send_raw(&frame.to_string());
    }

    /// Deliver raw text to the client.
    pub fn send_raw(&self, text: &str) {
        let _ = self.inbound.send(Frame::Text(text.to_string()));
    }

    /// Close the session from the server side.
    pub fn close(&self) {
        let _ = self.inbound.send(Frame::Close);
    }

    /// Fail the session with a receive error.
    pub fn fail(&self, reason: &str) {
        let _ = self.inbound.send(Frame::Fail(reason.to_string()));
    }

    /// Next command the client sent, once it arrives.
    pub async fn next_command(&mut self) -> Option<ClientCommand> {
        let text = self.outbound.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Next command already sent by the client, if any.
    pub fn try_next_command(&mut self) -> Option<ClientCommand> {
        let text = self.outbound.try_recv().ok()?;
        serde_json::from_str(&text).ok()
    }
}

struct MemorySession {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl TransportSession for MemorySession {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(text)
            .map_err(|_| TransportError::Send("peer dropped".to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        match self.inbound.recv().await {
            Some(Frame::Text(text)) => Some(Ok(text)),
            Some(Frame::Fail(reason)) => Some(Err(TransportError::Receive(reason))),
            Some(Frame::Close) | None => None,
        }
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}
