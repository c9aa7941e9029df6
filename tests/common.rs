// tests/common.rs
#![allow(dead_code)]

use async_trait::async_trait;
use evcharge_push::error::{PushError, Result};
use evcharge_push::websocket::{Connector, Frame, FrameSink, FrameStream};
use futures::channel::mpsc;
use futures::SinkExt;
use std::collections::VecDeque;
use std::sync::{Mutex, Once};
use tokio::sync::Notify;
use tokio::time::Instant;
use url::Url;

static INIT: Once = Once::new();

// Installs the test logger once across all tests in this binary.
pub fn setup() {
    INIT.call_once(|| {
        env_logger::builder().is_test(true).try_init().ok();
    });
}

/// How the next handshake should go.
enum Script {
    Accept {
        to_server: mpsc::UnboundedSender<Frame>,
        from_server: mpsc::UnboundedReceiver<Result<Frame>>,
    },
    // Handshake succeeds but the client's writes never complete.
    Stalled {
        from_server: mpsc::UnboundedReceiver<Result<Frame>>,
    },
    Refuse,
    Hang,
}

/// Server half of an accepted in-memory connection.
pub struct ServerEnd {
    pub to_client: mpsc::UnboundedSender<Result<Frame>>,
    pub from_client: mpsc::UnboundedReceiver<Frame>,
}

impl ServerEnd {
    pub fn push_text(&self, text: &str) {
        self.to_client
            .unbounded_send(Ok(Frame::Text(text.to_string())))
            .expect("client end dropped");
    }

    pub fn push_error(&self, reason: &str) {
        self.to_client
            .unbounded_send(Err(PushError::WebsocketError(reason.to_string())))
            .expect("client end dropped");
    }

    pub fn push_close(&self) {
        self.to_client
            .unbounded_send(Ok(Frame::Close))
            .expect("client end dropped");
    }

    /// True once the client's connection task has released its end of the link.
    pub fn client_released(&self) -> bool {
        self.to_client.is_closed()
    }

    /// Drops the connection without a close frame.
    pub fn drop_connection(self) {}

    /// Returns the frames the client has sent so far without waiting.
    pub fn drain_sent(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = self.from_client.try_next() {
            frames.push(frame);
        }
        frames
    }
}

/// In-memory [`Connector`] that records every attempt.
///
/// Handshakes follow the queued scripts in order; with nothing queued the
/// attempt is refused.
#[derive(Default)]
pub struct MockConnector {
    attempts: Mutex<Vec<(Url, Instant)>>,
    scripts: Mutex<VecDeque<Script>>,
    attempted: Notify,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_next(&self) -> ServerEnd {
        let (to_server, from_client) = mpsc::unbounded();
        let (to_client, from_server) = mpsc::unbounded();
        self.scripts.lock().unwrap().push_back(Script::Accept {
            to_server,
            from_server,
        });
        ServerEnd {
            to_client,
            from_client,
        }
    }

    /// Accepts the next handshake with a link that never finishes sending.
    pub fn accept_stalled_next(&self) -> ServerEnd {
        let (to_client, from_server) = mpsc::unbounded();
        let (_, from_client) = mpsc::unbounded();
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Stalled { from_server });
        ServerEnd {
            to_client,
            from_client,
        }
    }

    pub fn refuse_next(&self) {
        self.scripts.lock().unwrap().push_back(Script::Refuse);
    }

    pub fn hang_next(&self) {
        self.scripts.lock().unwrap().push_back(Script::Hang);
    }

    pub fn attempts(&self) -> Vec<(Url, Instant)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Waits until at least `count` connection attempts were made.
    pub async fn wait_for_attempts(&self, count: usize) {
        loop {
            let notified = self.attempted.notified();
            if self.attempt_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        self.attempts
            .lock()
            .unwrap()
            .push((url.clone(), Instant::now()));
        let script = self.scripts.lock().unwrap().pop_front();
        self.attempted.notify_waiters();

        match script {
            Some(Script::Accept {
                to_server,
                from_server,
            }) => {
                let sink =
                    to_server.sink_map_err(|e| PushError::WebsocketError(e.to_string()));
                Ok((Box::pin(sink), Box::pin(from_server)))
            }
            Some(Script::Stalled { from_server }) => {
                let sink = futures::sink::unfold((), |(), _frame: Frame| {
                    futures::future::pending::<Result<()>>()
                });
                Ok((Box::pin(sink), Box::pin(from_server)))
            }
            Some(Script::Hang) => futures::future::pending().await,
            Some(Script::Refuse) | None => Err(PushError::WebsocketError(
                "WebSocket connection failed: connection refused".to_string(),
            )),
        }
    }
}
