//! Out-of-band log stream for the web terminal.
//!
//! The processing path produces [`LogEvent`]s; the `/api/stream` endpoint
//! consumes them and forwards each as a server-sent `log` event. When no
//! event arrives within the heartbeat interval a `ping` is sent instead.

use crate::pipeline::progress::{ProgressSink, Style};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// How long the consumer waits for an event before sending a keep-alive.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// A single line for the web terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub msg: String,
    pub style: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl LogEvent {
    pub fn new(msg: impl Into<String>, style: Style) -> Self {
        Self {
            msg: msg.into(),
            style: style.as_str().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Bounded producer/consumer queue of log events.
///
/// When the queue is full the oldest queued event is discarded to make room,
/// so a client that connects late still sees the current run.
#[derive(Clone)]
pub struct LogStream {
    tx: mpsc::Sender<LogEvent>,
    rx: Arc<Mutex<mpsc::Receiver<LogEvent>>>,
}

impl LogStream {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Enqueue an event without waiting, evicting the oldest one if full.
    pub fn push(&self, event: LogEvent) {
        let event = match self.tx.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => event,
            Err(TrySendError::Closed(_)) => {
                warn!("Log stream closed, dropping event");
                return;
            }
        };

        // A consumer holding the lock is draining the queue already.
        if let Ok(mut rx) = self.rx.try_lock() {
            if let Ok(stale) = rx.try_recv() {
                debug!("Log stream full, evicted: {}", stale.msg);
            }
        }

        if let Err(e) = self.tx.try_send(event) {
            warn!("Dropping log event: {}", e);
        }
    }

    /// Wait up to `wait` for the next event.
    pub async fn next_event(&self, wait: Duration) -> Option<LogEvent> {
        tokio::time::timeout(wait, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await
        .ok()
        .flatten()
    }
}

impl ProgressSink for LogStream {
    fn emit(&self, message: &str, style: Style) {
        self.push(LogEvent::new(message, style));
    }
}
