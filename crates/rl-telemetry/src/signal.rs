//! Connected/disconnected indicator shared between the stream consumer and
//! its observers.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Health of the telemetry subscription as shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Status line text for the live feed header.
    pub fn indicator_label(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "Live Feed Active",
            ConnectionState::Disconnected => "Backend Offline",
        }
    }
}

/// Write side of the indicator. Held only by the stream consumer.
#[derive(Debug)]
pub struct ConnectionSignal {
    tx: watch::Sender<ConnectionState>,
}

impl ConnectionSignal {
    /// New signal starting out disconnected.
    pub fn new() -> (Self, ConnectionWatcher) {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        (Self { tx }, ConnectionWatcher { rx })
    }

    /// Publish `state`. Returns `true` if it differs from the previous value.
    pub fn set(&self, state: ConnectionState) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn watcher(&self) -> ConnectionWatcher {
        ConnectionWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the indicator; cheap to clone.
#[derive(Debug, Clone)]
pub struct ConnectionWatcher {
    rx: watch::Receiver<ConnectionState>,
}

impl ConnectionWatcher {
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_connected()
    }

    /// Wait for the next change. Returns `None` once the signal is gone.
    pub async fn changed(&mut self) -> Option<ConnectionState> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Wait until the indicator reads `state`. Returns `false` if the signal
    /// is dropped first.
    pub async fn wait_for(&mut self, state: ConnectionState) -> bool {
        self.rx.wait_for(|current| *current == state).await.is_ok()
    }
}
