//! The per-service connection state machine.
//!
//! A [`Connection`] is exclusively owned and mutated by its service; no
//! other component reads or writes its state. States move
//! `Disconnected → Connecting → Connected`, or `Error` on a failed
//! attempt. Concurrent `connect()` calls coalesce: a caller arriving
//! while an attempt is in flight awaits that attempt instead of racing
//! a second one.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::transporter::{EmitFn, Transporter, TransporterOptions};

/// The state of a service connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection has been established.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is open.
    Connected,
    /// The last connection attempt failed.
    Error,
}

struct ConnectionState {
    /// The transporter's connection record, when it tracks one.
    object: Option<Value>,
    error: Option<String>,
}

/// Transporter connectivity for one service.
pub struct Connection {
    transporter: Arc<dyn Transporter>,
    options: TransporterOptions,
    emit: EmitFn,
    /// Serializes connection attempts; holding this lock across the
    /// transporter call is what coalesces concurrent `connect()`s.
    state: Mutex<ConnectionState>,
    status: RwLock<ConnectionStatus>,
}

impl Connection {
    /// Creates a connection for the given transporter and options.
    #[must_use]
    pub fn new(transporter: Arc<dyn Transporter>, options: TransporterOptions, emit: EmitFn) -> Self {
        Self {
            transporter,
            options,
            emit,
            state: Mutex::new(ConnectionState {
                object: None,
                error: None,
            }),
            status: RwLock::new(ConnectionStatus::Disconnected),
        }
    }

    /// Returns the current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// Returns the error message of the last failed attempt, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.try_lock().ok().and_then(|state| state.error.clone())
    }

    /// Connects, reusing an open connection when possible.
    ///
    /// Returns the transporter's connection record on success. Already
    /// connected is a no-op; a caller arriving while another attempt is
    /// in flight awaits that attempt and reuses its outcome.
    pub async fn connect(&self, auth: Option<&Value>) -> Result<Option<Value>, String> {
        let mut state = self.state.lock().await;
        if self.status() == ConnectionStatus::Connected {
            return Ok(state.object.clone());
        }

        *self.status.write() = ConnectionStatus::Connecting;
        let previous = state.object.take();
        match self
            .transporter
            .connect(&self.options, auth, previous, &self.emit)
            .await
        {
            Ok(object) => {
                state.object = object.clone();
                state.error = None;
                *self.status.write() = ConnectionStatus::Connected;
                Ok(object)
            }
            Err(error) => {
                let message = error.to_string();
                state.error = Some(message.clone());
                *self.status.write() = ConnectionStatus::Error;
                Err(message)
            }
        }
    }

    /// Disconnects the transporter and releases the connection record.
    ///
    /// Idempotent: disconnecting a closed connection is a no-op.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if self.status() == ConnectionStatus::Disconnected {
            return;
        }
        let object = state.object.take();
        self.transporter.disconnect(object).await;
        state.error = None;
        *self.status.write() = ConnectionStatus::Disconnected;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("status", &self.status())
            .finish()
    }
}
