//! Memoized OBS WebSocket session.
//!
//! One live connection per process, owned explicitly by the host and passed
//! by reference to each configurator. The first `ensure_connected` performs
//! the handshake; later calls reuse the socket. A mutex guards connect and
//! request alike, so two configuration passes racing on first use cannot
//! open two sockets.

use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, info};

use super::client::{self, ObsEndpoint, ObsRequester, ObsWebSocket};
use crate::error::{SetupError, SetupResult};

/// Owner of the single obs-websocket connection.
pub struct ObsSession {
    endpoint: ObsEndpoint,
    socket: Mutex<Option<ObsWebSocket>>,
}

impl ObsSession {
    pub fn new(endpoint: ObsEndpoint) -> Self {
        Self {
            endpoint,
            socket: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &ObsEndpoint {
        &self.endpoint
    }

    /// Establish the connection if absent. Fails with
    /// [`SetupError::Connection`] when the endpoint is unreachable or
    /// rejects authentication; a no-op when already connected.
    pub fn ensure_connected(&self) -> SetupResult<()> {
        let mut guard = self.socket.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return Ok(());
        }
        info!(url = %self.endpoint.url(), "connecting to OBS");
        *guard = Some(client::open_connection(&self.endpoint)?);
        Ok(())
    }

    /// Non-blocking accessor: whether a connection is currently memoized.
    pub fn is_connected(&self) -> bool {
        self.socket
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Tear the connection down. Never called by the configurators
    /// themselves; disconnect is owned by the host's lifecycle.
    pub fn disconnect(&self) {
        let mut guard = self.socket.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut socket) = guard.take() {
            let _ = socket.close(None);
            debug!("OBS session closed");
        }
    }
}

impl ObsRequester for ObsSession {
    fn request(&self, request_type: &str, request_data: Option<Value>) -> SetupResult<Value> {
        let mut guard = self.socket.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(client::open_connection(&self.endpoint)?);
        }
        let socket = guard
            .as_mut()
            .ok_or_else(|| SetupError::Connection("not connected".into()))?;

        match client::send_request_on_socket(socket, request_type, request_data.as_ref()) {
            Ok(response) => Ok(response),
            Err(err @ SetupError::Connection(_)) => {
                // Transport broke mid-request; drop the socket so the next
                // call reconnects instead of reusing a dead stream.
                if let Some(mut dead) = guard.take() {
                    let _ = dead.close(None);
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
