//! Shared application state: config, liveness, the broadcast channel, and
//! the single upstream session slot.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast, watch};

use crate::config::{ObsConfig, RelayConfig};
use crate::obs::{CallError, ConnectError, EventRx, Session, session};
use crate::protocol::ServerMessage;

pub(crate) type WsTx = broadcast::Sender<ServerMessage>;
pub(crate) type LivenessRx = watch::Receiver<Liveness>;
pub(crate) type LivenessTx = watch::Sender<Liveness>;

/// Connection-liveness state of the upstream session.
///
/// Owned by the liveness monitor; every other component reads it through the
/// watch channel and never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Before the first connection attempt.
    Idle,
    /// A connect attempt or health probe is in flight.
    Probing,
    /// The upstream session is believed alive.
    Healthy,
    /// The last attempt or probe failed; retrying on the liveness cadence.
    Reconnecting,
}

impl Liveness {
    /// Whether commands and broadcasts are allowed to proceed.
    pub fn is_healthy(self) -> bool {
        self == Self::Healthy
    }
}

/// The single slot holding the upstream OBS session.
pub(crate) struct Upstream {
    obs: ObsConfig,
    session: Mutex<Option<Session>>,
}

impl Upstream {
    pub(crate) fn new(obs: ObsConfig) -> Self {
        Self {
            obs,
            session: Mutex::new(None),
        }
    }

    /// Connects when no session is active. Returns the event receiver of a
    /// fresh connection; `None` when a session already holds the slot (the
    /// attempt is a no-op success).
    pub(crate) async fn ensure_connected(&self) -> Result<Option<EventRx>, ConnectError> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            return Ok(None);
        }
        let (session, events) =
            Session::connect(&self.obs.host, self.obs.port, &self.obs.password).await?;
        *slot = Some(session);
        Ok(Some(events))
    }

    /// Issues a request through the active session.
    ///
    /// # Errors
    ///
    /// [`CallError::NotConnected`] when the slot is empty; otherwise the
    /// session's own failures.
    pub(crate) async fn call(
        &self,
        request_type: &str,
        request_data: Value,
    ) -> Result<Value, CallError> {
        let sender = self.session.lock().await.as_ref().map(Session::sender);
        let Some(sender) = sender else {
            return Err(CallError::NotConnected);
        };
        session::call_via(&sender, request_type, request_data).await
    }

    /// Drops the active session, if any. Safe to call when already empty.
    pub(crate) async fn disconnect(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.disconnect();
        }
    }
}

/// Application state shared across request handlers and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub(crate) config: Arc<RelayConfig>,
    /// Broadcast sender distributing messages to every client loop.
    pub(crate) ws_tx: WsTx,
    /// Receiver for upstream liveness transitions.
    pub(crate) liveness_rx: LivenessRx,
    /// The upstream session slot.
    pub(crate) upstream: Arc<Upstream>,
}

/// Builds the shared state. The returned [`LivenessTx`] belongs to the
/// liveness monitor (see [`crate::app::runtime::start_background_tasks`]).
pub(crate) fn initialize_state(config: RelayConfig) -> (AppState, LivenessTx) {
    let (liveness_tx, liveness_rx) = watch::channel(Liveness::Idle);
    let (ws_tx, _) = broadcast::channel(32);
    let upstream = Arc::new(Upstream::new(config.obs.clone()));

    let state = AppState {
        config: Arc::new(config),
        ws_tx,
        liveness_rx,
        upstream,
    };
    (state, liveness_tx)
}
