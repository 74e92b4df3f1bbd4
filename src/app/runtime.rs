//! Background tasks: the liveness monitor, the status heartbeat, and the
//! per-session event pump.

use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::app::broadcast::{
    push_all, push_media_status, push_scenes, push_sources, push_stream_status,
};
use crate::app::state::{AppState, Liveness, LivenessTx};
use crate::obs::EventRx;
use crate::protocol::ServerMessage;

/// Cadence of reconnect attempts and health probes.
pub(crate) const LIVENESS_INTERVAL: Duration = Duration::from_secs(5);
/// Cadence of the stream/media status re-push, reconciling state changes the
/// event stream may have missed or coalesced.
pub(crate) const STATUS_INTERVAL: Duration = Duration::from_millis(500);

/// Start all background tasks. The returned handles are aborted on shutdown.
pub(crate) fn start_background_tasks(
    state: &AppState,
    liveness_tx: LivenessTx,
) -> Vec<JoinHandle<()>> {
    let monitor = {
        let state = state.clone();
        tokio::spawn(async move {
            monitor_upstream(state, liveness_tx).await;
        })
    };

    let heartbeat = {
        let state = state.clone();
        tokio::spawn(async move {
            status_heartbeat(state).await;
        })
    };

    vec![monitor, heartbeat]
}

/// The liveness state machine: `Idle -> Probing -> {Healthy, Reconnecting}`.
///
/// One step per tick: a health probe while Healthy, a connect attempt
/// otherwise. Steps never overlap; this task is the only writer of the
/// liveness channel and the only caller of `ensure_connected`.
async fn monitor_upstream(state: AppState, liveness_tx: LivenessTx) {
    let mut ticker = interval(LIVENESS_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // A routine probe does not leave Healthy; commands keep flowing
        // unless the probe actually fails.
        if liveness_tx.borrow().is_healthy() {
            probe(&state, &liveness_tx).await;
        } else {
            liveness_tx.send_replace(Liveness::Probing);
            attempt_connect(&state, &liveness_tx).await;
        }
    }
}

/// One reconnect attempt. Success triggers exactly one full-state push;
/// failure notifies clients with a bare "reconnecting" advisory.
async fn attempt_connect(state: &AppState, liveness_tx: &LivenessTx) {
    match state.upstream.ensure_connected().await {
        Ok(freshly_connected) => {
            liveness_tx.send_replace(Liveness::Healthy);
            if let Some(events) = freshly_connected {
                info!("Connected to OBS");
                {
                    let state = state.clone();
                    tokio::spawn(async move {
                        pump_events(state, events).await;
                    });
                }
                push_all(state).await;
            }
        }
        Err(e) => {
            warn!(error = %e, "OBS connection attempt failed");
            liveness_tx.send_replace(Liveness::Reconnecting);
            if state
                .ws_tx
                .send(ServerMessage::Reconnecting { message: None })
                .is_err()
            {
                debug!("No connected clients");
            }
        }
    }
}

/// Cheap health probe against an established session, to catch silent drops.
/// Success stays Healthy without any redundant broadcast.
async fn probe(state: &AppState, liveness_tx: &LivenessTx) {
    match state.upstream.call("GetVersion", json!({})).await {
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "Lost connection to OBS");
            state.upstream.disconnect().await;
            liveness_tx.send_replace(Liveness::Reconnecting);
        }
    }
}

/// Maps upstream events to targeted re-pushes. Ends when the session closes.
async fn pump_events(state: AppState, mut events: EventRx) {
    while let Some(event) = events.recv().await {
        debug!(event_type = %event.event_type, "OBS event");
        match event.event_type.as_str() {
            "CurrentProgramSceneChanged" => {
                push_scenes(&state).await;
                push_sources(&state).await;
            }
            "StreamStateChanged" => push_stream_status(&state).await,
            "MediaInputPlaybackStarted" | "MediaInputPlaybackEnded" => {
                push_media_status(&state).await;
            }
            _ => {}
        }
    }
    debug!("OBS event stream ended");
}

/// Periodic re-push of stream and media status while Healthy.
async fn status_heartbeat(state: AppState) {
    let mut ticker = interval(STATUS_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if state.liveness_rx.borrow().is_healthy() {
            push_stream_status(&state).await;
            push_media_status(&state).await;
        }
    }
}
