//! The single upstream obs-websocket session, over `tokio-tungstenite`.
//!
//! One I/O loop owns the socket: it sends `Request` frames (op 6) handed in
//! over an mpsc channel, routes `RequestResponse` frames (op 7) back to the
//! caller's oneshot by request id, and pumps `Event` frames (op 5) onto the
//! event channel.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use super::auth;
use super::error::{CallError, ConnectError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingTx = oneshot::Sender<Result<Value, CallError>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// obs-websocket close code for a failed authentication challenge.
const AUTH_FAILED_CLOSE_CODE: u16 = 4009;

// Event intents the relay cares about: Scenes | Outputs | MediaInputs.
const EVENT_SUB_SCENES: u32 = 1 << 2;
const EVENT_SUB_OUTPUTS: u32 = 1 << 6;
const EVENT_SUB_MEDIA_INPUTS: u32 = 1 << 8;
const EVENT_SUBSCRIPTIONS: u32 = EVENT_SUB_SCENES | EVENT_SUB_OUTPUTS | EVENT_SUB_MEDIA_INPUTS;

/// A state-change notification pushed by OBS.
#[derive(Debug)]
pub struct Event {
    pub event_type: String,
    pub event_data: Value,
}

/// Receiver half of the session's event stream. Yields events for as long as
/// the session lives, then ends without error.
pub type EventRx = mpsc::UnboundedReceiver<Event>;

/// Request handed to the session I/O loop.
pub(crate) struct SessionCommand {
    request_type: String,
    request_data: Value,
    response_tx: PendingTx,
}

/// An established, identified obs-websocket session.
pub struct Session {
    cmd_tx: mpsc::Sender<SessionCommand>,
    io_loop: JoinHandle<()>,
}

impl Session {
    /// Dials `ws://host:port` and performs the Hello/Identify/Identified
    /// handshake, answering the authentication challenge when OBS presents
    /// one.
    ///
    /// # Errors
    ///
    /// [`ConnectError::Auth`] when OBS closes the socket with code 4009,
    /// [`ConnectError::Network`] for every other dial or handshake failure.
    pub async fn connect(
        host: &str,
        port: u16,
        password: &SecretString,
    ) -> Result<(Self, EventRx), ConnectError> {
        let url = format!("ws://{host}:{port}");
        let (mut ws, _) = timeout(HANDSHAKE_TIMEOUT, connect_async(&url))
            .await
            .map_err(|_| ConnectError::Network(format!("timed out dialing {url}")))?
            .map_err(|e| ConnectError::Network(e.to_string()))?;

        timeout(HANDSHAKE_TIMEOUT, identify(&mut ws, password))
            .await
            .map_err(|_| ConnectError::Network("handshake timed out".to_string()))??;

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let io_loop = tokio::spawn(session_io_loop(ws, cmd_rx, event_tx));

        Ok((Self { cmd_tx, io_loop }, event_rx))
    }

    /// Issues a request and awaits the matching response.
    ///
    /// # Errors
    ///
    /// See [`CallError`]; the session itself stays usable after a rejected
    /// request.
    pub async fn call(&self, request_type: &str, request_data: Value) -> Result<Value, CallError> {
        call_via(&self.cmd_tx, request_type, request_data).await
    }

    /// A cheap handle for issuing requests without holding the session.
    pub(crate) fn sender(&self) -> mpsc::Sender<SessionCommand> {
        self.cmd_tx.clone()
    }

    /// Releases the underlying connection.
    pub fn disconnect(self) {
        drop(self);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.io_loop.abort();
    }
}

/// Issues a request through a session command channel and awaits the
/// response, bounded by the request timeout.
pub(crate) async fn call_via(
    cmd_tx: &mpsc::Sender<SessionCommand>,
    request_type: &str,
    request_data: Value,
) -> Result<Value, CallError> {
    let (response_tx, response_rx) = oneshot::channel();
    cmd_tx
        .send(SessionCommand {
            request_type: request_type.to_owned(),
            request_data,
            response_tx,
        })
        .await
        .map_err(|_| CallError::Closed)?;

    timeout(REQUEST_TIMEOUT, response_rx)
        .await
        .map_err(|_| CallError::Timeout)?
        .map_err(|_| CallError::Closed)?
}

/// Reads the `Hello` frame, answers with `Identify`, and awaits `Identified`.
async fn identify(ws: &mut WsStream, password: &SecretString) -> Result<(), ConnectError> {
    let hello = next_json(ws).await?;
    if hello["op"].as_u64() != Some(0) {
        return Err(ConnectError::Network(
            "expected Hello as the first frame".to_string(),
        ));
    }

    let mut payload = json!({
        "rpcVersion": 1,
        "eventSubscriptions": EVENT_SUBSCRIPTIONS,
    });
    let authentication = &hello["d"]["authentication"];
    if let (Some(challenge), Some(salt)) = (
        authentication["challenge"].as_str(),
        authentication["salt"].as_str(),
    ) {
        payload["authentication"] =
            Value::String(auth::challenge_response(password.expose_secret(), salt, challenge));
    }

    let frame = json!({"op": 1, "d": payload});
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .map_err(|e| ConnectError::Network(e.to_string()))?;

    let identified = next_json(ws).await?;
    if identified["op"].as_u64() == Some(2) {
        Ok(())
    } else {
        Err(ConnectError::Network(
            "expected Identified after Identify".to_string(),
        ))
    }
}

/// Reads frames until the next text frame, parsed as JSON. A close frame
/// with the authentication-failure code maps to [`ConnectError::Auth`].
async fn next_json(ws: &mut WsStream) -> Result<Value, ConnectError> {
    while let Some(msg) = ws.next().await {
        match msg.map_err(|e| ConnectError::Network(e.to_string()))? {
            Message::Text(text) => {
                return serde_json::from_str(&text)
                    .map_err(|e| ConnectError::Network(format!("invalid frame: {e}")));
            }
            Message::Close(frame) => {
                if let Some(frame) = frame
                    && frame.code == CloseCode::Library(AUTH_FAILED_CLOSE_CODE)
                {
                    return Err(ConnectError::Auth);
                }
                return Err(ConnectError::Network(
                    "connection closed during handshake".to_string(),
                ));
            }
            _ => {}
        }
    }
    Err(ConnectError::Network(
        "connection closed during handshake".to_string(),
    ))
}

/// Owns the socket after the handshake: multiplexes outbound requests and
/// routes responses/events. Ends when either side of the session goes away.
async fn session_io_loop(
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: mpsc::UnboundedSender<Event>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<u64, PendingTx> = HashMap::new();
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let id = next_id;
                next_id += 1;
                let frame = json!({
                    "op": 6,
                    "d": {
                        "requestType": cmd.request_type,
                        "requestId": id.to_string(),
                        "requestData": cmd.request_data,
                    },
                });
                pending.insert(id, cmd.response_tx);
                if ws_tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                let Message::Text(text) = msg else { continue };
                let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                    debug!("Dropping unparseable frame from OBS");
                    continue;
                };
                match frame["op"].as_u64() {
                    Some(7) => route_response(&frame["d"], &mut pending),
                    Some(5) => forward_event(&frame["d"], &event_tx),
                    _ => {}
                }
            }
        }
    }

    // Callers still waiting learn the session is gone.
    for (_, tx) in pending {
        let _ = tx.send(Err(CallError::Closed));
    }
}

fn route_response(d: &Value, pending: &mut HashMap<u64, PendingTx>) {
    let Some(id) = d["requestId"].as_str().and_then(|id| id.parse::<u64>().ok()) else {
        return;
    };
    let Some(tx) = pending.remove(&id) else {
        return;
    };
    let status = &d["requestStatus"];
    let result = if status["result"].as_bool() == Some(true) {
        Ok(d["responseData"].clone())
    } else {
        Err(CallError::Upstream {
            code: status["code"]
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .unwrap_or(0),
            message: status["comment"]
                .as_str()
                .unwrap_or("request failed")
                .to_owned(),
        })
    };
    let _ = tx.send(result);
}

fn forward_event(d: &Value, event_tx: &mpsc::UnboundedSender<Event>) {
    if let Some(event_type) = d["eventType"].as_str() {
        // A dropped receiver only means nobody is pumping events anymore;
        // requests keep working.
        let _ = event_tx.send(Event {
            event_type: event_type.to_owned(),
            event_data: d["eventData"].clone(),
        });
    }
}
