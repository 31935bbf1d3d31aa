//! Test helpers for integration tests.
//!
//! - [`FakeServer`]: a scripted Home Assistant WebSocket endpoint on a random
//!   local port. It runs the auth handshake, records every frame it receives,
//!   answers commands, and lets a test push events or kill connections.
//! - [`RecordingSurface`]: an in-memory display surface that records loads
//!   and scripts.

use display_core::error::SurfaceError;
use display_core::DisplaySurface;

use common::ErrorLocation;

use std::collections::{HashMap, HashSet};
use std::panic::Location;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TEST_TOKEN: &str = "test-token-12345";
pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `check` until it holds or `WAIT` runs out.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================
// FAKE SERVER
// ============================================

/// How the fake server answers.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// `None` accepts any token.
    pub accepted_token: Option<String>,
    /// Command types that never get a reply.
    pub silent: HashSet<String>,
    /// Command types answered with `success: false`.
    pub failing: HashSet<String>,
    /// Result payloads by command type. Anything else echoes the request.
    pub results: HashMap<String, Value>,
}

impl Behavior {
    pub fn accepting(token: &str) -> Self {
        Self {
            accepted_token: Some(token.to_string()),
            ..Self::default()
        }
    }

    pub fn with_result(mut self, kind: &str, result: Value) -> Self {
        self.results.insert(kind.to_string(), result);
        self
    }

    pub fn with_silent(mut self, kind: &str) -> Self {
        self.silent.insert(kind.to_string());
        self
    }

    pub fn with_failing(mut self, kind: &str) -> Self {
        self.failing.insert(kind.to_string());
        self
    }
}

#[derive(Debug, Clone)]
enum Control {
    Frame(Value),
    Binary,
    Kill,
}

#[derive(Default)]
struct ServerShared {
    behavior: Mutex<Behavior>,
    received: Mutex<Vec<Value>>,
    tokens: Mutex<Vec<String>>,
    connections: AtomicUsize,
    close_frames: AtomicUsize,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FakeServer {
    /// `http://127.0.0.1:<port>`
    pub base_url: String,
    /// `ws://127.0.0.1:<port>/api/websocket`
    pub ws_url: String,
    shared: Arc<ServerShared>,
    controls: broadcast::Sender<Control>,
    task: JoinHandle<()>,
}

impl FakeServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake server");
        let port = listener.local_addr().expect("No local address").port();

        let shared = Arc::new(ServerShared {
            behavior: Mutex::new(behavior),
            ..ServerShared::default()
        });
        let (controls, _) = broadcast::channel(64);

        let task = tokio::spawn(accept_loop(listener, Arc::clone(&shared), controls.clone()));

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            ws_url: format!("ws://127.0.0.1:{port}/api/websocket"),
            shared,
            controls,
            task,
        }
    }

    pub fn update(&self, change: impl FnOnce(&mut Behavior)) {
        change(&mut guard(&self.shared.behavior));
    }

    /// Every frame received after authentication, oldest first.
    pub fn received(&self) -> Vec<Value> {
        guard(&self.shared.received).clone()
    }

    pub fn commands_of(&self, kind: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|frame| frame.get("type").and_then(Value::as_str) == Some(kind))
            .collect()
    }

    pub async fn wait_for_command(&self, kind: &str) -> Value {
        eventually(kind, || !self.commands_of(kind).is_empty()).await;
        self.commands_of(kind).remove(0)
    }

    /// Tokens presented in `auth` frames, accepted or not.
    pub fn tokens(&self) -> Vec<String> {
        guard(&self.shared.tokens).clone()
    }

    /// Connections that completed authentication.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Authenticated connections the client ended with a close frame.
    pub fn close_frames(&self) -> usize {
        self.shared.close_frames.load(Ordering::SeqCst)
    }

    pub fn push_event(&self, subscription_id: u64, event: Value) {
        self.push_frame(json!({ "id": subscription_id, "type": "event", "event": event }));
    }

    pub fn push_frame(&self, frame: Value) {
        let _ = self.controls.send(Control::Frame(frame));
    }

    pub fn push_binary(&self) {
        let _ = self.controls.send(Control::Binary);
    }

    /// Drop every live connection without a close frame.
    pub fn kill_connections(&self) {
        let _ = self.controls.send(Control::Kill);
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        let _ = self.controls.send(Control::Kill);
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<ServerShared>,
    controls: broadcast::Sender<Control>,
) {
    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(serve(stream, Arc::clone(&shared), controls.subscribe()));
    }
}

fn text(frame: Value) -> Message {
    Message::Text(frame.to_string().into())
}

async fn serve(stream: TcpStream, shared: Arc<ServerShared>, mut controls: broadcast::Receiver<Control>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();

    let (out, mut outbox) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let _ = out.send(text(json!({ "type": "auth_required", "ha_version": "2025.1.0" })));

    let token = match source.next().await {
        Some(Ok(Message::Text(frame))) => serde_json::from_str::<Value>(frame.as_str())
            .ok()
            .and_then(|auth| auth.get("access_token").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default(),
        _ => {
            writer.abort();
            return;
        }
    };
    guard(&shared.tokens).push(token.clone());

    let accepted = guard(&shared.behavior)
        .accepted_token
        .as_ref()
        .is_none_or(|expected| *expected == token);
    if !accepted {
        let _ = out.send(text(json!({ "type": "auth_invalid", "message": "Invalid access token" })));
        drop(out);
        let _ = writer.await;
        return;
    }

    let _ = out.send(text(json!({ "type": "auth_ok", "ha_version": "2025.1.0" })));
    shared.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            control = controls.recv() => match control {
                Ok(Control::Frame(frame)) => {
                    let _ = out.send(text(frame));
                }
                Ok(Control::Binary) => {
                    let _ = out.send(Message::Binary(vec![1u8, 2, 3].into()));
                }
                Ok(Control::Kill) | Err(broadcast::error::RecvError::Closed) => {
                    writer.abort();
                    return;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(frame))) => answer(&shared, &out, frame.as_str()),
                Some(Ok(Message::Close(_))) => {
                    shared.close_frames.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    drop(out);
    let _ = writer.await;
}

fn answer(shared: &ServerShared, out: &mpsc::UnboundedSender<Message>, frame: &str) {
    let Ok(frame) = serde_json::from_str::<Value>(frame) else {
        return;
    };
    guard(&shared.received).push(frame.clone());

    let id = frame.get("id").cloned().unwrap_or(Value::Null);
    let kind = frame
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let behavior = guard(&shared.behavior).clone();

    if behavior.silent.contains(&kind) {
        return;
    }

    let reply = if kind == "ping" {
        json!({ "id": id, "type": "pong" })
    } else if behavior.failing.contains(&kind) {
        json!({
            "id": id,
            "type": "result",
            "success": false,
            "error": { "code": "test_failure", "message": format!("{kind} refused") },
        })
    } else {
        let result = behavior.results.get(&kind).cloned().unwrap_or(frame.clone());
        json!({ "id": id, "type": "result", "success": true, "result": result })
    };

    match frame.get("delay_ms").and_then(Value::as_u64) {
        Some(delay) => {
            let out = out.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                let _ = out.send(text(reply));
            });
        }
        None => {
            let _ = out.send(text(reply));
        }
    }
}

// ============================================
// RECORDING SURFACE
// ============================================

#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub current: Option<String>,
    pub loads: Vec<String>,
    pub scripts: Vec<String>,
    pub storage: HashMap<String, Value>,
}

#[derive(Default)]
pub struct RecordingSurface {
    log: Mutex<SurfaceLog>,
}

impl RecordingSurface {
    /// Blank view whose local storage already holds `token`.
    pub fn with_token(token: &str) -> Arc<Self> {
        let surface = Self::default();
        surface.set_token(token);
        surface.log().current = Some("about:blank".to_string());
        Arc::new(surface)
    }

    pub fn set_token(&self, token: &str) {
        self.log().storage.insert(
            display_core::HASS_TOKENS_KEY.to_string(),
            Value::String(json!({ "access_token": token, "token_type": "Bearer" }).to_string()),
        );
    }

    pub fn log(&self) -> MutexGuard<'_, SurfaceLog> {
        guard(&self.log)
    }

    pub fn loads(&self) -> Vec<String> {
        self.log().loads.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.log().scripts.clone()
    }
}

impl DisplaySurface for RecordingSurface {
    fn read_local_storage(&self, key: &str) -> Result<Option<Value>, SurfaceError> {
        Ok(self.log().storage.get(key).cloned())
    }

    fn load_url(&self, url: &str) -> Result<(), SurfaceError> {
        if url.is_empty() {
            return Err(SurfaceError::Unavailable {
                message: "empty url".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        let mut log = self.log();
        log.loads.push(url.to_string());
        log.current = Some(url.to_string());
        Ok(())
    }

    fn evaluate_script(&self, script: &str) -> Result<Option<String>, SurfaceError> {
        self.log().scripts.push(script.to_string());
        Ok(None)
    }

    fn current_url(&self) -> Option<String> {
        self.log().current.clone()
    }
}
