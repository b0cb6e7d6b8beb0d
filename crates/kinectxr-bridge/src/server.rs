//! Bridge server: websocket endpoint, client registry, and stream
//! lifecycle coupling.
//!
//! Device streams are demand-started: the first client connect starts
//! them, the last disconnect stops them (mock mode bypasses both). Each
//! client gets an unbounded channel drained by a forwarder task, so the
//! broadcaster thread can push binary frames without touching the socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use kinectxr_common::protocol::{ClientMessage, ErrorCode, ServerMessage};
use kinectxr_common::FrameCache;
use kinectxr_device::KinectDriver;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::broadcast;
use crate::motor::{self, MotorGateway};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub port: u16,
    pub mock: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: 8765,
            mock: false,
        }
    }
}

pub(crate) struct ClientEntry {
    pub tx: mpsc::UnboundedSender<Message>,
    pub rgb: bool,
    pub depth: bool,
}

#[derive(Default)]
pub(crate) struct StreamStats {
    pub frames_sent: AtomicU32,
    pub dropped_frames: AtomicU32,
    pub rgb_frames: AtomicU32,
    pub depth_frames: AtomicU32,
}

pub(crate) struct BridgeState {
    pub mock: bool,
    pub frame_cache: Arc<FrameCache>,
    pub stats: Arc<StreamStats>,
    pub device: Option<Mutex<Box<dyn KinectDriver>>>,
    pub motor: MotorGateway,
    pub clients: Mutex<HashMap<u64, ClientEntry>>,
    next_client_id: AtomicU64,
    pub broadcast_running: AtomicBool,
}

impl BridgeState {
    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("client map poisoned").len()
    }

    fn start_device_streams(&self) {
        if self.mock {
            return;
        }
        let Some(device) = &self.device else { return };
        info!("starting sensor streams (first client connected)");
        let mut device = device.lock().expect("device mutex poisoned");
        if let Err(error) = device.start_streams() {
            warn!("failed to start sensor streams: {error}");
        }
    }

    fn stop_device_streams(&self) {
        if self.mock {
            return;
        }
        let Some(device) = &self.device else { return };
        info!("stopping sensor streams (no clients connected)");
        let mut device = device.lock().expect("device mutex poisoned");
        if let Err(error) = device.stop_streams() {
            warn!("failed to stop sensor streams: {error}");
        }
    }
}

/// Websocket bridge server. Construct, `start`, and eventually `stop`.
pub struct BridgeServer {
    config: BridgeConfig,
    state: Arc<BridgeState>,
    server_task: Option<tokio::task::JoinHandle<()>>,
    broadcast_thread: Option<std::thread::JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl BridgeServer {
    /// In mock mode pass no driver; otherwise the driver must already be
    /// open (the daemon opens it before handing it over). Its frame
    /// callbacks are wired into the bridge's own frame cache here.
    pub fn new(config: BridgeConfig, driver: Option<Box<dyn KinectDriver>>) -> Self {
        let frame_cache = Arc::new(FrameCache::new());
        let stats = Arc::new(StreamStats::default());

        let device = driver.map(|mut driver| {
            let cache = Arc::clone(&frame_cache);
            let counters = Arc::clone(&stats);
            driver.set_depth_callback(Arc::new(move |bytes, timestamp| {
                cache.store_depth(bytes, timestamp);
                counters.depth_frames.fetch_add(1, Ordering::Relaxed);
            }));

            let cache = Arc::clone(&frame_cache);
            let counters = Arc::clone(&stats);
            driver.set_video_callback(Arc::new(move |bytes, timestamp| {
                cache.store_rgb(bytes, timestamp);
                counters.rgb_frames.fetch_add(1, Ordering::Relaxed);
            }));

            Mutex::new(driver)
        });

        let state = Arc::new(BridgeState {
            mock: config.mock,
            frame_cache,
            stats,
            device,
            motor: MotorGateway::new(),
            clients: Mutex::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
            broadcast_running: AtomicBool::new(false),
        });

        Self {
            config,
            state,
            server_task: None,
            broadcast_thread: None,
            local_addr: None,
        }
    }

    /// Bind the listener, start serving websocket upgrades on `/kinect`,
    /// and spawn the broadcaster thread. Returns the bound address (useful
    /// with port 0).
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        if self.server_task.is_some() {
            anyhow::bail!("bridge server already running");
        }

        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .with_context(|| format!("failed to bind port {}", self.config.port))?;
        let addr = listener.local_addr()?;

        let app = Router::new()
            .route("/kinect", get(ws_handler))
            .with_state(Arc::clone(&self.state));

        self.server_task = Some(tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app).await {
                warn!("bridge server terminated: {error}");
            }
        }));

        self.state.broadcast_running.store(true, Ordering::SeqCst);
        self.broadcast_thread = Some(broadcast::spawn(Arc::clone(&self.state)));

        info!("bridge server started on port {}", addr.port());
        self.local_addr = Some(addr);
        Ok(addr)
    }

    /// Stop the broadcaster (joined) and the accept loop.
    pub async fn stop(&mut self) {
        self.state.broadcast_running.store(false, Ordering::SeqCst);

        if let Some(thread) = self.broadcast_thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
        if let Some(task) = self.server_task.take() {
            task.abort();
        }
        if self.local_addr.take().is_some() {
            info!("bridge server stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.server_task.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn client_count(&self) -> usize {
        self.state.client_count()
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        self.state.broadcast_running.store(false, Ordering::SeqCst);
        if let Some(task) = self.server_task.take() {
            task.abort();
        }
    }
}

fn text_message(message: &ServerMessage) -> Message {
    Message::Text(serde_json::to_string(message).expect("protocol message serializes"))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BridgeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<BridgeState>) {
    let client_id = state.next_client_id.fetch_add(1, Ordering::SeqCst);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let client_count = {
        let mut clients = state.clients.lock().expect("client map poisoned");
        clients.insert(
            client_id,
            ClientEntry {
                tx: tx.clone(),
                rgb: false,
                depth: false,
            },
        );
        clients.len()
    };
    info!("client connected ({client_count} total)");

    if client_count == 1 {
        state.start_device_streams();
    }

    let (mut sender, mut receiver) = socket.split();

    // Forward everything queued for this client to the socket.
    let forwarder = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Exactly one hello, first.
    let _ = tx.send(text_message(&ServerMessage::hello()));

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(body) => handle_text(&state, client_id, &tx, &body),
            Message::Close(_) => break,
            // Binary frames from clients are not part of the protocol.
            _ => {}
        }
    }

    forwarder.abort();

    let client_count = {
        let mut clients = state.clients.lock().expect("client map poisoned");
        clients.remove(&client_id);
        clients.len()
    };
    info!("client disconnected ({client_count} remaining)");

    if client_count == 0 {
        state.stop_device_streams();
    }
}

fn handle_text(
    state: &BridgeState,
    client_id: u64,
    tx: &mpsc::UnboundedSender<Message>,
    body: &str,
) {
    let message: ClientMessage = match serde_json::from_str(body) {
        Ok(message) => message,
        Err(error) => {
            let _ = tx.send(text_message(&ServerMessage::error(
                ErrorCode::ProtocolError,
                error.to_string(),
                true,
            )));
            return;
        }
    };

    let reply = match message {
        ClientMessage::Subscribe { streams } => {
            set_subscription(state, client_id, &streams);
            None
        }
        ClientMessage::Unsubscribe => {
            set_subscription(state, client_id, &[]);
            None
        }
        ClientMessage::MotorSetTilt { angle } => Some(motor::set_tilt(state, angle)),
        ClientMessage::MotorSetLed { state: led } => Some(motor::set_led(state, &led)),
        ClientMessage::MotorReset => Some(motor::reset(state)),
        ClientMessage::MotorGetStatus => Some(motor::get_status(state)),
    };

    if let Some(reply) = reply {
        let _ = tx.send(text_message(&reply));
    }
}

/// Replace the client's subscription set. Unknown stream names are
/// silently ignored; only `rgb` and `depth` mean anything.
fn set_subscription(state: &BridgeState, client_id: u64, streams: &[String]) {
    let mut clients = state.clients.lock().expect("client map poisoned");
    if let Some(entry) = clients.get_mut(&client_id) {
        entry.rgb = streams.iter().any(|s| s == "rgb");
        entry.depth = streams.iter().any(|s| s == "depth");
        info!(
            "client subscription: rgb={} depth={}",
            entry.rgb, entry.depth
        );
    }
}
