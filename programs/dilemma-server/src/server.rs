//! WebSocket transport and the tic loop

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use crate::audit::{AuditLog, CsvSink, EventSink};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, ServerEvent, Settings};
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    events: mpsc::UnboundedSender<ServerEvent>,
    next_conn: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(events: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            events,
            next_conn: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    let audit = open_audit(&config).context("failed to open audit logs")?;
    let dispatcher = Dispatcher::new(Settings::from(&config), audit);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let actor = tokio::spawn(run_dispatcher(dispatcher, events_rx, config.timings().poll));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "experiment server listening");

    axum::serve(
        listener,
        router(AppState::new(events_tx)).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    actor.abort();
    info!("experiment server stopped");
    Ok(())
}

/// Single owner of all session state
pub async fn run_dispatcher(
    mut dispatcher: Dispatcher,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    poll: Duration,
) {
    let mut interval = time::interval(poll);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => dispatcher.handle_event(event, Instant::now()),
                None => break,
            },
            _ = interval.tick() => dispatcher.tick(Instant::now()),
        }
    }
}

fn open_audit(config: &Config) -> Result<AuditLog, ServerError> {
    let info = open_sink(config.info_log_path().as_deref())?;
    let game = open_sink(config.game_log_path().as_deref())?;
    Ok(AuditLog::new(info, game))
}

fn open_sink(path: Option<&Path>) -> Result<Option<Box<dyn EventSink>>, ServerError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let sink: Box<dyn EventSink> = Box::new(CsvSink::open(path)?);
    info!(path = %path.display(), "audit log opened");
    Ok(Some(sink))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let conn = state.next_conn.fetch_add(1, Ordering::Relaxed);
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    if state.events.send(ServerEvent::Opened { conn, addr, tx }).is_err() {
        return;
    }

    let write_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if state.events.send(ServerEvent::Text { conn, text }).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(conn, %addr, %err, "websocket error");
                break;
            }
        }
    }

    let _ = state.events.send(ServerEvent::Closed { conn });
    write_task.abort();
}

async fn healthz() -> &'static str {
    "ok"
}
