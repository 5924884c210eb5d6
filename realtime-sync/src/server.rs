use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt, future};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    broker::Broker,
    dispatch::Dispatcher,
    message::render_error,
    session::{Inbound, Session},
    store::Store,
};

pub const DEFAULT_WS_PATH: &str = "/ws";

#[derive(Clone)]
struct AppState {
    broker: Arc<Broker>,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

pub struct Server {
    listener: TcpListener,
    state: AppState,
    ws_path: String,
}

impl Server {
    pub fn new(listener: TcpListener, store: Arc<Store>) -> Self {
        Self {
            listener,
            state: AppState {
                broker: Arc::new(Broker::new()),
                dispatcher: Arc::new(Dispatcher::new(store)),
                shutdown: CancellationToken::new(),
            },
            ws_path: DEFAULT_WS_PATH.to_string(),
        }
    }

    pub fn with_ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn broker(&self) -> Arc<Broker> {
        Arc::clone(&self.state.broker)
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Server {
            listener,
            state,
            ws_path,
        } = self;
        let app = router(state.clone(), &ws_path);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                handle_shutdown(&state);
            })
            .await
            .context("http server failed")
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn router(state: AppState, ws_path: &str) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route(ws_path, get(ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn handle_shutdown(state: &AppState) {
    info!("server shutting down");
    // Best effort: sessions are cancelled right after and do not wait for
    // their queues to drain.
    state
        .broker
        .publish_all(render_error("server shutting down"));
    state.shutdown.cancel();
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();

    let outbound =
        sink.with(|body: String| future::ready(Ok::<_, axum::Error>(WsMessage::Text(body))));

    let inbound = stream
        .take_while(|frame| future::ready(matches!(frame, Ok(msg) if !matches!(msg, WsMessage::Close(_)))))
        .filter_map(|frame| future::ready(to_inbound(frame)))
        .boxed();

    let session = Session::new(
        state.broker,
        state.dispatcher,
        state.shutdown.child_token(),
    );
    if let Err(err) = session.run(inbound, outbound).await {
        warn!(error = %err, "session could not start");
    }
}

fn to_inbound(frame: Result<WsMessage, axum::Error>) -> Option<Inbound> {
    match frame {
        Ok(WsMessage::Text(text)) => Some(Inbound::Text(text)),
        Ok(WsMessage::Binary(_)) => Some(Inbound::Unsupported("binary frames are not supported")),
        // Pings are answered by axum; pongs carry nothing for us.
        _ => None,
    }
}
