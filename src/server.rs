use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::api::CompletionClient;
use crate::config::AppConfig;
use crate::connectivity::ConnectivityStatus;
use crate::controller::ChatController;
use crate::diagnostics::{self, Diagnostic};
use crate::error::SubmitError;
use crate::normalized::UiEvent;
use crate::notify::Toast;
use crate::session::ChatEntry;
use crate::stats::StatsView;
use crate::ui::{ChatPage, render_chat_page};

/// Build the shared state from configuration.
pub fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    let client = CompletionClient::new(&config.completion.base_url, &config.completion.model)?;
    let controller = Arc::new(ChatController::new(client, config.controller_options()));
    Ok(AppState { controller, config })
}

/// Build the router for the widget.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/chat", post(api_chat))
        .route("/api/streaming", post(api_streaming))
        .route("/api/events", get(api_events))
        .route("/api/transcript", get(api_transcript))
        .route("/api/stats", get(api_stats))
        .route("/api/connectivity", post(api_connectivity))
        .route("/api/diagnostics/{kind}", post(api_diagnostic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the stats refresh and health probe loops.
pub fn spawn_background(state: &AppState) -> Vec<JoinHandle<()>> {
    let controller = &state.controller;
    let ui = &state.config.ui;

    let mut tasks = vec![
        controller
            .stats()
            .spawn_refresh(controller.client().clone(), ui.stats_refresh_interval()),
    ];
    if let Some(every) = ui.health_probe_interval() {
        tasks.push(
            controller
                .connectivity()
                .spawn_probe(controller.client().clone(), every),
        );
    }
    tasks
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    info!(
        name: "completion.config.loaded",
        base_url = %config.completion.base_url,
        model = %config.completion.model,
        streaming = config.completion.streaming,
        "Completion service configured"
    );

    let state = build_state(Arc::clone(&config))?;
    let _tasks = spawn_background(&state);
    let app = router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET / - Chat widget page.
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let controller = &state.controller;
    let entries = controller.session().entries();
    let stats = controller.stats().current();

    Html(render_chat_page(&ChatPage {
        title: &state.config.ui.title,
        entries: &entries,
        stats: &stats,
        status: controller.connectivity().status(),
        streaming: controller.session().is_streaming(),
        loading: controller.session().is_loading(),
        quick_questions: &state.config.ui.quick_questions,
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// User message content.
    message: String,
}

/// Response from chat API.
#[derive(Debug, Serialize)]
struct ChatAccepted {
    /// Whether the reply will be streamed.
    streaming: bool,
}

/// POST /api/chat - Submit a message; the reply arrives over `/api/events`.
async fn api_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatAccepted>), (StatusCode, String)> {
    tracing::info!(message_len = req.message.len(), "Received chat request");

    let pending = state
        .controller
        .begin(&req.message)
        .map_err(submit_error_response)?;
    let streaming = pending.streaming();

    let controller = Arc::clone(&state.controller);
    tokio::spawn(async move { controller.run(pending).await });

    Ok((StatusCode::ACCEPTED, Json(ChatAccepted { streaming })))
}

fn submit_error_response(e: SubmitError) -> (StatusCode, String) {
    let status = match e {
        SubmitError::Empty => StatusCode::BAD_REQUEST,
        SubmitError::Busy => StatusCode::CONFLICT,
    };
    (status, e.to_string())
}

#[derive(Debug, Serialize, Deserialize)]
struct StreamingToggle {
    enabled: bool,
}

/// POST /api/streaming - Flip the streaming toggle.
async fn api_streaming(
    State(state): State<AppState>,
    Json(req): Json<StreamingToggle>,
) -> Json<StreamingToggle> {
    state.controller.set_streaming(req.enabled);
    Json(StreamingToggle {
        enabled: state.controller.session().is_streaming(),
    })
}

/// GET /api/events - SSE feed of UI events.
async fn api_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    let feed = state.controller.ui_feed();
    tracing::debug!(
        subscribers = state.controller.events().subscriber_count(),
        "UI event subscriber connected"
    );

    let stream = feed.map(|event| Ok(sse_event(&event)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn sse_event(event: &UiEvent) -> Event {
    Event::default().event(event.name()).data(event.payload())
}

/// GET /api/transcript - Current transcript entries.
async fn api_transcript(State(state): State<AppState>) -> Json<Vec<ChatEntry>> {
    Json(state.controller.session().entries())
}

/// GET /api/stats - Current sidebar values.
async fn api_stats(State(state): State<AppState>) -> Json<StatsView> {
    Json(state.controller.stats().current())
}

#[derive(Debug, Deserialize)]
struct ConnectivityReport {
    online: bool,
}

#[derive(Debug, Serialize)]
struct ConnectivityState {
    status: ConnectivityStatus,
    changed: bool,
}

/// POST /api/connectivity - Browser online/offline transition.
async fn api_connectivity(
    State(state): State<AppState>,
    Json(report): Json<ConnectivityReport>,
) -> Json<ConnectivityState> {
    let status = ConnectivityStatus::from_online(report.online);
    let changed = state.controller.connectivity().report(status);
    Json(ConnectivityState { status, changed })
}

/// POST /api/diagnostics/:kind - Run a test call and return the toast shown.
async fn api_diagnostic(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Toast>, (StatusCode, String)> {
    let diagnostic: Diagnostic = kind
        .parse()
        .map_err(|e: String| (StatusCode::NOT_FOUND, e))?;
    Ok(Json(diagnostics::run(&state.controller, diagnostic).await))
}
