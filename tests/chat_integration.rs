use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde_json::{Value, json};

use koc_support_chat::api::{ChatCompletionRequest, CompletionClient};
use koc_support_chat::controller::{ChatController, ControllerOptions, DEFAULT_FALLBACK_MESSAGE};
use koc_support_chat::diagnostics::{self, Diagnostic};
use koc_support_chat::error::{ClientError, SubmitError};
use koc_support_chat::markdown::format_message;
use koc_support_chat::normalized::UiEvent;
use koc_support_chat::notify::ToastKind;
use koc_support_chat::session::Sender;
use koc_support_chat::stats::StatsView;

const STREAMED_FRAGMENTS: [&str; 3] = ["Xin ", "chào **bạn**", "\n• Step one"];

// Serve `app` on an ephemeral port and return its base URL.
async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn delta(content: &str) -> String {
    format!(
        "data: {}\n",
        json!({ "choices": [{ "delta": { "content": content } }] })
    )
}

// SSE body for the streamed reply, cut in the middle of "à".
fn streamed_body() -> Vec<Vec<u8>> {
    let mut body = String::new();
    body.push_str(&delta(STREAMED_FRAGMENTS[0]));
    body.push('\n');
    body.push_str("data: not json\n");
    body.push_str(": keep-alive comment\n");
    body.push_str(&delta(STREAMED_FRAGMENTS[1]).replacen("data: ", "data:", 1));
    body.push_str("data: {\"choices\":[{\"delta\":{}}]}\n");
    body.push_str(&delta(STREAMED_FRAGMENTS[2]));
    body.push_str("data: [DONE]\n");
    body.push_str(&delta("ignored after done"));

    let bytes = body.into_bytes();
    let split = body_split_point(&bytes);
    vec![bytes[..split].to_vec(), bytes[split..].to_vec()]
}

fn body_split_point(bytes: &[u8]) -> usize {
    let needle = "à".as_bytes();
    bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + 1)
        .unwrap()
}

async fn completions(Json(req): Json<ChatCompletionRequest>) -> Response {
    assert_eq!(req.messages.len(), 1);
    assert_eq!(req.messages[0].role, "user");

    if req.stream {
        let chunks = streamed_body().into_iter().map(Ok::<_, Infallible>);
        Response::builder()
            .header("content-type", "text/event-stream")
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap()
    } else {
        Json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "**Hi** there" } }]
        }))
        .into_response()
    }
}

fn completion_service() -> Router {
    Router::new()
        .route("/chat/completions", post(completions))
        .route(
            "/stats",
            get(|| async {
                Json(json!({ "total_documents": 42, "supported_topics": 7, "accuracy": "" }))
            }),
        )
        .route(
            "/health",
            get(|| async { Json(json!({ "status": "ok", "timestamp": "2025-01-01T00:00:00Z" })) }),
        )
        .route(
            "/models",
            get(|| async {
                Json(json!({ "data": [{ "id": "koc-assistant" }, { "id": "koc-small" }] }))
            }),
        )
}

fn failing_service() -> Router {
    Router::new().route(
        "/chat/completions",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    )
}

// Streams one fragment, then drops the connection mid-body.
fn interrupted_service() -> Router {
    Router::new().route(
        "/chat/completions",
        post(|| async {
            let head = futures::stream::iter([Ok::<_, std::io::Error>(delta("part").into_bytes())]);
            let cut = futures::stream::once(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Err::<Vec<u8>, _>(std::io::Error::other("connection reset"))
            });
            Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from_stream(head.chain(cut)))
                .unwrap()
        }),
    )
}

fn empty_choices_service() -> Router {
    Router::new().route(
        "/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    )
}

// Ends without `[DONE]` and without a final newline.
fn unterminated_service() -> Router {
    Router::new().route(
        "/chat/completions",
        post(|| async {
            let body = format!("{}{}", delta("a"), delta("b").trim_end_matches('\n'));
            Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from(body))
                .unwrap()
        }),
    )
}

const LONG_REPLY_FRAGMENTS: usize = 300;

// One chunk carrying more fragments than the event channel holds.
fn long_reply_service() -> Router {
    Router::new().route(
        "/chat/completions",
        post(|| async {
            let mut body = delta("x").repeat(LONG_REPLY_FRAGMENTS);
            body.push_str("data: [DONE]\n");
            Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from(body))
                .unwrap()
        }),
    )
}

async fn controller_for(app: Router, streaming: bool) -> ChatController {
    let base = spawn_mock(app).await;
    let client = CompletionClient::new(&base, "koc-assistant").unwrap();
    ChatController::new(
        client,
        ControllerOptions {
            streaming,
            ..ControllerOptions::default()
        },
    )
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}

#[tokio::test]
async fn test_client_stream_yields_fragments_in_order() {
    let base = spawn_mock(completion_service()).await;
    let client = CompletionClient::new(&base, "koc-assistant").unwrap();

    let fragments: Vec<String> = client
        .stream("hi")
        .await
        .unwrap()
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(fragments, STREAMED_FRAGMENTS);
}

#[tokio::test]
async fn test_streamed_exchange() {
    let controller = controller_for(completion_service(), true).await;
    let mut rx = controller.events().subscribe();

    controller.send("  Xin chào  ").await.unwrap();

    let entries = controller.session().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].sender, Sender::User);
    assert_eq!(entries[0].text, "Xin chào");

    let expected = STREAMED_FRAGMENTS.concat();
    let reply = &entries[1];
    assert_eq!(reply.sender, Sender::Bot);
    assert!(!reply.is_typing());
    assert_eq!(reply.text, expected);
    assert_eq!(reply.html, format_message(&expected));
    assert!(reply.time_label.ends_with('s'));
    assert!(!controller.session().is_loading());

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&UiEvent::LoadingChanged { loading: true }));
    assert_eq!(events.last(), Some(&UiEvent::LoadingChanged { loading: false }));

    let updates: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            UiEvent::EntryUpdated { id, html } if *id == reply.id => Some(html),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), STREAMED_FRAGMENTS.len());
    assert_eq!(updates.last().map(|s| s.as_str()), Some(reply.html.as_str()));

    // Typing indicator came and went.
    assert!(events.iter().any(|e| matches!(e, UiEvent::EntryRemoved { .. })));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, UiEvent::EntryTimed { id, .. } if *id == reply.id))
    );
}

#[tokio::test]
async fn test_buffered_exchange() {
    let controller = controller_for(completion_service(), false).await;

    controller.send("hello").await.unwrap();

    let reply = controller.session().last_message().unwrap();
    assert_eq!(reply.sender, Sender::Bot);
    assert_eq!(reply.text, "**Hi** there");
    assert_eq!(reply.html, "<strong>Hi</strong> there");
    assert_eq!(controller.session().message_count(), 2);
}

#[tokio::test]
async fn test_streaming_toggle_switches_mode() {
    let controller = controller_for(completion_service(), true).await;
    controller.set_streaming(false);

    controller.send("hello").await.unwrap();
    assert_eq!(
        controller.session().last_message().unwrap().text,
        "**Hi** there"
    );
}

#[tokio::test]
async fn test_failure_appends_single_fallback() {
    for streaming in [true, false] {
        let controller = controller_for(failing_service(), streaming).await;

        controller.send("hello").await.unwrap();

        let entries = controller.session().entries();
        assert_eq!(entries.len(), 2, "streaming={streaming}");
        assert!(entries.iter().all(|e| !e.is_typing()));
        assert_eq!(entries[1].sender, Sender::Bot);
        assert_eq!(entries[1].text, DEFAULT_FALLBACK_MESSAGE);
        assert!(!controller.session().is_loading());
    }
}

#[tokio::test]
async fn test_second_submission_rejected_while_pending() {
    let controller = controller_for(completion_service(), true).await;

    let pending = controller.begin("first").unwrap();
    assert_eq!(controller.begin("second").unwrap_err(), SubmitError::Busy);
    assert_eq!(controller.session().message_count(), 1);

    controller.run(pending).await;
    assert!(controller.begin("third").is_ok());
}

#[tokio::test]
async fn test_diagnostics() {
    let controller = controller_for(completion_service(), true).await;

    let toast = diagnostics::run(&controller, Diagnostic::Health).await;
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.message, "✅ Health check OK");

    let toast = diagnostics::run(&controller, Diagnostic::Models).await;
    assert_eq!(toast.message, "✅ Found 2 model(s)");

    let toast = diagnostics::run(&controller, Diagnostic::Stats).await;
    assert_eq!(toast.message, "✅ Stats loaded");
    assert_eq!(
        controller.stats().current(),
        StatsView {
            total_documents: "42".to_string(),
            supported_topics: "7".to_string(),
            ..StatsView::default()
        }
    );
    assert_eq!(controller.notifier().active().len(), 3);
}

#[tokio::test]
async fn test_diagnostics_failure() {
    let controller = controller_for(failing_service(), true).await;

    for (diagnostic, message) in [
        (Diagnostic::Health, "❌ Health check failed"),
        (Diagnostic::Models, "❌ Models test failed"),
        (Diagnostic::Stats, "❌ Stats test failed"),
    ] {
        let toast = diagnostics::run(&controller, diagnostic).await;
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.message, message);
    }
    assert_eq!(controller.stats().current(), StatsView::default());
}

#[tokio::test]
async fn test_stats_refresh_failure_keeps_defaults() {
    let controller = controller_for(failing_service(), true).await;
    let client = controller.client().clone();

    assert!(controller.stats().refresh(&client).await.is_err());
    assert_eq!(controller.stats().current(), StatsView::default());

    let value: Value = serde_json::to_value(controller.stats().current()).unwrap();
    assert_eq!(value["accuracy"], "95%");
}

#[tokio::test]
async fn test_interrupted_stream_keeps_partial_reply() {
    let controller = controller_for(interrupted_service(), true).await;

    controller.send("hi").await.unwrap();

    let entries = controller.session().entries();
    let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, ["hi", "part", DEFAULT_FALLBACK_MESSAGE]);
    assert!(entries.iter().all(|e| !e.is_typing()));
    assert_eq!(entries[1].sender, Sender::Bot);
    assert!(!controller.session().is_loading());
}

#[tokio::test]
async fn test_buffered_reply_without_content_falls_back() {
    let controller = controller_for(empty_choices_service(), false).await;

    let err = controller.client().complete("hi").await.unwrap_err();
    assert!(matches!(err, ClientError::MissingContent));

    controller.send("hi").await.unwrap();
    let entries = controller.session().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].text, DEFAULT_FALLBACK_MESSAGE);
}

#[tokio::test]
async fn test_unterminated_final_line_is_read() {
    let controller = controller_for(unterminated_service(), true).await;

    controller.send("hi").await.unwrap();

    let reply = controller.session().last_message().unwrap();
    assert_eq!(reply.sender, Sender::Bot);
    assert_eq!(reply.text, "ab");
}

#[tokio::test]
async fn test_lagging_page_resyncs_with_full_reply() {
    let controller = controller_for(long_reply_service(), true).await;
    let mut feed = Box::pin(controller.ui_feed());

    controller.send("hi").await.unwrap();

    let reply = controller.session().last_message().unwrap();
    assert_eq!(reply.text.len(), LONG_REPLY_FRAGMENTS);

    match feed.next().await {
        Some(UiEvent::Resync(snapshot)) => {
            assert!(snapshot.transcript_html.contains(&format!("id=\"entry-{}\"", reply.id)));
            assert!(snapshot.transcript_html.contains(&reply.html));
            assert!(!snapshot.loading);
        }
        other => panic!("expected resync, got {other:?}"),
    }
}
