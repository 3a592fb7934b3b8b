// tests/summarizer_http.rs
// GroqSummarizer against a local fake of the chat-completions endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use asthra_bot::config::SummarizerSettings;
use asthra_bot::error::SummarizationFailure;
use asthra_bot::summarize::{GroqSummarizer, Summarizer, SummaryClient, SummaryOutcome};

#[derive(Clone, Copy)]
enum Reply {
    Ok(&'static str),
    Status(u16),
    Garbage,
    Slow,
}

#[derive(Clone)]
struct Fake {
    script: Arc<Vec<Reply>>,
    hits: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<(Option<String>, Value)>>>,
}

impl Fake {
    fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Arc::new(script),
            hits: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn completions(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let n = fake.hits.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *fake.last_request.lock().unwrap() = Some((auth, body));

    // The last entry repeats once the script runs out.
    let reply = fake.script[n.min(fake.script.len() - 1)];
    match reply {
        Reply::Ok(text) => Json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        }))
        .into_response(),
        Reply::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            Json(json!({"error": {"message": "nope"}})),
        )
            .into_response(),
        Reply::Garbage => "this is not json".into_response(),
        Reply::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"choices": []})).into_response()
        }
    }
}

async fn spawn(fake: Fake) -> String {
    let router = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/v1/chat/completions")
}

fn settings(api_url: String, max_retries: usize, timeout_secs: u64) -> SummarizerSettings {
    SummarizerSettings {
        api_url,
        max_retries,
        timeout_secs,
        ..SummarizerSettings::default()
    }
}

fn today() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn success_sends_prompt_and_appends_trailer() {
    let fake = Fake::new(vec![Reply::Ok("• Rates unchanged\n• Inflation easing")]);
    let url = spawn(fake.clone()).await;
    let groq = GroqSummarizer::new(&settings(url, 2, 5), "test-key");
    let client = SummaryClient::new(Arc::new(groq), 3900, "Asthra Bot");

    let out = client
        .summarize("RBI holds", "The RBI kept the repo rate at 6.5%.", today())
        .await;
    let SummaryOutcome::Ready(text) = out else {
        panic!("expected a summary, got {out:?}");
    };
    assert!(text.starts_with("• Rates unchanged\n• Inflation easing"));
    assert!(text.ends_with("📅 Date: 06 Sep 2025\n🔁 Powered by Asthra Bot"));
    assert_eq!(fake.hits(), 1);

    let (auth, body) = fake.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(body["model"], SummarizerSettings::default().model);
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("Title: RBI holds"));
    assert!(user.contains("Text: The RBI kept the repo rate at 6.5%."));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let fake = Fake::new(vec![Reply::Status(503), Reply::Status(500), Reply::Ok("• ok")]);
    let url = spawn(fake.clone()).await;
    let groq = GroqSummarizer::new(&settings(url, 2, 5), "k").with_backoff_millis(1);

    let text = groq.summarize("t", "b").await.unwrap();
    assert_eq!(text, "• ok");
    assert_eq!(fake.hits(), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let fake = Fake::new(vec![Reply::Status(502)]);
    let url = spawn(fake.clone()).await;
    let groq = GroqSummarizer::new(&settings(url, 2, 5), "k").with_backoff_millis(1);

    let err = groq.summarize("t", "b").await.unwrap_err();
    assert!(matches!(err, SummarizationFailure::Status { status: 502, .. }), "{err:?}");
    assert_eq!(fake.hits(), 3);
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let fake = Fake::new(vec![Reply::Status(401)]);
    let url = spawn(fake.clone()).await;
    let groq = GroqSummarizer::new(&settings(url, 3, 5), "bad").with_backoff_millis(1);

    let err = groq.summarize("t", "b").await.unwrap_err();
    assert!(matches!(err, SummarizationFailure::Status { status: 401, .. }), "{err:?}");
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn malformed_body_becomes_placeholder() {
    let fake = Fake::new(vec![Reply::Garbage]);
    let url = spawn(fake.clone()).await;
    let groq = GroqSummarizer::new(&settings(url, 2, 5), "k").with_backoff_millis(1);
    let client = SummaryClient::new(Arc::new(groq), 3900, "Asthra Bot");

    let out = client.summarize("t", "b", today()).await;
    assert!(out.is_failure());
    assert!(out.text().starts_with("⚠️ Summarization failed."));
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn empty_choices_become_placeholder() {
    let fake = Fake::new(vec![Reply::Ok("   ")]);
    let url = spawn(fake.clone()).await;
    let groq = GroqSummarizer::new(&settings(url, 0, 5), "k");
    let client = SummaryClient::new(Arc::new(groq), 3900, "Asthra Bot");

    let out = client.summarize("t", "b", today()).await;
    assert!(out.is_failure());
    assert!(out.text().contains("empty"));
}

#[tokio::test]
async fn slow_service_times_out_into_placeholder() {
    let fake = Fake::new(vec![Reply::Slow]);
    let url = spawn(fake.clone()).await;
    let groq = GroqSummarizer::new(&settings(url, 0, 1), "k");
    let client = SummaryClient::new(Arc::new(groq), 3900, "Asthra Bot");

    let out = client.summarize("t", "b", today()).await;
    assert!(out.is_failure());
    assert!(out.text().contains("timed out"), "{}", out.text());
}

#[tokio::test]
async fn long_output_is_trimmed_before_trailer() {
    static LONG: once_cell::sync::Lazy<String> = once_cell::sync::Lazy::new(|| "x".repeat(50));
    let fake = Fake::new(vec![Reply::Ok(LONG.as_str())]);
    let url = spawn(fake).await;
    let groq = GroqSummarizer::new(&settings(url, 0, 5), "k");
    let client = SummaryClient::new(Arc::new(groq), 20, "Asthra Bot");

    let out = client.summarize("t", "b", today()).await;
    let text = out.text();
    assert!(text.starts_with(&format!("{}\n\n(Trimmed for Telegram)", "x".repeat(20))));
    assert!(text.ends_with("Powered by Asthra Bot"));
}
