use agri_digest::{DigestError, FetchConfig, Fetcher};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Hits {
    flaky: AtomicUsize,
    throttled: AtomicUsize,
    down: AtomicUsize,
    missing: AtomicUsize,
}

type Shared = Arc<Hits>;

async fn flaky(State(hits): State<Shared>) -> (StatusCode, &'static str) {
    if hits.flaky.fetch_add(1, Ordering::SeqCst) == 0 {
        (StatusCode::SERVICE_UNAVAILABLE, "busy")
    } else {
        (StatusCode::OK, "wheat prices")
    }
}

async fn throttled(State(hits): State<Shared>) -> (StatusCode, &'static str) {
    if hits.throttled.fetch_add(1, Ordering::SeqCst) == 0 {
        (StatusCode::TOO_MANY_REQUESTS, "slow down")
    } else {
        (StatusCode::OK, "barley prices")
    }
}

async fn down(State(hits): State<Shared>) -> StatusCode {
    hits.down.fetch_add(1, Ordering::SeqCst);
    StatusCode::BAD_GATEWAY
}

async fn missing(State(hits): State<Shared>) -> StatusCode {
    hits.missing.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn spawn_server() -> (SocketAddr, Shared) {
    let hits = Shared::default();
    let app = Router::new()
        .route("/flaky", get(flaky))
        .route("/throttled", get(throttled))
        .route("/down", get(down))
        .route("/missing", get(missing))
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn fetcher(max_retries: u32) -> Fetcher {
    Fetcher::new(FetchConfig {
        timeout_seconds: 5,
        max_retries,
        retry_delay_seconds: 0,
        min_host_interval_ms: 0,
        ..FetchConfig::default()
    })
    .unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn server_error_is_retried_until_success() {
    init_tracing();
    let (addr, hits) = spawn_server().await;

    let body = fetcher(2).get_text(&format!("http://{addr}/flaky")).await.unwrap();

    assert_eq!(body, "wheat prices");
    assert_eq!(hits.flaky.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn too_many_requests_is_retried() {
    init_tracing();
    let (addr, hits) = spawn_server().await;

    let body = fetcher(1).get_text(&format!("http://{addr}/throttled")).await.unwrap();

    assert_eq!(body, "barley prices");
    assert_eq!(hits.throttled.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retries_stop_after_max_retries() {
    init_tracing();
    let (addr, hits) = spawn_server().await;

    let err = fetcher(2).get_text(&format!("http://{addr}/down")).await.unwrap_err();

    assert!(matches!(err, DigestError::HttpStatus { status: 502, .. }));
    assert_eq!(hits.down.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_error_fails_without_retry() {
    init_tracing();
    let (addr, hits) = spawn_server().await;

    let err = fetcher(3).get_text(&format!("http://{addr}/missing")).await.unwrap_err();

    assert!(matches!(err, DigestError::HttpStatus { status: 404, .. }));
    assert_eq!(hits.missing.load(Ordering::SeqCst), 1);
}
