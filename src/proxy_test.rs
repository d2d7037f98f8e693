use super::*;
use axum::Router;
use axum::http::Request as HttpRequest;
use axum::routing::get;
use serde_json::{Value, json};
use tokio::net::TcpListener;

fn rule(target: &str) -> ProxyRule {
    ProxyRule {
        prefix: "/api".into(),
        target: Url::parse(target).unwrap(),
        change_origin: true,
        strip_prefix: false,
        timeout: Duration::from_secs(5),
    }
}

/// Upstream that reports what it received as JSON.
async fn echo(request: Request) -> axum::Json<Value> {
    let (parts, body) = request.into_parts();
    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    axum::Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "host": header("host"),
        "origin": header("origin"),
        "x_custom": header("x-custom"),
        "x_private": header("x-private"),
        "keep_alive": header("keep-alive"),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn spawn_upstream(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn forward_json(client: &ProxyClient, request: Request) -> (StatusCode, Value) {
    let response = client.forward(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// =============================================================================
// RULE
// =============================================================================

#[test]
fn matches_uses_plain_prefix() {
    let r = rule("http://localhost:8000");
    assert!(r.matches("/api"));
    assert!(r.matches("/api/anything"));
    assert!(r.matches("/apix"));
    assert!(!r.matches("/"));
    assert!(!r.matches("/ap"));
    assert!(!r.matches("/v1/api"));
}

#[test]
fn upstream_url_preserves_path_and_query() {
    let r = rule("http://localhost:8000");
    assert_eq!(r.upstream_url("/api/anything").as_str(), "http://localhost:8000/api/anything");
    assert_eq!(
        r.upstream_url("/api/transactions?page=2&size=10").as_str(),
        "http://localhost:8000/api/transactions?page=2&size=10"
    );
}

#[test]
fn upstream_url_strips_prefix_when_asked() {
    let mut r = rule("http://localhost:8000");
    r.strip_prefix = true;
    assert_eq!(r.upstream_url("/api/users/me").as_str(), "http://localhost:8000/users/me");
    assert_eq!(r.upstream_url("/api").as_str(), "http://localhost:8000/");
    assert_eq!(r.upstream_url("/api?x=1").as_str(), "http://localhost:8000/?x=1");
}

#[test]
fn origin_and_authority_follow_target() {
    let r = rule("http://localhost:8000");
    assert_eq!(r.origin(), "http://localhost:8000");
    assert_eq!(r.authority(), "localhost:8000");

    let r = rule("https://api.example.test");
    assert_eq!(r.origin(), "https://api.example.test");
    assert_eq!(r.authority(), "api.example.test");
}

#[test]
fn strip_hop_by_hop_removes_connection_listed_headers() {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
    headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
    headers.insert("x-private", HeaderValue::from_static("secret"));
    headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    strip_hop_by_hop(&mut headers);

    assert_eq!(headers.len(), 1);
    assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");
}

#[test]
fn change_origin_rewrites_host_and_origin() {
    let client = ProxyClient::new(rule("http://localhost:8000")).unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
    headers.insert(header::ORIGIN, HeaderValue::from_static("http://localhost:3000"));

    let out = client.upstream_headers(headers);
    assert_eq!(out.get(header::HOST).unwrap(), "localhost:8000");
    assert_eq!(out.get(header::ORIGIN).unwrap(), "http://localhost:8000");
}

#[test]
fn change_origin_does_not_invent_origin_header() {
    let client = ProxyClient::new(rule("http://localhost:8000")).unwrap();
    let out = client.upstream_headers(HeaderMap::new());
    assert!(out.get(header::ORIGIN).is_none());
    assert_eq!(out.get(header::HOST).unwrap(), "localhost:8000");
}

#[test]
fn without_change_origin_headers_pass_through() {
    let mut r = rule("http://localhost:8000");
    r.change_origin = false;
    let client = ProxyClient::new(r).unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
    headers.insert(header::ORIGIN, HeaderValue::from_static("http://localhost:3000"));

    let out = client.upstream_headers(headers);
    assert_eq!(out.get(header::HOST).unwrap(), "localhost:3000");
    assert_eq!(out.get(header::ORIGIN).unwrap(), "http://localhost:3000");
}

#[test]
fn error_statuses() {
    assert_eq!(ProxyError::Connect("refused".into()).status(), StatusCode::BAD_GATEWAY);
    assert_eq!(ProxyError::Request("reset".into()).status(), StatusCode::BAD_GATEWAY);
    assert_eq!(ProxyError::Timeout(Duration::from_secs(1)).status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(ProxyError::BodyTooLarge { limit: MAX_BODY_BYTES }.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(ProxyError::RequestBody("aborted".into()).status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// FORWARDING
// =============================================================================

#[tokio::test]
async fn forward_relays_request_to_upstream() {
    let target = spawn_upstream(Router::new().fallback(echo)).await;
    let client = ProxyClient::new(rule(&target)).unwrap();
    let authority = target.trim_start_matches("http://").to_string();

    let request = HttpRequest::builder()
        .method("POST")
        .uri("/api/anything?x=1")
        .header("host", "localhost:3000")
        .header("origin", "http://localhost:3000")
        .header("x-custom", "kept")
        .header("connection", "x-private")
        .header("x-private", "dropped")
        .body(Body::from("payload"))
        .unwrap();

    let (status, seen) = forward_json(&client, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["path"], "/api/anything");
    assert_eq!(seen["query"], "x=1");
    assert_eq!(seen["host"], authority.as_str());
    assert_eq!(seen["origin"], target.as_str());
    assert_eq!(seen["x_custom"], "kept");
    assert_eq!(seen["x_private"], Value::Null);
    assert_eq!(seen["body"], "payload");
}

#[tokio::test]
async fn forward_relays_upstream_status_and_headers() {
    let upstream = Router::new().route(
        "/api/missing",
        get(|| async { (StatusCode::NOT_FOUND, [("x-upstream", "yes")], "User not found") }),
    );
    let target = spawn_upstream(upstream).await;
    let client = ProxyClient::new(rule(&target)).unwrap();

    let request = HttpRequest::builder().uri("/api/missing").body(Body::empty()).unwrap();
    let response = client.forward(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "yes");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"User not found");
}

#[tokio::test]
async fn forward_does_not_follow_redirects() {
    let upstream = Router::new().route(
        "/api/old",
        get(|| async { (StatusCode::TEMPORARY_REDIRECT, [("location", "/api/new")]) }),
    );
    let target = spawn_upstream(upstream).await;
    let client = ProxyClient::new(rule(&target)).unwrap();

    let request = HttpRequest::builder().uri("/api/old").body(Body::empty()).unwrap();
    let response = client.forward(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers().get("location").unwrap(), "/api/new");
}

#[tokio::test]
async fn forward_reports_unreachable_upstream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ProxyClient::new(rule(&format!("http://{addr}"))).unwrap();
    let request = HttpRequest::builder().uri("/api/health").body(Body::empty()).unwrap();
    let err = client.forward(request).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn forward_times_out_slow_upstream() {
    let upstream = Router::new().route(
        "/api/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "late"
        }),
    );
    let target = spawn_upstream(upstream).await;
    let mut r = rule(&target);
    r.timeout = Duration::from_millis(200);
    let client = ProxyClient::new(r).unwrap();

    let request = HttpRequest::builder().uri("/api/slow").body(Body::empty()).unwrap();
    let err = client.forward(request).await.unwrap_err();
    assert!(matches!(err, ProxyError::Timeout(_)));
    assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn forward_rejects_oversized_body() {
    let target = spawn_upstream(Router::new().fallback(echo)).await;
    let client = ProxyClient::new(rule(&target)).unwrap();

    let request = HttpRequest::builder()
        .method("POST")
        .uri("/api/upload")
        .body(Body::from(vec![b'x'; MAX_BODY_BYTES + 1]))
        .unwrap();
    let err = client.forward(request).await.unwrap_err();
    assert!(matches!(err, ProxyError::BodyTooLarge { limit: MAX_BODY_BYTES }));
    assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn forward_accepts_body_at_limit() {
    let target = spawn_upstream(Router::new().fallback(echo)).await;
    let client = ProxyClient::new(rule(&target)).unwrap();

    let request = HttpRequest::builder()
        .method("POST")
        .uri("/api/upload")
        .body(Body::from(vec![b'x'; MAX_BODY_BYTES]))
        .unwrap();
    let (status, seen) = forward_json(&client, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen["body"].as_str().map(str::len), Some(MAX_BODY_BYTES));
}

#[tokio::test]
async fn forward_maps_broken_body_stream_to_bad_request() {
    let target = spawn_upstream(Router::new().fallback(echo)).await;
    let client = ProxyClient::new(rule(&target)).unwrap();

    let chunks: Vec<Result<axum::body::Bytes, std::io::Error>> = vec![
        Ok(axum::body::Bytes::from_static(b"partial")),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
    ];
    let request = HttpRequest::builder()
        .method("POST")
        .uri("/api/upload")
        .body(Body::from_stream(futures::stream::iter(chunks)))
        .unwrap();
    let err = client.forward(request).await.unwrap_err();
    assert!(matches!(err, ProxyError::RequestBody(_)));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}
