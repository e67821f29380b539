//! Form submission endpoint.
//!
//! Guards run in a fixed order and the first one that fails ends the request:
//! method → origin → content type → rate limit → body rules → bot
//! verification → persistence. Nothing after a failed step has side effects.

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::form::parse_submission;
use crate::gate::{client_key, is_json_content_type, normalize_origin, origin_allowed};
use crate::ratelimit::RateDecision;
use crate::state::AppState;
use crate::verify::evaluate;
use formgate_common::constants::CORS_MAX_AGE_SECS;
use formgate_common::{GatewayError, Submission, SubmitResponse};

const ALLOWED_METHODS: &str = "POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

/// Handle one request on the submission path
pub async fn submit(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let allowed_origin = normalize_origin(&state.config.allowed_origin).to_string();

    if parts.method == Method::OPTIONS {
        return preflight(&allowed_origin);
    }
    if parts.method != Method::POST {
        tracing::debug!(method = %parts.method, "Rejected non-POST submission");
        return failure_response(&GatewayError::MethodNotAllowed);
    }

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(&parts.headers, peer);

    let deadline = state.config.request_timeout();
    let outcome = tokio::time::timeout(deadline, process(&state, &parts.headers, &client, body))
        .await
        .unwrap_or(Err(GatewayError::TimedOut(deadline.as_secs())));

    let mut response = match outcome {
        Ok(()) => (StatusCode::OK, Json(SubmitResponse::success())).into_response(),
        Err(err) => {
            log_rejection(&err, &client);
            failure_response(&err)
        }
    };

    set_cors_headers(response.headers_mut(), &allowed_origin);
    response
}

async fn process(
    state: &AppState,
    headers: &HeaderMap,
    client: &str,
    body: Body,
) -> Result<(), GatewayError> {
    if !origin_allowed(headers, &state.config.allowed_origin) {
        return Err(GatewayError::ForbiddenOrigin);
    }

    if !is_json_content_type(headers) {
        return Err(GatewayError::BadContentType);
    }

    match state.rate_limiter.check(client).await? {
        RateDecision::Allowed { remaining } => {
            tracing::debug!(client = %client, remaining, "Rate limit check passed");
        }
        RateDecision::Limited => return Err(GatewayError::RateLimited),
    }

    let bytes = axum::body::to_bytes(body, state.config.body_limit_bytes)
        .await
        .map_err(|_| GatewayError::validation("Request body is too large"))?;

    let submission = parse_submission(&bytes, &state.schema)?;

    let verification = state.verifier.verify(&submission.token, Some(client)).await?;
    evaluate(&verification, state.config.verification.min_score)?;

    let row = submission.to_row(&Submission::timestamp_now());
    state.sink.append(row).await?;

    tracing::info!(client = %client, score = verification.score, "Submission stored");
    Ok(())
}

fn failure_response(err: &GatewayError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(SubmitResponse::failure(err.public_message()))).into_response()
}

fn log_rejection(err: &GatewayError, client: &str) {
    match err {
        e if e.is_internal() => {
            tracing::error!(client = %client, error = %e, "Submission failed");
        }
        GatewayError::RateLimited | GatewayError::ForbiddenOrigin => {
            tracing::warn!(client = %client, reason = %err, "Submission rejected");
        }
        _ => {
            tracing::debug!(client = %client, reason = %err, "Submission rejected");
        }
    }
}

/// CORS preflight: fixed methods, headers and max-age
fn preflight(allowed_origin: &str) -> Response {
    let mut response = StatusCode::OK.into_response();
    set_cors_headers(response.headers_mut(), allowed_origin);
    response.headers_mut().insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from(CORS_MAX_AGE_SECS),
    );
    response
}

fn set_cors_headers(headers: &mut HeaderMap, allowed_origin: &str) {
    if let Ok(origin) = HeaderValue::from_str(allowed_origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::persist::RowSink;
    use crate::ratelimit::MemoryRateLimitStore;
    use crate::routes::create_router;
    use crate::verify::{BotVerifier, RecaptchaVerifier};
    use async_trait::async_trait;
    use axum::Router;
    use formgate_common::VerificationResult;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    const ORIGIN: &str = "https://charityaron.vercel.app";

    struct StubVerifier {
        result: VerificationResult,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BotVerifier for StubVerifier {
        async fn verify(&self, token: &str, _: Option<&str>) -> Result<VerificationResult, GatewayError> {
            assert_eq!(token, "token-abc");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        rows: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl RowSink for RecordingSink {
        async fn append(&self, row: Vec<String>) -> Result<(), GatewayError> {
            if self.fail {
                return Err(GatewayError::PersistenceFailed("HTTP 403 Forbidden".into()));
            }
            self.rows.lock().unwrap().push(row);
            Ok(())
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    struct Harness {
        app: Router,
        verifier: Arc<StubVerifier>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn new(result: VerificationResult) -> Self {
            Self::build(result, RecordingSink::default(), Duration::from_secs(3600))
        }

        fn build(result: VerificationResult, sink: RecordingSink, window: Duration) -> Self {
            let verifier = Arc::new(StubVerifier {
                result,
                calls: AtomicUsize::new(0),
            });
            let sink = Arc::new(sink);
            let limiter = Arc::new(MemoryRateLimitStore::new(5, window));
            let state = AppState::with_parts(
                AppConfig::default(),
                limiter,
                verifier.clone(),
                sink.clone(),
            );
            Self {
                app: create_router(state),
                verifier,
                sink,
            }
        }

        async fn send(&self, request: axum::http::Request<Body>) -> (StatusCode, HeaderMap, Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, headers, body)
        }

        fn rows(&self) -> Vec<Vec<String>> {
            self.sink.rows.lock().unwrap().clone()
        }
    }

    fn valid_body() -> Value {
        json!({
            "fullName": "  Ada <b>Lovelace</b> ",
            "phone": "(555) 123-4567",
            "knowledge": "Intermediate onclick=steal()",
            "confirmation": "javascript:Yes",
            "recaptchaToken": "token-abc"
        })
    }

    fn post(body: &Value) -> axum::http::Request<Body> {
        post_from("203.0.113.7", body)
    }

    fn post_from(ip: &str, body: &Value) -> axum::http::Request<Body> {
        axum::http::Request::post("/api/submit")
            .header("origin", ORIGIN)
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepted_submission_persists_sanitized_row() {
        let h = Harness::new(VerificationResult::passed(0.9));

        let (status, headers, body) = h.send(post(&valid_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);

        let rows = h.rows();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(chrono::DateTime::parse_from_rfc3339(&row[0]).is_ok());
        assert_eq!(
            &row[1..],
            ["Ada bLovelace/b", "(555) 123-4567", "Intermediate steal()", "Yes"]
        );
    }

    #[tokio::test]
    async fn test_missing_origin_is_forbidden_regardless_of_body() {
        let h = Harness::new(VerificationResult::passed(0.9));

        for body in [valid_body(), json!({})] {
            let request = axum::http::Request::post("/api/submit")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let (status, _, body) = h.send(request).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body, json!({ "ok": false, "error": "Forbidden origin" }));
        }

        let request = axum::http::Request::post("/api/submit")
            .header("origin", "https://evil.example")
            .header("content-type", "application/json")
            .body(Body::from(valid_body().to_string()))
            .unwrap();
        let (status, _, _) = h.send(request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        assert!(h.rows().is_empty());
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preflight() {
        let h = Harness::new(VerificationResult::passed(0.9));
        let request = axum::http::Request::options("/api/submit")
            .header("origin", ORIGIN)
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = h.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let h = Harness::new(VerificationResult::passed(0.9));
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let request = axum::http::Request::builder()
                .method(method)
                .uri("/api/submit")
                .header("origin", ORIGIN)
                .body(Body::empty())
                .unwrap();
            let (status, _, body) = h.send(request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(body["error"], "Method not allowed");
        }
        assert!(h.rows().is_empty());
    }

    #[tokio::test]
    async fn test_content_type_must_be_json() {
        let h = Harness::new(VerificationResult::passed(0.9));
        let request = axum::http::Request::post("/api/submit")
            .header("origin", ORIGIN)
            .header("content-type", "text/plain")
            .body(Body::from(valid_body().to_string()))
            .unwrap();

        let (status, _, body) = h.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Content-Type must be application/json");
    }

    #[tokio::test]
    async fn test_sixth_submission_is_rate_limited() {
        let h = Harness::new(VerificationResult::passed(0.9));

        for _ in 0..5 {
            let (status, _, _) = h.send(post(&valid_body())).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _, body) = h.send(post(&valid_body())).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Too many requests. Please try again later.");
        assert_eq!(h.rows().len(), 5);

        // a different client still gets through
        let (status, _, _) = h.send(post_from("198.51.100.2", &valid_body())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_window_rolls_over() {
        let h = Harness::build(
            VerificationResult::passed(0.9),
            RecordingSink::default(),
            Duration::from_millis(200),
        );

        for _ in 0..5 {
            h.send(post(&valid_body())).await;
        }
        let (status, _, _) = h.send(post(&valid_body())).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let (status, _, _) = h.send(post(&valid_body())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validation_error_reported() {
        let h = Harness::new(VerificationResult::passed(0.9));
        let mut body = valid_body();
        body["phone"] = json!("123-456");

        let (status, _, body) = h.send(post(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "ok": false, "error": "Phone must contain 7-15 digits" }));
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_body_required() {
        let h = Harness::new(VerificationResult::passed(0.9));
        let request = axum::http::Request::post("/api/submit")
            .header("origin", ORIGIN)
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap();

        let (status, _, body) = h.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Request body is required");
    }

    #[tokio::test]
    async fn test_low_score_rejected_before_persistence() {
        let h = Harness::new(VerificationResult::passed(0.3));

        let (status, _, body) = h.send(post(&valid_body())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "reCAPTCHA score too low");
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 1);
        assert!(h.rows().is_empty());
    }

    #[tokio::test]
    async fn test_failed_verification_rejected() {
        let h = Harness::new(VerificationResult::failed());

        let (status, _, body) = h.send(post(&valid_body())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "reCAPTCHA verification failed");
        assert!(h.rows().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let h = Harness::build(
            VerificationResult::passed(0.9),
            RecordingSink {
                fail: true,
                ..Default::default()
            },
            Duration::from_secs(3600),
        );

        let (status, headers, body) = h.send(post(&valid_body())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "ok": false, "error": "Internal server error" }));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
    }

    #[tokio::test]
    async fn test_missing_secret_is_internal_error() {
        let config = AppConfig::default();
        let verifier = Arc::new(RecaptchaVerifier::new(reqwest::Client::new(), &config.verification));
        let sink = Arc::new(RecordingSink::default());
        let state = AppState::with_parts(
            config,
            Arc::new(MemoryRateLimitStore::new(5, Duration::from_secs(3600))),
            verifier,
            sink.clone(),
        );

        let response = create_router(state).oneshot(post(&valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(sink.rows.lock().unwrap().is_empty());
    }

    struct SlowVerifier;

    #[async_trait]
    impl BotVerifier for SlowVerifier {
        async fn verify(&self, _: &str, _: Option<&str>) -> Result<VerificationResult, GatewayError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(VerificationResult::passed(0.9))
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_slow_verifier_times_out_as_internal_error() {
        let mut config = AppConfig::default();
        config.request_timeout_secs = 1;
        let sink = Arc::new(RecordingSink::default());
        let state = AppState::with_parts(
            config,
            Arc::new(MemoryRateLimitStore::new(5, Duration::from_secs(3600))),
            Arc::new(SlowVerifier),
            sink.clone(),
        );

        let response = create_router(state).oneshot(post(&valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "ok": false, "error": "Internal server error" }));
        assert!(sink.rows.lock().unwrap().is_empty());
    }
}
