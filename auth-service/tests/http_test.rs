mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{setup, STRONG_PASSWORD};
use healthdir_auth::{
    handlers::{RESET_COMPLETED_MESSAGE, RESET_REQUESTED_MESSAGE},
    services::INVALID_RESET_LINK_MESSAGE,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_body(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let ctx = setup();
    let response = ctx
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let (status, body) = read_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_request_response_does_not_reveal_registration() {
    let ctx = setup();

    let known = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/request",
            json!({ "email": ctx.user.email }),
        ))
        .await
        .unwrap();
    let unknown = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/request",
            json!({ "email": "inconnu@nowhere.example" }),
        ))
        .await
        .unwrap();

    let (known_status, known_body) = read_body(known).await;
    let (unknown_status, unknown_body) = read_body(unknown).await;

    assert_eq!(known_status, StatusCode::OK);
    assert_eq!(unknown_status, StatusCode::OK);
    assert_eq!(known_body, unknown_body);
    assert_eq!(known_body["message"], RESET_REQUESTED_MESSAGE);
    ctx.wait_for_sent(1).await;
    assert_eq!(ctx.sender.sent().len(), 1);
}

#[tokio::test]
async fn test_request_response_unchanged_when_delivery_fails() {
    let ctx = setup();
    ctx.sender.set_failing(true);

    let response = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/request",
            json!({ "email": ctx.user.email }),
        ))
        .await
        .unwrap();

    let (status, body) = read_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], RESET_REQUESTED_MESSAGE);
}

#[tokio::test]
async fn test_malformed_email_is_rejected() {
    let ctx = setup();
    let response = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/request",
            json!({ "email": "not-an-email" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(ctx.store.token_count().unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let ctx = setup();
    let request = Request::builder()
        .method("POST")
        .uri("/auth/password-reset/request")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = ctx.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_confirm_with_valid_token() {
    let ctx = setup();
    ctx.request_delivered().await;

    let response = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/confirm",
            json!({ "token": ctx.last_token(), "new_password": STRONG_PASSWORD }),
        ))
        .await
        .unwrap();

    let (status, body) = read_body(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], RESET_COMPLETED_MESSAGE);
}

#[tokio::test]
async fn test_confirm_with_unknown_token() {
    let ctx = setup();
    let response = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/confirm",
            json!({ "token": "forged", "new_password": STRONG_PASSWORD }),
        ))
        .await
        .unwrap();

    let (status, body) = read_body(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], INVALID_RESET_LINK_MESSAGE);
}

#[tokio::test]
async fn test_reused_and_expired_tokens_share_one_message() {
    let ctx = setup();
    ctx.request_delivered().await;
    let token = ctx.last_token();

    let first = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/confirm",
            json!({ "token": token, "new_password": STRONG_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let reused = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/confirm",
            json!({ "token": token, "new_password": STRONG_PASSWORD }),
        ))
        .await
        .unwrap();
    let (reused_status, reused_body) = read_body(reused).await;

    ctx.request_delivered().await;
    let fresh = ctx.last_token();
    ctx.clock.advance(chrono::Duration::hours(2));
    let expired = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/confirm",
            json!({ "token": fresh, "new_password": STRONG_PASSWORD }),
        ))
        .await
        .unwrap();
    let (expired_status, expired_body) = read_body(expired).await;

    assert_eq!(reused_status, StatusCode::BAD_REQUEST);
    assert_eq!(expired_status, StatusCode::BAD_REQUEST);
    assert_eq!(reused_body, expired_body);
    assert_eq!(reused_body["error"], INVALID_RESET_LINK_MESSAGE);
}

#[tokio::test]
async fn test_confirm_with_weak_password() {
    let ctx = setup();
    ctx.request_delivered().await;

    let response = ctx
        .router()
        .oneshot(post_json(
            "/auth/password-reset/confirm",
            json!({ "token": ctx.last_token(), "new_password": "weak" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!ctx.store.tokens_for(ctx.user.user_id).unwrap()[0].consumed);
}
