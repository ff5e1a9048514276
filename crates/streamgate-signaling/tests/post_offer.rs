use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use streamgate_core::{SessionDescription, SignalingConfig};
use streamgate_signaling::{SignalingClient, SignalingError};

/// Serve `router` on an ephemeral port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn client(base_url: String) -> SignalingClient {
    SignalingClient::new(&SignalingConfig {
        base_url,
        offer_path: "/offer".into(),
    })
}

#[tokio::test]
async fn answer_round_trip() {
    let router = Router::new().route(
        "/offer",
        post(|Json(offer): Json<Value>| async move {
            // The request body must carry both wire fields.
            assert!(offer["sdp"].is_string());
            assert_eq!(offer["type"], "offer");
            Json(json!({ "sdp": "v=0\r\nanswer", "type": "answer" }))
        }),
    );
    let client = client(serve(router).await);

    let answer = client
        .post_offer(&SessionDescription::offer("v=0\r\noffer"))
        .await
        .expect("answer");
    assert_eq!(answer, SessionDescription::answer("v=0\r\nanswer"));
}

#[tokio::test]
async fn empty_body_is_missing_fields() {
    let router = Router::new().route("/offer", post(|| async { Json(json!({})) }));
    let client = client(serve(router).await);

    let err = client
        .post_offer(&SessionDescription::offer("v=0\r\n"))
        .await
        .expect_err("empty body");
    assert!(matches!(err, SignalingError::MissingFields));
}

#[tokio::test]
async fn empty_string_fields_are_missing_fields() {
    let router = Router::new().route(
        "/offer",
        post(|| async { Json(json!({ "sdp": "", "type": "" })) }),
    );
    let client = client(serve(router).await);

    let err = client
        .post_offer(&SessionDescription::offer("v=0\r\n"))
        .await
        .expect_err("blank fields");
    assert!(matches!(err, SignalingError::MissingFields));
}

#[tokio::test]
async fn non_2xx_is_rejected_with_status() {
    let router = Router::new().route(
        "/offer",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))) }),
    );
    let client = client(serve(router).await);

    let err = client
        .post_offer(&SessionDescription::offer("v=0\r\n"))
        .await
        .expect_err("503");
    assert!(matches!(err, SignalingError::Rejected { status: 503 }));
}

#[tokio::test]
async fn garbage_body_is_invalid() {
    let router = Router::new().route("/offer", post(|| async { "not json" }));
    let client = client(serve(router).await);

    let err = client
        .post_offer(&SessionDescription::offer("v=0\r\n"))
        .await
        .expect_err("garbage");
    assert!(matches!(err, SignalingError::InvalidBody(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_transport() {
    // Bind and immediately drop a listener so the port is (very likely) closed.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        listener.local_addr().expect("local addr")
    };
    let client = client(format!("http://{addr}"));

    let err = client
        .post_offer(&SessionDescription::offer("v=0\r\n"))
        .await
        .expect_err("closed port");
    assert!(matches!(err, SignalingError::Transport(_)));
}
