use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::{mpsc, Notify};

use streamgate_core::{
    LinkError, LinkEvent, LinkFactory, MediaInfo, MediaKinds, MediaLink, Phase, PlaybackStats,
    SessionDescription, SignalingConfig, UnavailableReason, ViewerConfig,
};
use streamgate_viewer::Viewer;

// ── Mock media links ──────────────────────────────────────────────────────────

struct MockLink {
    closed: AtomicBool,
    answers_applied: AtomicUsize,
    fail_offer: bool,
}

#[async_trait]
impl MediaLink for MockLink {
    async fn create_recv_offer(&self, _media: MediaKinds) -> Result<SessionDescription, LinkError> {
        if self.fail_offer {
            return Err(LinkError::Offer { reason: "induced failure".into() });
        }
        Ok(SessionDescription::offer("v=0\r\n"))
    }

    async fn apply_answer(&self, _answer: SessionDescription) -> Result<(), LinkError> {
        self.answers_applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockFactory {
    opened: AtomicUsize,
    links: Mutex<Vec<Arc<MockLink>>>,
    event_txs: Mutex<Vec<mpsc::Sender<LinkEvent>>>,
    /// Index of the link whose offer creation fails, if any.
    fail_offer_at: Option<usize>,
    /// When set, `open` blocks until notified (to hold the Checking phase).
    block_open: Option<Arc<Notify>>,
}

impl MockFactory {
    fn link(&self, index: usize) -> Arc<MockLink> {
        Arc::clone(&self.links.lock().unwrap()[index])
    }

    fn event_tx(&self, index: usize) -> mpsc::Sender<LinkEvent> {
        self.event_txs.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LinkFactory for MockFactory {
    async fn open(&self) -> Result<(Arc<dyn MediaLink>, mpsc::Receiver<LinkEvent>), LinkError> {
        if let Some(gate) = &self.block_open {
            gate.notified().await;
        }
        let index = self.opened.fetch_add(1, Ordering::SeqCst);
        let link = Arc::new(MockLink {
            closed: AtomicBool::new(false),
            answers_applied: AtomicUsize::new(0),
            fail_offer: self.fail_offer_at == Some(index),
        });
        let (tx, rx) = mpsc::channel(16);
        self.links.lock().unwrap().push(Arc::clone(&link));
        self.event_txs.lock().unwrap().push(tx);
        Ok((link, rx))
    }
}

// ── Signaling fixtures ────────────────────────────────────────────────────────

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

async fn serve_answer() -> String {
    serve(Router::new().route(
        "/offer",
        post(|| async { Json(json!({ "sdp": "v=0\r\nanswer", "type": "answer" })) }),
    ))
    .await
}

fn config(base_url: String) -> ViewerConfig {
    ViewerConfig {
        signaling: SignalingConfig { base_url, offer_path: "/offer".into() },
        ..Default::default()
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

// ── Probe outcomes ────────────────────────────────────────────────────────────

#[tokio::test]
async fn available_answer_triggers_connect_exactly_once() {
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());

    viewer.refresh().await;

    assert_eq!(viewer.phase(), Phase::Available);
    // One probe link, one session link.
    assert_eq!(factory.opened.load(Ordering::SeqCst), 2);

    // The probe link is closed and its answer discarded.
    let probe = factory.link(0);
    assert!(probe.closed.load(Ordering::SeqCst));
    assert_eq!(probe.answers_applied.load(Ordering::SeqCst), 0);

    // The session link stays open with the handshake completed.
    let session = factory.link(1);
    assert!(!session.closed.load(Ordering::SeqCst));
    assert_eq!(session.answers_applied.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_answer_body_means_no_stream() {
    let base = serve(Router::new().route("/offer", post(|| async { Json(json!({})) }))).await;
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(base), factory.clone());

    viewer.refresh().await;

    assert_eq!(viewer.phase(), Phase::Unavailable(UnavailableReason::NoStream));
    assert_eq!(viewer.phase().error_message(), Some("stream unavailable"));
    // No connect attempt was made.
    assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
    assert!(factory.link(0).closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn rejected_probe_means_not_yet_available() {
    let base = serve(Router::new().route(
        "/offer",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))) }),
    ))
    .await;
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(base), factory.clone());

    viewer.refresh().await;

    assert_eq!(
        viewer.phase(),
        Phase::Unavailable(UnavailableReason::NotYetAvailable)
    );
    assert_eq!(viewer.phase().error_message(), Some("stream not yet available"));
    assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_endpoint_is_a_probe_failure() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        listener.local_addr().expect("local addr")
    };
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(format!("http://{addr}")), factory.clone());

    viewer.refresh().await;

    assert_eq!(
        viewer.phase(),
        Phase::Unavailable(UnavailableReason::ProbeFailed)
    );
    assert!(factory.link(0).closed.load(Ordering::SeqCst));
}

// ── Connect outcomes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_failure_closes_the_link_and_attaches_nothing() {
    let factory = Arc::new(MockFactory {
        fail_offer_at: Some(1), // probe succeeds, session offer fails
        ..Default::default()
    });
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());

    viewer.refresh().await;

    assert_eq!(
        viewer.phase(),
        Phase::Unavailable(UnavailableReason::StartFailed)
    );
    assert_eq!(viewer.phase().error_message(), Some("error starting stream"));
    assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
    // The half-built session link is released, not leaked.
    assert!(factory.link(1).closed.load(Ordering::SeqCst));
    let (attached, _stats) = viewer.playback();
    assert!(attached.is_none());
}

#[tokio::test]
async fn first_track_owns_the_playback_surface() {
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());
    viewer.refresh().await;

    let events = factory.event_tx(1);
    events
        .send(LinkEvent::TrackStarted(MediaInfo {
            kind: "video".into(),
            id: "v0".into(),
        }))
        .await
        .expect("send");
    events
        .send(LinkEvent::TrackStarted(MediaInfo {
            kind: "audio".into(),
            id: "a0".into(),
        }))
        .await
        .expect("send");
    events
        .send(LinkEvent::Stats(PlaybackStats { packets: 40, bytes: 4000 }))
        .await
        .expect("send");
    events
        .send(LinkEvent::Stats(PlaybackStats { packets: 10, bytes: 1000 }))
        .await
        .expect("send");

    let viewer2 = Arc::clone(&viewer);
    wait_for(move || viewer2.playback().1.packets == 50).await;
    let (attached, stats) = viewer.playback();
    let attached = attached.expect("attached");
    assert_eq!(attached.kind, "video");
    assert_eq!(attached.id, "v0");
    assert_eq!(stats.bytes, 5000);
}

#[tokio::test]
async fn link_loss_tears_the_session_down() {
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());
    viewer.refresh().await;

    factory
        .event_tx(1)
        .send(LinkEvent::Lost)
        .await
        .expect("send");

    let viewer2 = Arc::clone(&viewer);
    wait_for(move || viewer2.phase() == Phase::Unavailable(UnavailableReason::LinkLost)).await;
    assert_eq!(viewer.phase().error_message(), Some("connection lost"));
    assert!(factory.link(1).closed.load(Ordering::SeqCst));
    let (attached, _stats) = viewer.playback();
    assert!(attached.is_none());
}

// ── Reentrancy and teardown ───────────────────────────────────────────────────

#[tokio::test]
async fn refresh_while_checking_is_a_noop() {
    let gate = Arc::new(Notify::new());
    let factory = Arc::new(MockFactory {
        block_open: Some(Arc::clone(&gate)),
        ..Default::default()
    });
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());

    let first = {
        let viewer = Arc::clone(&viewer);
        tokio::spawn(async move { viewer.refresh().await })
    };
    let viewer2 = Arc::clone(&viewer);
    wait_for(move || viewer2.phase().is_checking()).await;

    // Second invocation returns immediately without opening anything.
    viewer.refresh().await;
    assert_eq!(factory.opened.load(Ordering::SeqCst), 0);
    assert!(viewer.phase().is_checking());

    // Release the probe (and the subsequent connect).
    gate.notify_one();
    gate.notify_one();
    first.await.expect("first refresh");
    assert_eq!(viewer.phase(), Phase::Available);
    assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn shutdown_closes_the_retained_link() {
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());
    viewer.refresh().await;
    assert_eq!(viewer.phase(), Phase::Available);

    viewer.shutdown().await;

    assert_eq!(viewer.phase(), Phase::Idle);
    assert!(factory.link(1).closed.load(Ordering::SeqCst));

    // Idempotent.
    viewer.shutdown().await;
    assert_eq!(viewer.phase(), Phase::Idle);
}

#[tokio::test]
async fn late_events_after_shutdown_are_ignored() {
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());
    viewer.refresh().await;

    let events = factory.event_tx(1);
    viewer.shutdown().await;

    let _ = events
        .send(LinkEvent::TrackStarted(MediaInfo {
            kind: "video".into(),
            id: "stale".into(),
        }))
        .await;
    let _ = events.send(LinkEvent::Lost).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(viewer.phase(), Phase::Idle);
    let (attached, _stats) = viewer.playback();
    assert!(attached.is_none());
}

#[tokio::test]
async fn failed_reprobe_closes_the_session_link() {
    // First probe and connect succeed; every later offer is refused.
    let calls = Arc::new(AtomicUsize::new(0));
    let router = {
        let calls = Arc::clone(&calls);
        Router::new().route(
            "/offer",
            post(move || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        (
                            StatusCode::OK,
                            Json(json!({ "sdp": "v=0\r\nanswer", "type": "answer" })),
                        )
                    } else {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})))
                    }
                }
            }),
        )
    };
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(serve(router).await), factory.clone());

    viewer.refresh().await;
    assert_eq!(viewer.phase(), Phase::Available);

    viewer.refresh().await;

    assert_eq!(
        viewer.phase(),
        Phase::Unavailable(UnavailableReason::NotYetAvailable)
    );
    // probe, session, failed re-probe
    assert_eq!(factory.opened.load(Ordering::SeqCst), 3);
    // No live media connection may survive into an unavailable phase.
    assert!(factory.link(1).closed.load(Ordering::SeqCst));
    assert!(factory.link(2).closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn shutdown_wins_over_concurrent_link_loss() {
    // Whichever side takes the state lock first, shutdown must leave the
    // viewer Idle with the session link closed.
    for _ in 0..25 {
        let factory = Arc::new(MockFactory::default());
        let viewer = Viewer::new(&config(serve_answer().await), factory.clone());
        viewer.refresh().await;
        assert_eq!(viewer.phase(), Phase::Available);

        let events = factory.event_tx(1);
        let lost = tokio::spawn(async move {
            let _ = events.send(LinkEvent::Lost).await;
        });
        viewer.shutdown().await;
        lost.await.expect("lost sender");
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(viewer.phase(), Phase::Idle);
        assert!(factory.link(1).closed.load(Ordering::SeqCst));
    }
}

#[tokio::test]
async fn reconnect_replaces_the_previous_link() {
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());

    viewer.refresh().await;
    assert_eq!(viewer.phase(), Phase::Available);

    viewer.refresh().await;
    assert_eq!(viewer.phase(), Phase::Available);

    // probe, session, probe, session
    assert_eq!(factory.opened.load(Ordering::SeqCst), 4);
    // The first session link was closed when the second connect started.
    assert!(factory.link(1).closed.load(Ordering::SeqCst));
    assert!(!factory.link(3).closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn notify_fires_on_state_changes() {
    let factory = Arc::new(MockFactory::default());
    let viewer = Viewer::new(&config(serve_answer().await), factory.clone());
    let pings = Arc::new(AtomicUsize::new(0));
    {
        let pings = Arc::clone(&pings);
        viewer.set_notify(move || {
            pings.fetch_add(1, Ordering::SeqCst);
        });
    }

    viewer.refresh().await;

    // At least Checking → Available.
    assert!(pings.load(Ordering::SeqCst) >= 2);
}
