//! Stream-availability and connection lifecycle.
//!
//! ```text
//! refresh() ─ probe link ─ POST offer ─┬─ 2xx + answer → connect()
//!   (link closed on every path,        ├─ non-2xx      → Unavailable(NotYetAvailable)
//!    answer never applied to it)       ├─ bad body     → Unavailable(NoStream)
//!                                      └─ error        → Unavailable(ProbeFailed)
//!
//! connect() ─ close previous link ─ fresh link ─ POST offer ─ apply answer
//!   ├─ ok    → Available, link retained, event pump spawned
//!   └─ error → link closed, Unavailable(StartFailed)
//! ```
//!
//! At most one probe-or-connect sequence runs at a time: `refresh` is a
//! no-op while the phase is `Checking`. Every in-flight sequence carries a
//! generation number; a sequence whose generation is no longer current may
//! not touch state, so a stale response cannot overwrite a newer one and
//! nothing resurrects state after [`Viewer::shutdown`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use streamgate_core::{
    LinkError, LinkEvent, LinkFactory, MediaInfo, MediaKinds, MediaLink, Phase, PlaybackStats,
    UnavailableReason, ViewerConfig,
};
use streamgate_signaling::{SignalingClient, SignalingError};

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ViewerState {
    phase: Phase,
    attached: Option<MediaInfo>,
    stats: PlaybackStats,
    link: Option<Arc<dyn MediaLink>>,
}

type NotifyFn = Box<dyn Fn() + Send + Sync>;

pub struct Viewer {
    media: MediaKinds,
    signaling: SignalingClient,
    links: Arc<dyn LinkFactory>,
    state: Mutex<ViewerState>,
    generation: AtomicU64,
    notify: Mutex<Option<NotifyFn>>,
}

enum ProbeOutcome {
    Available,
    Failed(UnavailableReason),
}

#[derive(Error, Debug)]
enum ConnectError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Signaling(#[from] SignalingError),
}

impl Viewer {
    pub fn new(config: &ViewerConfig, links: Arc<dyn LinkFactory>) -> Arc<Self> {
        Arc::new(Self {
            media: config.media,
            signaling: SignalingClient::new(&config.signaling),
            links,
            state: Mutex::new(ViewerState::default()),
            generation: AtomicU64::new(0),
            notify: Mutex::new(None),
        })
    }

    /// Register a callback invoked after every observable state change
    /// (the GUI wires this to a repaint request).
    pub fn set_notify(&self, notify: impl Fn() + Send + Sync + 'static) {
        *self.notify.lock().unwrap() = Some(Box::new(notify));
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap().phase.clone()
    }

    /// Attached inbound media (if any) and its rolling counters.
    pub fn playback(&self) -> (Option<MediaInfo>, PlaybackStats) {
        let state = self.state.lock().unwrap();
        (state.attached.clone(), state.stats)
    }

    // ── Probe ────────────────────────────────────────────────────────────────

    /// Check whether a stream is being published and, when it is, establish
    /// the media session.
    ///
    /// Runs automatically when the stream view mounts and on the manual
    /// retry action. A refresh started while another probe or connect is
    /// pending returns immediately.
    pub async fn refresh(self: &Arc<Self>) {
        let generation = {
            let mut state = self.state.lock().unwrap();
            if state.phase.is_checking() {
                debug!("probe already in flight");
                return;
            }
            state.phase = Phase::Checking;
            state.attached = None;
            state.stats = PlaybackStats::default();
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.touch();

        match self.probe().await {
            ProbeOutcome::Available => self.connect(generation).await,
            ProbeOutcome::Failed(reason) => self.fail_if_current(generation, reason).await,
        }
    }

    /// One throwaway round-trip to learn whether the publisher answers.
    /// The probe link only tests reachability: it is closed on every path
    /// and the answer is never applied to it.
    async fn probe(&self) -> ProbeOutcome {
        let (link, _events) = match self.links.open().await {
            Ok(opened) => opened,
            Err(e) => {
                warn!(error = %e, "probe link construction failed");
                return ProbeOutcome::Failed(UnavailableReason::ProbeFailed);
            }
        };
        let outcome = self.probe_with(&*link).await;
        link.close().await;
        outcome
    }

    async fn probe_with(&self, link: &dyn MediaLink) -> ProbeOutcome {
        let offer = match link.create_recv_offer(self.media).await {
            Ok(offer) => offer,
            Err(e) => {
                warn!(error = %e, "probe offer failed");
                return ProbeOutcome::Failed(UnavailableReason::ProbeFailed);
            }
        };

        match self.signaling.post_offer(&offer).await {
            Ok(_answer) => {
                info!("stream available");
                ProbeOutcome::Available
            }
            Err(SignalingError::Rejected { status }) => {
                debug!(status, "stream not yet published");
                ProbeOutcome::Failed(UnavailableReason::NotYetAvailable)
            }
            Err(SignalingError::MissingFields) | Err(SignalingError::InvalidBody(_)) => {
                debug!("signaling answered without a description");
                ProbeOutcome::Failed(UnavailableReason::NoStream)
            }
            Err(SignalingError::Transport(e)) => {
                warn!(error = %e, "probe transport failure");
                ProbeOutcome::Failed(UnavailableReason::ProbeFailed)
            }
        }
    }

    // ── Connect ──────────────────────────────────────────────────────────────

    async fn connect(self: &Arc<Self>, generation: u64) {
        // At most one active link: retire any previous one first.
        let previous = self.state.lock().unwrap().link.take();
        if let Some(previous) = previous {
            debug!("closing previous media link");
            previous.close().await;
        }

        match self.establish().await {
            Ok((link, events)) => {
                let superseded = {
                    let mut state = self.state.lock().unwrap();
                    if self.generation.load(Ordering::SeqCst) != generation {
                        true
                    } else {
                        state.link = Some(Arc::clone(&link));
                        state.phase = Phase::Available;
                        false
                    }
                };
                if superseded {
                    // Superseded while the handshake was in flight; the link
                    // must not be retained.
                    link.close().await;
                    return;
                }
                info!("media session established");
                self.touch();

                let viewer = Arc::clone(self);
                tokio::spawn(async move {
                    viewer.pump_events(generation, link, events).await;
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to start stream");
                self.fail_if_current(generation, UnavailableReason::StartFailed)
                    .await;
            }
        }
    }

    /// Open a link and complete the offer/answer handshake on it. The link
    /// is closed before returning on every failure path.
    async fn establish(
        &self,
    ) -> Result<(Arc<dyn MediaLink>, mpsc::Receiver<LinkEvent>), ConnectError> {
        let (link, events) = self.links.open().await?;
        match self.handshake(&*link).await {
            Ok(()) => Ok((link, events)),
            Err(e) => {
                link.close().await;
                Err(e)
            }
        }
    }

    async fn handshake(&self, link: &dyn MediaLink) -> Result<(), ConnectError> {
        let offer = link.create_recv_offer(self.media).await?;
        let answer = self.signaling.post_offer(&offer).await?;
        link.apply_answer(answer).await?;
        Ok(())
    }

    // ── Event pump ───────────────────────────────────────────────────────────

    async fn pump_events(
        self: Arc<Self>,
        generation: u64,
        link: Arc<dyn MediaLink>,
        mut events: mpsc::Receiver<LinkEvent>,
    ) {
        while let Some(event) = events.recv().await {
            // The guard is scoped to this block so it is provably released
            // before any await; `lost` carries the link to close afterwards.
            let lost = {
                // The generation check and the state write happen under the one
                // lock, so a concurrent shutdown cannot slip between them.
                let mut state = self.state.lock().unwrap();
                if self.generation.load(Ordering::SeqCst) != generation {
                    debug!("event pump superseded");
                    return;
                }
                match event {
                    LinkEvent::TrackStarted(info) => {
                        // First inbound stream owns the playback surface.
                        if state.attached.is_none() {
                            info!(kind = %info.kind, id = %info.id, "attaching inbound media");
                            state.attached = Some(info);
                        }
                        None
                    }
                    LinkEvent::Stats(delta) => {
                        state.stats.packets += delta.packets;
                        state.stats.bytes += delta.bytes;
                        None
                    }
                    LinkEvent::Lost => {
                        warn!("media link lost");
                        state.phase = Phase::Unavailable(UnavailableReason::LinkLost);
                        state.attached = None;
                        Some(state.link.take())
                    }
                }
            };
            match lost {
                None => self.touch(),
                Some(retained) => {
                    retained.unwrap_or(link).close().await;
                    self.touch();
                    return;
                }
            }
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Release the retained media session and cancel anything in flight.
    /// Called when the viewer unmounts; safe to call more than once.
    pub async fn shutdown(&self) {
        let link = {
            let mut state = self.state.lock().unwrap();
            // Bumped under the state lock so in-flight sequences observe the
            // new generation before their next state write.
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.phase = Phase::Idle;
            state.attached = None;
            state.link.take()
        };
        if let Some(link) = link {
            info!("closing media session");
            link.close().await;
        }
        self.touch();
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// End the current sequence in an unavailable phase, releasing any link
    /// still retained from an earlier session so a live media connection
    /// never survives into a non-`Available` phase.
    async fn fail_if_current(&self, generation: u64, reason: UnavailableReason) {
        let retained = {
            let mut state = self.state.lock().unwrap();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("stale sequence; dropping phase update");
                return;
            }
            state.phase = Phase::Unavailable(reason);
            state.attached = None;
            state.link.take()
        };
        if let Some(link) = retained {
            debug!("closing session link from the previous session");
            link.close().await;
        }
        self.touch();
    }

    fn touch(&self) {
        if let Some(notify) = &*self.notify.lock().unwrap() {
            notify();
        }
    }
}
