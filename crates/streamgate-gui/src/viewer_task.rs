use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use streamgate_core::Phase;
use streamgate_viewer::Viewer;

use crate::state::SharedState;

/// Actions forwarded from the GUI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    /// Probe for availability (sent once when the stream view mounts and on
    /// every manual retry).
    Check,
}

// ── Entry point (called from the tokio runtime thread) ─────────────────────────

/// Drives the viewer from GUI actions. Exits when the action channel closes
/// (window gone), releasing the media session on the way out.
pub async fn run(
    viewer: Arc<Viewer>,
    state: SharedState,
    ctx: egui::Context,
    mut actions: mpsc::UnboundedReceiver<ViewerAction>,
) {
    {
        let ctx = ctx.clone();
        viewer.set_notify(move || ctx.request_repaint());
    }

    while let Some(action) = actions.recv().await {
        match action {
            ViewerAction::Check => {
                push_log(&state, &ctx, "Checking stream availability…");
                viewer.refresh().await;
                let line = match viewer.phase() {
                    Phase::Available => "Stream available — session established".to_string(),
                    Phase::Unavailable(reason) => format!("[WARN] {}", reason),
                    // refresh() always leaves Checking before returning; a
                    // concurrent shutdown is the only way to see Idle here.
                    Phase::Checking | Phase::Idle => continue,
                };
                push_log(&state, &ctx, line);
            }
        }
    }

    info!("GUI gone — shutting the viewer down");
    viewer.shutdown().await;
}

fn push_log(state: &SharedState, ctx: &egui::Context, line: impl Into<String>) {
    state.lock().unwrap().push_log(line);
    ctx.request_repaint();
}
