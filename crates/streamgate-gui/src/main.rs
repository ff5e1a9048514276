mod app;
mod state;
mod viewer_task;

use std::sync::{Arc, Mutex};

use anyhow::Context;

use state::GuiState;
use streamgate_core::ViewerConfig;
use streamgate_rtc::RtcLinkFactory;
use streamgate_viewer::Viewer;

fn main() -> anyhow::Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    // ── Configuration & viewer ────────────────────────────────────────────
    let config = ViewerConfig::load().context("loading viewer configuration")?;
    tracing::info!(endpoint = %config.signaling.offer_url(), "signaling endpoint");

    let links = Arc::new(
        RtcLinkFactory::new(config.ice.clone()).context("building WebRTC link factory")?,
    );
    let viewer = Viewer::new(&config, links);

    // ── Shared state & action channel ─────────────────────────────────────
    let shared_state: state::SharedState = Arc::new(Mutex::new(GuiState::default()));
    let (action_tx, action_rx) = tokio::sync::mpsc::unbounded_channel();

    // ── Window options ────────────────────────────────────────────────────
    let window_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Streamgate")
            .with_inner_size([520.0, 640.0])
            .with_min_inner_size([400.0, 480.0])
            .with_resizable(true),
        ..Default::default()
    };

    let state_gui = Arc::clone(&shared_state);
    let viewer_gui = Arc::clone(&viewer);
    eframe::run_native(
        "Streamgate",
        window_options,
        Box::new(move |cc| {
            let state_bg = Arc::clone(&shared_state);
            let ctx_bg = cc.egui_ctx.clone();
            let viewer_bg = Arc::clone(&viewer);

            // Spawn a dedicated OS thread running a tokio multi-thread runtime.
            // This keeps the async viewer entirely off the egui/glow main thread.
            std::thread::Builder::new()
                .name("streamgate-viewer".into())
                .spawn(move || {
                    let rt = tokio::runtime::Builder::new_multi_thread()
                        .worker_threads(2)
                        .enable_all()
                        .build()
                        .expect("Failed to build tokio runtime");

                    rt.block_on(viewer_task::run(viewer_bg, state_bg, ctx_bg, action_rx));
                })
                .expect("Failed to spawn viewer thread");

            Ok(Box::new(app::StreamgateApp::new(
                cc, state_gui, viewer_gui, action_tx,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe: {e}"))?;

    Ok(())
}
