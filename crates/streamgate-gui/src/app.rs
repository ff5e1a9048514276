use std::sync::Arc;

use egui::{
    Align, Color32, FontFamily, FontId, Frame, Layout, Margin, RichText, ScrollArea, Stroke, Vec2,
};
use tokio::sync::mpsc;

use streamgate_core::{MediaInfo, Phase, PlaybackStats};
use streamgate_viewer::Viewer;

use crate::state::SharedState;
use crate::viewer_task::ViewerAction;

// ── Colours ───────────────────────────────────────────────────────────────────

const BG_PANEL:  Color32 = Color32::from_rgb(28,  30,  36);
const BG_INSET:  Color32 = Color32::from_rgb(20,  22,  28);
const BG_CARD:   Color32 = Color32::from_rgb(36,  38,  46);
const ACCENT:    Color32 = Color32::from_rgb(99, 144, 255);
const TEXT_DIM:  Color32 = Color32::from_rgb(130, 135, 148);
const TEXT_NORM: Color32 = Color32::from_rgb(210, 215, 230);
const ERROR_RED: Color32 = Color32::from_rgb(220, 100, 100);

fn phase_color(phase: &Phase) -> Color32 {
    match phase {
        Phase::Idle           => Color32::from_rgb(160, 160, 160),
        Phase::Checking       => Color32::from_rgb(230, 185, 50),
        Phase::Available      => Color32::from_rgb(60, 200, 80),
        Phase::Unavailable(_) => Color32::from_rgb(220, 60, 60),
    }
}

// ── App struct ────────────────────────────────────────────────────────────────

pub struct StreamgateApp {
    state:            SharedState,
    viewer:           Arc<Viewer>,
    actions:          mpsc::UnboundedSender<ViewerAction>,
    auto_scroll_logs: bool,
}

impl StreamgateApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        state: SharedState,
        viewer: Arc<Viewer>,
        actions: mpsc::UnboundedSender<ViewerAction>,
    ) -> Self {
        // Apply dark visuals with custom colours
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill              = BG_PANEL;
        visuals.panel_fill               = BG_PANEL;
        visuals.extreme_bg_color         = BG_INSET;
        visuals.faint_bg_color           = BG_CARD;
        visuals.widgets.inactive.bg_fill = BG_CARD;
        visuals.widgets.hovered.bg_fill  = Color32::from_rgb(50, 53, 65);
        visuals.widgets.active.bg_fill   = Color32::from_rgb(65, 68, 82);
        cc.egui_ctx.set_visuals(visuals);

        // Slightly larger default font
        let mut style = (*cc.egui_ctx.style()).clone();
        style.text_styles.insert(
            egui::TextStyle::Body,
            FontId::new(14.0, FontFamily::Proportional),
        );
        style.text_styles.insert(
            egui::TextStyle::Button,
            FontId::new(13.5, FontFamily::Proportional),
        );
        cc.egui_ctx.set_style(style);

        Self {
            state,
            viewer,
            actions,
            auto_scroll_logs: true,
        }
    }

    /// Flip the gate and mount the stream view, which probes once on entry.
    fn login(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.gate.login();
        state.push_log("Signed in");
        drop(state);
        let _ = self.actions.send(ViewerAction::Check);
    }

    fn retry(&mut self) {
        let _ = self.actions.send(ViewerAction::Check);
    }
}

// ── eframe::App implementation ────────────────────────────────────────────────

impl eframe::App for StreamgateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let authenticated = self.state.lock().unwrap().gate.is_authenticated();

        egui::CentralPanel::default()
            .frame(Frame::none().fill(BG_PANEL))
            .show(ctx, |ui| {
                ui.set_min_size(Vec2::new(480.0, 560.0));

                render_header(ui);
                ui.add_space(10.0);

                if !authenticated {
                    self.render_login_view(ui);
                } else {
                    self.render_stream_view(ui, ctx);
                }
            });
    }
}

// ── Views ─────────────────────────────────────────────────────────────────────

impl StreamgateApp {
    fn render_login_view(&mut self, ui: &mut egui::Ui) {
        ui.add_space(40.0);
        card(ui, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(8.0);
                ui.label(
                    RichText::new("Sign in to watch the stream")
                        .font(FontId::new(18.0, FontFamily::Proportional))
                        .strong()
                        .color(TEXT_NORM),
                );
                ui.add_space(4.0);
                ui.label(
                    RichText::new("Access is granted by the deployment, not by a password.")
                        .font(FontId::new(12.0, FontFamily::Proportional))
                        .color(TEXT_DIM),
                );
                ui.add_space(12.0);
                let clicked = ui
                    .add_sized(
                        [140.0, 34.0],
                        egui::Button::new(RichText::new("Sign in").color(Color32::WHITE))
                            .fill(ACCENT),
                    )
                    .clicked();
                ui.add_space(8.0);
                if clicked {
                    self.login();
                }
            });
        });
    }

    fn render_stream_view(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let phase = self.viewer.phase();
        let (attached, stats) = self.viewer.playback();

        render_status_card(ui, &phase);
        ui.add_space(10.0);

        if phase == Phase::Available {
            render_playback_card(ui, attached.as_ref(), &stats);
            ui.add_space(10.0);
        }

        // Retry control — disabled exactly while a probe/connect is pending
        let checking = phase.is_checking();
        ui.horizontal(|ui| {
            let label = if checking { "Checking…" } else { "Check availability" };
            let button = egui::Button::new(RichText::new(label).color(Color32::WHITE))
                .fill(if checking { BG_CARD } else { ACCENT });
            if ui
                .add_enabled(!checking, button.min_size(Vec2::new(160.0, 30.0)))
                .clicked()
            {
                self.retry();
            }
        });
        ui.add_space(10.0);

        let logs = {
            let state = self.state.lock().unwrap();
            state.logs.iter().cloned().collect::<Vec<_>>()
        };
        render_log_panel(ui, &logs, &mut self.auto_scroll_logs);

        // ── Footer / quit button ──────────────────────────────────────────
        ui.add_space(8.0);
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            if ui
                .add_sized(
                    [110.0, 30.0],
                    egui::Button::new(
                        RichText::new("Quit").color(Color32::from_rgb(220, 80, 70)),
                    )
                    .fill(BG_CARD)
                    .stroke(Stroke::new(1.0, Color32::from_rgb(180, 60, 55))),
                )
                .clicked()
            {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    }
}

// ── Rendering helpers ─────────────────────────────────────────────────────────

fn render_header(ui: &mut egui::Ui) {
    ui.horizontal(|ui| {
        ui.add_space(6.0);
        ui.label(
            RichText::new("Streamgate")
                .font(FontId::new(26.0, FontFamily::Proportional))
                .strong()
                .color(Color32::WHITE),
        );
        ui.label(
            RichText::new("Viewer")
                .font(FontId::new(26.0, FontFamily::Proportional))
                .color(ACCENT),
        );
    });

    // Thin accent separator
    let rect = ui.available_rect_before_wrap();
    let y    = ui.cursor().top();
    ui.painter().line_segment(
        [egui::pos2(rect.left() + 6.0, y), egui::pos2(rect.right() - 6.0, y)],
        Stroke::new(1.0, Color32::from_rgb(55, 58, 74)),
    );
    ui.add_space(4.0);
}

fn render_status_card(ui: &mut egui::Ui, phase: &Phase) {
    card(ui, |ui| {
        ui.horizontal(|ui| {
            // Coloured status dot
            let (rect, _) = ui.allocate_exact_size(Vec2::splat(12.0), egui::Sense::hover());
            ui.painter().circle_filled(rect.center(), 5.0, phase_color(phase));

            ui.label(RichText::new(phase.label()).strong().color(TEXT_NORM));

            // The single error line
            if let Some(message) = phase.error_message() {
                ui.label(
                    RichText::new(format!(": {}", message))
                        .color(ERROR_RED)
                        .font(FontId::new(12.0, FontFamily::Proportional)),
                );
            }
        });
    });
}

fn render_playback_card(ui: &mut egui::Ui, attached: Option<&MediaInfo>, stats: &PlaybackStats) {
    card(ui, |ui| {
        ui.label(
            RichText::new("Playback")
                .color(TEXT_DIM)
                .font(FontId::new(12.0, FontFamily::Proportional)),
        );
        ui.add_space(6.0);

        match attached {
            Some(info) => {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("Inbound {}", info.kind))
                            .strong()
                            .color(Color32::WHITE),
                    );
                    ui.label(
                        RichText::new(format!("({})", info.id))
                            .color(TEXT_DIM)
                            .font(FontId::new(12.0, FontFamily::Proportional)),
                    );
                });
                ui.add_space(6.0);
                ui.horizontal_wrapped(|ui| {
                    stat_chip(ui, "Packets", &stats.packets.to_string());
                    stat_chip(
                        ui,
                        "Received",
                        &format!("{:.2} MiB", stats.bytes as f64 / (1024.0 * 1024.0)),
                    );
                });
            }
            None => {
                ui.label(
                    RichText::new("Session established — waiting for media…")
                        .color(TEXT_DIM)
                        .font(FontId::new(12.0, FontFamily::Proportional)),
                );
            }
        }
    });
}

fn render_log_panel(ui: &mut egui::Ui, logs: &[String], auto_scroll: &mut bool) {
    // Header row with auto-scroll toggle
    ui.horizontal(|ui| {
        ui.label(
            RichText::new("Log")
                .color(TEXT_DIM)
                .font(FontId::new(12.0, FontFamily::Proportional)),
        );
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            ui.checkbox(
                auto_scroll,
                RichText::new("auto-scroll")
                    .color(TEXT_DIM)
                    .font(FontId::new(11.5, FontFamily::Proportional)),
            );
        });
    });
    ui.add_space(3.0);

    let available = ui.available_size();
    let log_height = (available.y - 55.0).max(120.0);

    Frame::none()
        .fill(BG_INSET)
        .inner_margin(Margin::symmetric(8.0, 6.0))
        .stroke(Stroke::new(1.0, Color32::from_rgb(45, 48, 60)))
        .rounding(egui::Rounding::same(6.0))
        .show(ui, |ui| {
            ScrollArea::vertical()
                .id_salt("log_scroll")
                .max_height(log_height)
                .auto_shrink([false, false])
                .stick_to_bottom(*auto_scroll)
                .show(ui, |ui| {
                    ui.set_min_width(ui.available_width());
                    for line in logs {
                        let color = if line.starts_with("[ERROR]") {
                            Color32::from_rgb(220, 80, 70)
                        } else if line.starts_with("[WARN]") {
                            Color32::from_rgb(220, 165, 50)
                        } else {
                            Color32::from_rgb(160, 170, 185)
                        };
                        ui.label(
                            RichText::new(line)
                                .font(FontId::new(11.5, FontFamily::Monospace))
                                .color(color),
                        );
                    }
                });
        });
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn card(ui: &mut egui::Ui, add_contents: impl FnOnce(&mut egui::Ui)) {
    Frame::none()
        .fill(BG_CARD)
        .inner_margin(Margin::symmetric(12.0, 10.0))
        .rounding(egui::Rounding::same(8.0))
        .stroke(Stroke::new(1.0, Color32::from_rgb(50, 53, 68)))
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            add_contents(ui);
        });
}

fn stat_chip(ui: &mut egui::Ui, label: &str, value: &str) {
    Frame::none()
        .fill(BG_INSET)
        .inner_margin(Margin::symmetric(10.0, 6.0))
        .rounding(egui::Rounding::same(6.0))
        .stroke(Stroke::new(1.0, Color32::from_rgb(50, 53, 68)))
        .show(ui, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(
                    RichText::new(value)
                        .font(FontId::new(18.0, FontFamily::Monospace))
                        .strong()
                        .color(Color32::WHITE),
                );
                ui.add_space(1.0);
                ui.label(
                    RichText::new(label)
                        .font(FontId::new(11.0, FontFamily::Proportional))
                        .color(TEXT_DIM),
                );
            });
        });
    ui.add_space(6.0);
}
