//! API-key setup screen: one password field, a validation probe, and a skip
//! path into limited mode.

use crate::decor::paint_particles;
use crate::types::AppState;
use eframe::egui;
use shared::task::TaskKind;

const CYAN: egui::Color32 = egui::Color32::from_rgb(0, 220, 230);
const DIM: egui::Color32 = egui::Color32::from_rgb(120, 150, 160);
const RED: egui::Color32 = egui::Color32::from_rgb(235, 95, 95);
const GREEN: egui::Color32 = egui::Color32::from_rgb(80, 220, 140);

pub fn render_setup_screen(s: &mut AppState, ctx: &egui::Context) {
    ctx.request_repaint_after(std::time::Duration::from_millis(33));

    egui::CentralPanel::default()
        .frame(egui::Frame::none().fill(egui::Color32::from_rgb(10, 14, 20)))
        .show(ctx, |ui| {
            let time = ui.input(|i| i.time);
            paint_particles(ui.painter(), ui.max_rect(), time);

            let validating = s.runner.is_pending(TaskKind::Validation);

            ui.vertical_centered(|ui| {
                ui.add_space(70.0);
                ui.label(
                    egui::RichText::new("NEURAL LINK CONFIGURATION")
                        .size(26.0)
                        .color(CYAN)
                        .strong(),
                );
                ui.add_space(6.0);
                ui.label(
                    egui::RichText::new(
                        "No stored credential found for this identity. \
                         Provide a Gemini API key to bring the core online.",
                    )
                    .size(13.0)
                    .color(DIM),
                );
                ui.add_space(26.0);

                egui::Frame::none()
                    .fill(egui::Color32::from_rgba_unmultiplied(12, 26, 32, 225))
                    .rounding(egui::Rounding::same(10.0))
                    .stroke(egui::Stroke::new(1.0, CYAN.gamma_multiply(0.4)))
                    .inner_margin(egui::Margin::same(20.0))
                    .show(ui, |ui| {
                        ui.set_width(380.0);
                        ui.label(egui::RichText::new("GEMINI API KEY").color(CYAN).size(12.0));
                        let field = ui.add_enabled(
                            !validating,
                            egui::TextEdit::singleline(&mut s.key_input)
                                .password(true)
                                .hint_text("AIza...")
                                .desired_width(f32::INFINITY),
                        );
                        ui.add_space(4.0);
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new("Keys stay on this device.").size(10.0).weak());
                            ui.hyperlink_to("Get a key", "https://aistudio.google.com/app/apikey");
                        });
                        ui.add_space(14.0);

                        let submit_via_enter =
                            field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                        ui.horizontal(|ui| {
                            let validate = ui
                                .add_enabled(
                                    !validating,
                                    egui::Button::new(
                                        egui::RichText::new("VALIDATE & SAVE")
                                            .color(egui::Color32::BLACK),
                                    )
                                    .fill(CYAN)
                                    .min_size(egui::vec2(180.0, 32.0)),
                                )
                                .clicked();
                            if !validating && (validate || submit_via_enter) {
                                s.begin_key_validation();
                            }

                            if ui
                                .add_enabled(
                                    !validating,
                                    egui::Button::new("SKIP").min_size(egui::vec2(80.0, 32.0)),
                                )
                                .on_hover_text("Continue in limited mode, without a key")
                                .clicked()
                            {
                                s.skip_setup();
                            }
                        });
                    });

                ui.add_space(14.0);
                if validating {
                    let dots = ".".repeat(((time * 2.0) as usize % 3) + 1);
                    ui.label(
                        egui::RichText::new(format!("PROBING UPLINK{dots}"))
                            .monospace()
                            .color(CYAN),
                    );
                } else if let Some(status) = &s.setup_status {
                    let color = if s.setup_status_is_error { RED } else { GREEN };
                    ui.label(egui::RichText::new(status).monospace().color(color));
                } else if s.api_config.configured && !s.api_config.validation_message.is_empty() {
                    ui.label(
                        egui::RichText::new(format!(
                            "Previous setup: {}",
                            s.api_config.validation_message
                        ))
                        .size(11.0)
                        .color(DIM),
                    );
                }
            });
        });
}
