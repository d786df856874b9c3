//! Login screen: boot sequence, identity prompt, starfield backdrop.

use crate::decor::paint_starfield;
use crate::flow::FlowState;
use crate::types::{AppState, BOOT_SEQUENCE};
use eframe::egui;

const CYAN: egui::Color32 = egui::Color32::from_rgb(0, 220, 230);
const DIM: egui::Color32 = egui::Color32::from_rgb(120, 150, 160);
const RED: egui::Color32 = egui::Color32::from_rgb(235, 95, 95);

pub fn render_login_screen(s: &mut AppState, ctx: &egui::Context) {
    // Keep the starfield and boot reveal animating.
    ctx.request_repaint_after(std::time::Duration::from_millis(33));

    egui::CentralPanel::default()
        .frame(egui::Frame::none().fill(egui::Color32::from_rgb(8, 12, 18)))
        .show(ctx, |ui| {
            let time = ui.input(|i| i.time);
            paint_starfield(ui.painter(), ui.max_rect(), time);

            ui.vertical_centered(|ui| {
                ui.add_space(60.0);
                ui.label(
                    egui::RichText::new("T I Y A")
                        .size(44.0)
                        .color(CYAN)
                        .strong(),
                );
                ui.label(
                    egui::RichText::new("themed intelligence, yours always")
                        .size(13.0)
                        .color(DIM)
                        .italics(),
                );
                ui.add_space(24.0);

                // Boot lines revealed one every 600ms since launch.
                let revealed = ((time / 0.6) as usize + 1).min(BOOT_SEQUENCE.len());
                for line in &BOOT_SEQUENCE[..revealed] {
                    ui.label(
                        egui::RichText::new(*line)
                            .monospace()
                            .size(12.0)
                            .color(DIM),
                    );
                }
                ui.add_space(24.0);

                let verifying = s.flow.state() == FlowState::CredentialCheck;

                egui::Frame::none()
                    .fill(egui::Color32::from_rgba_unmultiplied(10, 25, 30, 220))
                    .rounding(egui::Rounding::same(10.0))
                    .stroke(egui::Stroke::new(1.0, CYAN.gamma_multiply(0.4)))
                    .inner_margin(egui::Margin::same(20.0))
                    .show(ui, |ui| {
                        ui.set_width(320.0);
                        ui.label(egui::RichText::new("OPERATOR IDENTITY").color(CYAN).size(12.0));
                        ui.add_enabled(
                            !verifying,
                            egui::TextEdit::singleline(&mut s.username_input)
                                .hint_text("username")
                                .desired_width(f32::INFINITY),
                        );
                        ui.add_space(8.0);
                        ui.label(egui::RichText::new("ACCESS CODE").color(CYAN).size(12.0));
                        let code = ui.add_enabled(
                            !verifying,
                            egui::TextEdit::singleline(&mut s.access_code_input)
                                .password(true)
                                .hint_text("access code")
                                .desired_width(f32::INFINITY),
                        );
                        ui.add_space(14.0);

                        let submit_via_enter =
                            code.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                        let clicked = ui
                            .add_enabled(
                                !verifying,
                                egui::Button::new(
                                    egui::RichText::new("INITIATE LINK").color(egui::Color32::BLACK),
                                )
                                .fill(CYAN)
                                .min_size(egui::vec2(280.0, 34.0)),
                            )
                            .clicked();
                        if !verifying && (clicked || submit_via_enter) {
                            s.begin_login();
                        }
                    });

                ui.add_space(14.0);
                if verifying {
                    let dots = ".".repeat(((time * 2.0) as usize % 3) + 1);
                    ui.label(
                        egui::RichText::new(format!("VERIFYING CREDENTIALS{dots}"))
                            .monospace()
                            .color(CYAN),
                    );
                } else if let Some(denial) = s.flow.denial() {
                    ui.label(egui::RichText::new(denial).monospace().color(RED));
                } else if let Some(status) = &s.login_status {
                    ui.label(egui::RichText::new(status).monospace().color(CYAN));
                }
            });
        });
}
