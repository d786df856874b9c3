//! Chat window: transcript, input row, status lamp, voice and optic-feed
//! toggles.

use crate::decor::{paint_neural_web, paint_status_indicator, status_color};
use crate::types::AppState;
use eframe::egui;
use shared::chat::{Author, Message};
use shared::task::TaskKind;

const CYAN: egui::Color32 = egui::Color32::from_rgb(0, 220, 230);
const DIM: egui::Color32 = egui::Color32::from_rgb(120, 150, 160);

pub fn render_chat_screen(s: &mut AppState, ctx: &egui::Context) {
    if s.runner.any_pending() || s.webcam_enabled {
        ctx.request_repaint_after(std::time::Duration::from_millis(33));
    }

    let time = ctx.input(|i| i.time);
    let thinking = s.runner.is_pending(TaskKind::Completion);
    let listening = s.runner.is_pending(TaskKind::Recognition);

    egui::TopBottomPanel::top("chat_header")
        .frame(
            egui::Frame::none()
                .fill(egui::Color32::from_rgb(12, 18, 26))
                .inner_margin(egui::Margin::symmetric(14.0, 10.0)),
        )
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("TIYA").size(22.0).color(CYAN).strong());

                let (rect, _) =
                    ui.allocate_exact_size(egui::vec2(22.0, 22.0), egui::Sense::hover());
                paint_status_indicator(ui.painter(), rect.center(), s.status, time);
                ui.label(
                    egui::RichText::new(s.status.label())
                        .size(11.0)
                        .color(status_color(s.status))
                        .monospace(),
                );

                if let Some(session) = s.flow.session() {
                    ui.label(
                        egui::RichText::new(format!("operator: {}", session.user))
                            .size(11.0)
                            .color(DIM),
                    );
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.small_button("Log out").clicked() {
                        s.shutdown();
                        s.flow.reset();
                        return;
                    }
                    if ui
                        .small_button("Export")
                        .on_hover_text("Write the conversation to a log file")
                        .clicked()
                    {
                        s.export_logs();
                    }
                    if ui
                        .small_button("Clear")
                        .on_hover_text("Archive and clear this conversation")
                        .clicked()
                    {
                        s.clear_conversation();
                    }
                    ui.separator();

                    let mut voice = s.voice_enabled;
                    if ui
                        .checkbox(&mut voice, "Voice")
                        .on_hover_text("Speak replies aloud and listen for the wake word")
                        .changed()
                    {
                        s.set_voice_enabled(voice);
                    }
                    ui.checkbox(&mut s.webcam_enabled, "Optic feed");
                });
            });
        });

    egui::TopBottomPanel::bottom("chat_input")
        .frame(
            egui::Frame::none()
                .fill(egui::Color32::from_rgb(12, 18, 26))
                .inner_margin(egui::Margin::symmetric(14.0, 10.0)),
        )
        .show(ctx, |ui| {
            if let Some(notice) = &s.chat_notice {
                ui.label(egui::RichText::new(notice).size(11.0).color(DIM));
            }
            ui.horizontal(|ui| {
                let input = ui.add_sized(
                    [ui.available_width() - 160.0, 36.0],
                    egui::TextEdit::singleline(&mut s.input_text)
                        .hint_text("Transmit a message...")
                        .font(egui::FontId::proportional(14.0)),
                );
                if input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    s.send_message();
                    input.request_focus();
                }

                let mic_label = if listening { "..." } else { "Mic" };
                if ui
                    .add_enabled(
                        !listening,
                        egui::Button::new(mic_label).min_size(egui::vec2(50.0, 36.0)),
                    )
                    .on_hover_text("Push to talk")
                    .clicked()
                {
                    s.start_listening();
                }

                let btn = if thinking {
                    egui::Button::new("Stop").fill(egui::Color32::from_rgb(180, 80, 80))
                } else {
                    egui::Button::new(egui::RichText::new("Send").color(egui::Color32::BLACK))
                        .fill(CYAN)
                };
                if ui.add_sized([70.0, 36.0], btn).clicked() {
                    if thinking {
                        s.cancel_completion();
                    } else {
                        s.send_message();
                    }
                }
            });
        });

    egui::CentralPanel::default()
        .frame(
            egui::Frame::none()
                .fill(egui::Color32::from_rgb(9, 13, 19))
                .inner_margin(egui::Margin::same(14.0)),
        )
        .show(ctx, |ui| {
            paint_neural_web(ui.painter(), ui.max_rect(), time);

            let messages: Vec<Message> = s
                .flow
                .session()
                .map(|session| session.transcript().messages().to_vec())
                .unwrap_or_default();

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for msg in &messages {
                        ui.add_space(5.0);
                        render_bubble(ui, msg);
                        ui.add_space(5.0);
                    }
                    if thinking {
                        let dots = match ((time * 2.0) as i32) % 4 {
                            0 => "   ",
                            1 => ".  ",
                            2 => ".. ",
                            _ => "...",
                        };
                        ui.label(
                            egui::RichText::new(format!("TIYA is thinking{dots}"))
                                .italics()
                                .color(DIM),
                        );
                    }
                });

            // Optic feed in the top-right corner, over the transcript.
            if s.webcam_enabled {
                s.webcam.tick(ctx);
                if let Some(texture) = s.webcam.texture() {
                    let size = egui::vec2(160.0, 120.0);
                    let rect = egui::Rect::from_min_size(
                        ui.max_rect().right_top() + egui::vec2(-size.x - 8.0, 8.0),
                        size,
                    );
                    ui.painter().image(
                        texture.id(),
                        rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                    ui.painter()
                        .rect_stroke(rect, egui::Rounding::same(4.0), egui::Stroke::new(1.0, CYAN));
                }
                s.webcam.mark_rendered();
            }
        });
}

fn render_bubble(ui: &mut egui::Ui, msg: &Message) {
    let from_user = msg.author == Author::User;
    let layout = if from_user {
        egui::Layout::right_to_left(egui::Align::TOP)
    } else {
        egui::Layout::left_to_right(egui::Align::TOP)
    };
    let fill = if from_user {
        egui::Color32::from_rgb(14, 60, 66)
    } else {
        egui::Color32::from_rgb(24, 30, 40)
    };

    ui.with_layout(layout, |ui| {
        egui::Frame::none()
            .fill(fill)
            .rounding(egui::Rounding::same(10.0))
            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
            .show(ui, |ui| {
                ui.set_max_width(ui.available_width() * 0.72);
                ui.vertical(|ui| {
                    ui.label(
                        egui::RichText::new(&msg.text)
                            .size(14.0)
                            .color(egui::Color32::from_rgb(215, 225, 230)),
                    );
                    ui.label(egui::RichText::new(msg.time_label()).size(9.0).color(DIM));
                });
            });
    });
}
