use eframe::egui;
use parking_lot::Mutex;
use std::sync::Arc;

mod api_setup;
mod chat;
mod decor;
mod flow;
mod login;
mod state;
mod tasks;
mod types;
mod utils;
mod wake;
mod webcam;

use flow::FlowState;
use types::AppState;

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 700.0])
            .with_min_inner_size([760.0, 540.0]),
        vsync: true,
        ..Default::default()
    };
    eframe::run_native(
        "TIYA",
        options,
        Box::new(|_cc| {
            Box::new(TiyaApp {
                state: Arc::new(Mutex::new(AppState::default())),
            })
        }),
    )
}

struct TiyaApp {
    state: Arc<Mutex<AppState>>,
}

impl eframe::App for TiyaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut s = self.state.lock();

        // Apply finished background work before drawing anything.
        s.poll();

        if s.runner.any_pending() {
            ctx.request_repaint();
        }

        match s.flow.state() {
            FlowState::LoggedOut | FlowState::Authenticating | FlowState::CredentialCheck => {
                login::render_login_screen(&mut s, ctx)
            }
            FlowState::CredentialSetup => api_setup::render_setup_screen(&mut s, ctx),
            FlowState::Ready => chat::render_chat_screen(&mut s, ctx),
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Discard anything in flight; late deliveries must not land on a
        // closed window.
        self.state.lock().shutdown();
    }
}
