//! Core type definitions for the TIYA app.

use crate::flow::LoginFlow;
use crate::tasks::TaskRunner;
use crate::wake::WakeListener;
use crate::webcam::WebcamOverlay;
use services::document_store::{DocumentStore, FirestoreStore, InMemoryStore};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// System instruction prepended to every completion request.
pub const PERSONA_PREAMBLE: &str = "You are TIYA, a themed desktop AI companion with a calm, \
slightly futuristic voice. You speak in short, warm, confident sentences, \
occasionally using light sci-fi flavor (neural link, uplink, protocol) \
without overdoing it. You are helpful first and theatrical second: answer \
the user's actual question clearly, keep replies concise, and never invent \
capabilities you do not have.";

/// Reply used when no API key is configured (limited mode).
pub const LIMITED_MODE_REPLY: &str = "My neural core is running in limited mode: no API key is \
configured, so I can't reach the language service. Open the configuration \
screen and add a Gemini API key to bring me fully online.";

/// Login screen boot sequence, revealed line by line.
pub const BOOT_SEQUENCE: &[&str] = &[
    "TIYA NEURAL CORE v2.4 ... LOADED",
    "QUANTUM UPLINK ............ OK",
    "MEMORY LATTICE ............ OK",
    "SPEECH MATRIX ............. STANDBY",
    "OPTIC FEED ................ STANDBY",
    "AWAITING OPERATOR IDENTITY",
];

/// Chat-window status lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    /// Idle with a working uplink.
    Online,
    /// Credential check or other setup traffic in flight.
    Connecting,
    /// A completion is being generated.
    Thinking,
    /// No key, or the last delivery was a network failure.
    Offline,
}

impl StatusIndicator {
    pub fn label(&self) -> &'static str {
        match self {
            StatusIndicator::Online => "ONLINE",
            StatusIndicator::Connecting => "CONNECTING",
            StatusIndicator::Thinking => "THINKING",
            StatusIndicator::Offline => "OFFLINE",
        }
    }
}

pub struct AppState {
    pub runner: TaskRunner,
    pub flow: LoginFlow,
    pub store: Arc<dyn DocumentStore>,
    pub api_config: shared::config::ApiConfig,

    // Login screen
    pub username_input: String,
    pub access_code_input: String,
    pub login_status: Option<String>,

    // Setup screen
    pub key_input: String,
    pub setup_status: Option<String>,
    pub setup_status_is_error: bool,

    // Chat window
    pub input_text: String,
    pub status: StatusIndicator,
    pub chat_notice: Option<String>,
    pub voice_enabled: bool,
    pub webcam_enabled: bool,
    pub webcam: WebcamOverlay,
    pub wake_listener: Option<WakeListener>,
    pub wake_rx: Option<Receiver<String>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            runner: TaskRunner::new(),
            flow: LoginFlow::default(),
            store,
            api_config: shared::config::load_or_default(),
            username_input: String::new(),
            access_code_input: String::new(),
            login_status: None,
            key_input: String::new(),
            setup_status: None,
            setup_status_is_error: false,
            input_text: String::new(),
            status: StatusIndicator::Offline,
            chat_notice: None,
            voice_enabled: false,
            webcam_enabled: false,
            webcam: WebcamOverlay::synthetic(),
            wake_listener: None,
            wake_rx: None,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(default_store())
    }
}

/// Remote persistence when a Firestore project is configured, otherwise a
/// process-local store (credentials then live only for this run).
pub fn default_store() -> Arc<dyn DocumentStore> {
    if let Ok(project) = std::env::var("TIYA_FIRESTORE_PROJECT") {
        match FirestoreStore::new(&project) {
            Ok(store) => return Arc::new(store),
            Err(e) => {
                tracing::warn!("firestore unavailable ({e}); falling back to in-memory store")
            }
        }
    }
    Arc::new(InMemoryStore::new())
}
