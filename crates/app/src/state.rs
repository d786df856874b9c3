//! State transitions and background-task wiring for the TIYA app.
//!
//! Everything here runs on the UI thread. Work that can block (HTTP, audio,
//! subprocess playback) is handed to the task runner; results come back as
//! deliveries that `poll` applies once per frame.

use crate::flow::FlowState;
use crate::tasks::{Busy, TaskOutput};
use crate::types::*;
use crate::utils::{conversation_to_api, export_transcript};
use crate::wake::WakeListener;
use futures::future::Abortable;
use providers::GeminiClient;
use services::audio::{encode_wav, MicrophoneCapture, TARGET_SAMPLE_RATE};
use services::document_store::ChatEntry;
use services::speech::{LocalSynthesizer, RemoteRecognizer, SpeechRecognizer, SpeechSynthesizer};
use shared::chat::Message;
use shared::config::ApiConfig;
use shared::task::{TaskError, TaskKind};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroize;

fn greeting_for(user: &str) -> String {
    format!(
        "Neural link established. Welcome back, {user}. How can I help you today?"
    )
}

impl AppState {
    // ----- login ---------------------------------------------------------

    /// Check the entered identity and, on success, start the stored-key
    /// lookup. The access code is wiped from the input either way.
    pub fn begin_login(&mut self) {
        let username = self.username_input.clone();
        let code = self.access_code_input.clone();
        self.access_code_input.zeroize();
        self.access_code_input.clear();

        if self.flow.submit_login(&username, &code) {
            self.login_status = Some("ACCESS GRANTED".to_string());
            self.start_credential_check();
        } else {
            self.login_status = self.flow.denial().map(str::to_string);
        }
    }

    /// Background lookup of the stored API key. Both "no record" and a
    /// failed lookup route to the setup screen when the delivery arrives.
    fn start_credential_check(&mut self) {
        let Some(session) = self.flow.session() else {
            return;
        };
        let identity = session.user.clone();
        let store = Arc::clone(&self.store);
        self.status = StatusIndicator::Connecting;

        let submitted = self.runner.submit(TaskKind::Validation, move |_abort| {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| TaskError::Unrecognized(e.to_string()))?;
            let key = rt
                .block_on(store.get_key(&identity))
                .map_err(|e| TaskError::Persist(e.to_string()))?;
            if let Err(e) = rt.block_on(store.update_last_login(&identity)) {
                tracing::warn!("last-login update failed: {e}");
            }
            Ok(TaskOutput::StoredKey(key))
        });
        if let Err(busy) = submitted {
            // Can only happen on a double-click race; the first check wins.
            tracing::debug!("{busy}");
        }
    }

    // ----- key setup -----------------------------------------------------

    /// Validate the entered key with a one-shot probe, then persist it to
    /// the local config file and the document store.
    pub fn begin_key_validation(&mut self) {
        let key = self.key_input.trim().to_string();
        if key.is_empty() {
            self.setup_status = Some("Enter an API key first.".to_string());
            self.setup_status_is_error = true;
            return;
        }
        let Some(session) = self.flow.session() else {
            return;
        };
        let identity = session.user.clone();
        let store = Arc::clone(&self.store);

        let submitted = self.runner.submit(TaskKind::Validation, move |abort| {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| TaskError::Unrecognized(e.to_string()))?;
            let client = GeminiClient::new(&key, GEMINI_MODEL)
                .map_err(|e| TaskError::classify(&e.to_string()))?;

            let message = match rt.block_on(Abortable::new(client.validate(), abort)) {
                Ok(Ok(message)) => message,
                Ok(Err(e)) => return Err(TaskError::classify(&e.to_string())),
                Err(_aborted) => {
                    return Err(TaskError::Unrecognized("validation cancelled".to_string()))
                }
            };

            // Persist only after the probe succeeded.
            let config = ApiConfig {
                gemini_api_key: key.clone(),
                configured: true,
                setup_date: chrono::Utc::now().to_rfc3339(),
                validation_message: message.clone(),
            };
            shared::config::save(&config).map_err(|e| TaskError::Persist(e.to_string()))?;
            rt.block_on(store.store_key(&identity, &key))
                .map_err(|e| TaskError::Persist(e.to_string()))?;

            Ok(TaskOutput::KeyAccepted { key, message })
        });

        match submitted {
            Ok(()) => {
                self.setup_status = Some("Validating key...".to_string());
                self.setup_status_is_error = false;
            }
            Err(Busy(_)) => {
                self.setup_status = Some("Validation already running.".to_string());
                self.setup_status_is_error = true;
            }
        }
    }

    /// Proceed without a key (limited mode).
    pub fn skip_setup(&mut self) {
        self.flow.skip_setup();
        if self.flow.state() == FlowState::Ready {
            self.enter_ready();
        }
    }

    fn enter_ready(&mut self) {
        let (greeting, has_key) = match self.flow.session() {
            Some(s) => (greeting_for(&s.user), s.has_api_key()),
            None => return,
        };
        if let Some(session) = self.flow.session_mut() {
            session.append(Message::assistant(greeting));
        }
        self.status = if has_key {
            StatusIndicator::Online
        } else {
            StatusIndicator::Offline
        };
    }

    // ----- chat ----------------------------------------------------------

    /// Send the typed message. One Completion task per send; a send while
    /// one is already in flight is rejected and surfaced as a notice, with
    /// the pending task left untouched.
    pub fn send_message(&mut self) {
        let text = self.input_text.trim().to_string();
        if text.is_empty() {
            return;
        }
        if self.runner.is_pending(TaskKind::Completion) {
            self.chat_notice = Some("Still thinking about the last one.".to_string());
            return;
        }
        let Some(session) = self.flow.session_mut() else {
            return;
        };

        session.append(Message::user(text));
        self.input_text.clear();
        self.chat_notice = None;

        let Some(key) = session.api_key().map(str::to_string) else {
            // Limited mode: no provider call, canned reply.
            session.append(Message::assistant(LIMITED_MODE_REPLY));
            self.status = StatusIndicator::Offline;
            return;
        };
        let history = conversation_to_api(PERSONA_PREAMBLE, session.transcript());
        self.status = StatusIndicator::Thinking;

        let submitted = self.runner.submit(TaskKind::Completion, move |abort| {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| TaskError::Unrecognized(e.to_string()))?;
            let client = GeminiClient::new(&key, GEMINI_MODEL)
                .map_err(|e| TaskError::classify(&e.to_string()))?;
            match rt.block_on(Abortable::new(client.generate(history), abort)) {
                Ok(Ok(reply)) => Ok(TaskOutput::Completion(reply)),
                Ok(Err(e)) => Err(TaskError::classify(&e.to_string())),
                Err(_aborted) => Err(TaskError::Unrecognized("generation cancelled".to_string())),
            }
        });
        if submitted.is_err() {
            // Checked above; unreachable in practice.
            self.status = StatusIndicator::Online;
        }
    }

    /// Stop the in-flight completion, if any. Its delivery will be dropped.
    pub fn cancel_completion(&mut self) {
        self.runner.cancel(TaskKind::Completion);
        self.status = if self
            .flow
            .session()
            .map(|s| s.has_api_key())
            .unwrap_or(false)
        {
            StatusIndicator::Online
        } else {
            StatusIndicator::Offline
        };
    }

    /// One push-to-talk capture. The microphone is exclusive: a second
    /// request while one is listening is rejected as busy.
    pub fn start_listening(&mut self) {
        let submitted = self.runner.submit(TaskKind::Recognition, move |_abort| {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| TaskError::Unrecognized(e.to_string()))?;
            let mic = MicrophoneCapture::new()
                .map_err(|e| TaskError::Recognition(e.to_string()))?;
            let clip = mic
                .capture_clip(Duration::from_secs(4))
                .map_err(|e| TaskError::Recognition(e.to_string()))?;
            let wav = encode_wav(&clip, TARGET_SAMPLE_RATE);
            let recognizer =
                RemoteRecognizer::new("").map_err(|e| TaskError::Recognition(e.to_string()))?;
            let text = rt
                .block_on(recognizer.recognize(&wav))
                .map_err(|e| TaskError::Recognition(e.to_string()))?;
            Ok(TaskOutput::Recognition(text))
        });
        match submitted {
            Ok(()) => self.chat_notice = Some("Listening...".to_string()),
            Err(Busy(_)) => self.chat_notice = Some("Already listening.".to_string()),
        }
    }

    /// Speak a reply. The speaker is exclusive; an overlapping request is
    /// dropped rather than queued.
    fn speak(&mut self, text: String) {
        let submitted = self.runner.submit(TaskKind::Synthesis, move |_abort| {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| TaskError::Unrecognized(e.to_string()))?;
            rt.block_on(LocalSynthesizer::default().speak(&text))
                .map_err(|e| TaskError::Unrecognized(e.to_string()))?;
            Ok(TaskOutput::Synthesis)
        });
        if submitted.is_err() {
            tracing::debug!("speaker busy, dropping synthesis request");
        }
    }

    /// Toggle voice mode: speech output plus the wake-word listener.
    pub fn set_voice_enabled(&mut self, enabled: bool) {
        self.voice_enabled = enabled;
        if enabled && self.wake_listener.is_none() {
            let (tx, rx) = channel();
            self.wake_listener = Some(WakeListener::spawn(tx));
            self.wake_rx = Some(rx);
        } else if !enabled {
            if let Some(listener) = self.wake_listener.take() {
                listener.stop();
            }
            self.wake_rx = None;
        }
    }

    /// Archive the conversation, wipe it, and greet afresh.
    pub fn clear_conversation(&mut self) {
        let Some(session) = self.flow.session_mut() else {
            return;
        };
        if !session.transcript().is_empty() {
            let identity = session.user.clone();
            let entry = ChatEntry::new(session.transcript().messages().to_vec());
            let store = Arc::clone(&self.store);
            // Fire-and-forget archive; failure only costs history.
            std::thread::spawn(move || {
                if let Ok(rt) = tokio::runtime::Runtime::new() {
                    if let Err(e) = rt.block_on(store.append_chat_entry(&identity, entry)) {
                        tracing::warn!("conversation archive failed: {e}");
                    }
                }
            });
        }
        session.clear_transcript();
        let greeting = greeting_for(&session.user);
        session.append(Message::assistant(greeting));
    }

    pub fn export_logs(&mut self) {
        let Some(session) = self.flow.session() else {
            return;
        };
        match export_transcript(session) {
            Ok(path) => {
                self.chat_notice = Some(format!("Log exported to {}", path.display()));
            }
            Err(e) => {
                self.chat_notice = Some(TaskError::Persist(e.to_string()).user_message());
            }
        }
    }

    // ----- delivery handling ---------------------------------------------

    /// Drain task deliveries and wake-word commands. Called once per frame.
    pub fn poll(&mut self) {
        for delivery in self.runner.poll() {
            self.apply_outcome(delivery.kind, delivery.outcome);
        }

        let commands: Vec<String> = match &self.wake_rx {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        };
        for command in commands {
            if self.flow.state() == FlowState::Ready {
                self.input_text = command;
                self.send_message();
            }
        }
    }

    /// Apply one delivery to UI state. The status lamp always leaves its
    /// busy state here, success or not.
    pub fn apply_outcome(&mut self, kind: TaskKind, outcome: Result<TaskOutput, TaskError>) {
        match (kind, outcome) {
            (TaskKind::Completion, Ok(TaskOutput::Completion(reply))) => {
                if let Some(session) = self.flow.session_mut() {
                    session.append(Message::assistant(reply.clone()));
                }
                self.status = StatusIndicator::Online;
                if self.voice_enabled {
                    self.speak(reply);
                }
            }
            (TaskKind::Completion, Err(e)) => {
                tracing::warn!("completion failed: {e}");
                if let Some(session) = self.flow.session_mut() {
                    session.append(Message::assistant(e.user_message()));
                }
                self.status = match e {
                    TaskError::Network(_) => StatusIndicator::Offline,
                    _ => StatusIndicator::Online,
                };
            }

            (TaskKind::Recognition, Ok(TaskOutput::Recognition(text))) => {
                self.chat_notice = None;
                self.input_text = text;
                self.send_message();
            }
            (TaskKind::Recognition, Err(e)) => {
                self.chat_notice = Some(e.user_message());
            }

            (TaskKind::Synthesis, Ok(_)) => {}
            (TaskKind::Synthesis, Err(e)) => {
                tracing::warn!("speech synthesis failed: {e}");
            }

            (TaskKind::Validation, Ok(TaskOutput::StoredKey(stored))) => {
                let found = stored.is_some();
                self.flow.lookup_finished(stored);
                if found {
                    self.enter_ready();
                } else {
                    // Setup screen; prefill from the local config file.
                    self.key_input = self
                        .api_config
                        .configured_key()
                        .unwrap_or_default()
                        .to_string();
                    self.status = StatusIndicator::Offline;
                }
            }
            (TaskKind::Validation, Ok(TaskOutput::KeyAccepted { key, message })) => {
                self.api_config.gemini_api_key = key.clone();
                self.api_config.configured = true;
                self.api_config.validation_message = message;
                self.flow.key_accepted(key);
                self.key_input.zeroize();
                self.key_input.clear();
                self.setup_status = None;
                self.enter_ready();
            }
            (TaskKind::Validation, Err(e)) => match self.flow.state() {
                FlowState::CredentialCheck => {
                    tracing::warn!("stored-key lookup failed: {e}");
                    self.flow.lookup_failed();
                    self.key_input = self
                        .api_config
                        .configured_key()
                        .unwrap_or_default()
                        .to_string();
                    self.status = StatusIndicator::Offline;
                }
                // Setup-screen failure: message shown inline, entered key
                // kept for retry.
                _ => {
                    self.setup_status = Some(e.user_message());
                    self.setup_status_is_error = true;
                }
            },

            (kind, outcome) => {
                tracing::warn!("mismatched delivery for {}: {:?}", kind.as_str(), outcome);
            }
        }
    }

    /// Window close: nothing in flight may touch state afterwards.
    pub fn shutdown(&mut self) {
        self.runner.cancel_all();
        if let Some(listener) = self.wake_listener.take() {
            listener.stop();
        }
        self.wake_rx = None;
    }
}
