//! Continuous wake-word listener.
//!
//! Runs on its own long-lived thread, outside the task runner: it is not a
//! one-shot job but a loop of capture -> recognize -> match. Recognized
//! commands are posted over an mpsc channel that the UI drains alongside
//! task deliveries. The thread exits when the stop flag is raised or the
//! channel's receiver is dropped.

use services::audio::{encode_wav, MicrophoneCapture, TARGET_SAMPLE_RATE};
use services::speech::{RecognitionFailure, RemoteRecognizer, SpeechRecognizer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

const WAKE_WORD: &str = "tiya";
const CLIP_SECONDS: u64 = 3;

/// If the utterance contains the wake word, return whatever follows it as
/// the command, lowercased. A bare wake word (nothing after it) is not a
/// command. Matching and slicing both happen on the lowercased text:
/// lowercasing can change byte lengths (e.g. U+0130), so an index found in
/// one string must never slice the other.
pub fn extract_command(utterance: &str) -> Option<String> {
    let lower = utterance.to_lowercase();
    let idx = lower.find(WAKE_WORD)?;
    let rest = lower[idx + WAKE_WORD.len()..]
        .trim_start_matches([',', '.', '!', '?', ':', ' '])
        .trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

pub struct WakeListener {
    stop: Arc<AtomicBool>,
}

impl WakeListener {
    pub fn spawn(tx: Sender<String>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        std::thread::spawn(move || listen_loop(tx, flag));
        Self { stop }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for WakeListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen_loop(tx: Sender<String>, stop: Arc<AtomicBool>) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("wake listener could not start a runtime: {e}");
            return;
        }
    };
    let capture = match MicrophoneCapture::new() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("wake listener disabled, no microphone: {e}");
            return;
        }
    };
    let recognizer = match RemoteRecognizer::new("") {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("wake listener disabled, recognizer unavailable: {e}");
            return;
        }
    };

    tracing::info!("wake listener running");
    while !stop.load(Ordering::SeqCst) {
        let clip = match capture.capture_clip(Duration::from_secs(CLIP_SECONDS)) {
            Ok(clip) => clip,
            Err(e) => {
                tracing::warn!("wake capture failed: {e}");
                std::thread::sleep(Duration::from_secs(2));
                continue;
            }
        };
        let wav = encode_wav(&clip, TARGET_SAMPLE_RATE);

        match rt.block_on(recognizer.recognize(&wav)) {
            Ok(text) => {
                if let Some(command) = extract_command(&text) {
                    tracing::debug!("wake word matched");
                    if tx.send(command).is_err() {
                        // UI side is gone.
                        break;
                    }
                }
            }
            Err(RecognitionFailure::NoSpeech) => {}
            Err(e) => {
                tracing::debug!("wake recognition failed: {e}");
                std::thread::sleep(Duration::from_secs(2));
            }
        }
    }
    tracing::info!("wake listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_after_wake_word_is_extracted() {
        assert_eq!(
            extract_command("Tiya, what time is it"),
            Some("what time is it".to_string())
        );
        assert_eq!(
            extract_command("hey tiya open the log"),
            Some("open the log".to_string())
        );
    }

    #[test]
    fn test_bare_wake_word_is_not_a_command() {
        assert_eq!(extract_command("tiya"), None);
        assert_eq!(extract_command("hey tiya!"), None);
    }

    #[test]
    fn test_no_wake_word_no_command() {
        assert_eq!(extract_command("what time is it"), None);
    }

    #[test]
    fn test_length_changing_lowercase_does_not_panic() {
        // 'İ' (U+0130) lowercases to two chars and grows by a byte, shifting
        // every index after it relative to the original string.
        assert_eq!(extract_command("İtiya"), None);
        assert_eq!(
            extract_command("İ Tiya status report"),
            Some("status report".to_string())
        );
    }
}
