//! Speech collaborators: a remote speech-to-text service and a local
//! text-to-speech engine. Each exposes a single call that a task worker
//! blocks on; neither is ever invoked from the UI thread.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Why a recognition attempt produced no usable transcript.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionFailure {
    #[error("no speech detected")]
    NoSpeech,
    #[error("ambiguous audio: {0}")]
    Ambiguous(String),
    #[error("speech service unreachable: {0}")]
    Service(String),
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe one utterance (16kHz mono PCM WAV bytes).
    async fn recognize(&self, wav: &[u8]) -> Result<String, RecognitionFailure>;
}

/// Web-speech endpoint client. Posts the clip and takes the first
/// transcript alternative above the confidence floor.
pub struct RemoteRecognizer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    result: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternative: Vec<RecognizeAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognizeAlternative {
    transcript: String,
    #[serde(default)]
    confidence: Option<f32>,
}

const DEFAULT_SPEECH_ENDPOINT: &str = "http://www.google.com/speech-api/v2/recognize";
const MIN_CONFIDENCE: f32 = 0.3;

impl RemoteRecognizer {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
            endpoint: DEFAULT_SPEECH_ENDPOINT.to_string(),
            api_key: api_key.to_string(),
            language: "en-US".to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    fn pick_transcript(body: &str) -> Result<String, RecognitionFailure> {
        // The service streams one JSON object per line; the first line is
        // usually an empty result placeholder.
        for line in body.lines() {
            let parsed: RecognizeResponse = match serde_json::from_str(line) {
                Ok(p) => p,
                Err(_) => continue,
            };
            for result in parsed.result {
                for alt in result.alternative {
                    let confident = alt.confidence.map(|c| c >= MIN_CONFIDENCE).unwrap_or(true);
                    if !alt.transcript.trim().is_empty() && confident {
                        return Ok(alt.transcript.trim().to_string());
                    }
                    if !alt.transcript.trim().is_empty() {
                        return Err(RecognitionFailure::Ambiguous(alt.transcript));
                    }
                }
            }
        }
        Err(RecognitionFailure::NoSpeech)
    }
}

#[async_trait]
impl SpeechRecognizer for RemoteRecognizer {
    async fn recognize(&self, wav: &[u8]) -> Result<String, RecognitionFailure> {
        let url = format!(
            "{}?client=chromium&lang={}&key={}",
            self.endpoint, self.language, self.api_key
        );
        let resp = self
            .http
            .post(url)
            .header("Content-Type", "audio/l16; rate=16000")
            .body(wav.to_vec())
            .send()
            .await
            .map_err(|e| RecognitionFailure::Service(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(RecognitionFailure::Service(format!(
                "speech service error: {}",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| RecognitionFailure::Service(e.to_string()))?;
        Self::pick_transcript(&body)
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak the text and return once playback finishes.
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Local synthesis via the platform speech engine (`say` on macOS,
/// `espeak-ng` elsewhere). The worker blocks until playback completes,
/// which is what keeps the speaker an exclusive resource.
pub struct LocalSynthesizer {
    words_per_minute: u32,
}

impl Default for LocalSynthesizer {
    fn default() -> Self {
        Self {
            words_per_minute: 170,
        }
    }
}

impl LocalSynthesizer {
    pub fn new(words_per_minute: u32) -> Self {
        Self { words_per_minute }
    }

    fn command(&self, text: &str) -> Command {
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("say");
            cmd.arg("-r").arg(self.words_per_minute.to_string()).arg(text);
            cmd
        }
        #[cfg(not(target_os = "macos"))]
        {
            let mut cmd = Command::new("espeak-ng");
            cmd.arg("-s").arg(self.words_per_minute.to_string()).arg(text);
            cmd
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for LocalSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let status = self
            .command(text)
            .status()
            .await
            .map_err(|e| anyhow!("speech engine unavailable: {e}"))?;
        if !status.success() {
            return Err(anyhow!("speech engine exited with {status}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_transcript_skips_empty_first_line() {
        let body = "{\"result\":[]}\n{\"result\":[{\"alternative\":[{\"transcript\":\"hello tiya\",\"confidence\":0.92}],\"final\":true}],\"result_index\":0}";
        assert_eq!(
            RemoteRecognizer::pick_transcript(body).unwrap(),
            "hello tiya"
        );
    }

    #[test]
    fn test_no_result_lines_is_no_speech() {
        assert_eq!(
            RemoteRecognizer::pick_transcript("{\"result\":[]}"),
            Err(RecognitionFailure::NoSpeech)
        );
        assert_eq!(
            RemoteRecognizer::pick_transcript(""),
            Err(RecognitionFailure::NoSpeech)
        );
    }

    #[test]
    fn test_low_confidence_is_ambiguous() {
        let body = "{\"result\":[{\"alternative\":[{\"transcript\":\"maybe this\",\"confidence\":0.1}]}]}";
        assert!(matches!(
            RemoteRecognizer::pick_transcript(body),
            Err(RecognitionFailure::Ambiguous(_))
        ));
    }

    #[test]
    fn test_missing_confidence_is_accepted() {
        let body = "{\"result\":[{\"alternative\":[{\"transcript\":\"open the log\"}]}]}";
        assert_eq!(
            RemoteRecognizer::pick_transcript(body).unwrap(),
            "open the log"
        );
    }

    #[tokio::test]
    async fn test_recognize_against_stub_endpoint() {
        let body = "{\"result\":[]}\n{\"result\":[{\"alternative\":[{\"transcript\":\"status report\",\"confidence\":0.9}]}]}".to_string();
        let base = crate::test_http::serve_once("200 OK", body);
        let recognizer = RemoteRecognizer::new("key").unwrap().with_endpoint(&base);

        let text = recognizer.recognize(&[0u8; 32]).await.unwrap();
        assert_eq!(text, "status report");
    }

    #[tokio::test]
    async fn test_recognize_maps_http_failure_to_service_error() {
        let base = crate::test_http::serve_once("500 Internal Server Error", String::new());
        let recognizer = RemoteRecognizer::new("key").unwrap().with_endpoint(&base);

        assert!(matches!(
            recognizer.recognize(&[0u8; 32]).await,
            Err(RecognitionFailure::Service(_))
        ));
    }

    #[test]
    fn test_speech_rate_reaches_the_engine_invocation() {
        let synth = LocalSynthesizer::new(120);
        let cmd = synth.command("hello");
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"120".to_string()), "{args:?}");
        assert!(args.contains(&"hello".to_string()), "{args:?}");
    }
}
