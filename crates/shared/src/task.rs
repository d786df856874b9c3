//! Background task vocabulary: kinds, delivery outcomes, and the error
//! taxonomy used everywhere a worker talks back to the UI thread.

use thiserror::Error;

/// One unit of off-thread work. At most one task of a given kind may be
/// outstanding per window; a second submission is rejected with `Busy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Generative-text completion request.
    Completion,
    /// Speech-to-text capture + recognition.
    Recognition,
    /// Text-to-speech playback.
    Synthesis,
    /// Credential lookup / key validation / key save.
    Validation,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Completion => "completion",
            TaskKind::Recognition => "recognition",
            TaskKind::Synthesis => "synthesis",
            TaskKind::Validation => "validation",
        }
    }
}

/// Classified failure delivered when a task fails.
///
/// External-client failures are mapped by substring heuristics on the error
/// text (see [`TaskError::classify`]); anything unmatched is `Unrecognized`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("quota or rate limit exceeded: {0}")]
    Quota(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("persist failed: {0}")]
    Persist(String),
    #[error("speech recognition failed: {0}")]
    Recognition(String),
    #[error("{0}")]
    Unrecognized(String),
}

impl TaskError {
    /// Map raw client error text into the taxonomy.
    ///
    /// These are substring heuristics against whatever the provider happened
    /// to put in the body; they are fragile by nature and should be
    /// re-checked whenever the provider is swapped.
    pub fn classify(raw: &str) -> TaskError {
        let lower = raw.to_lowercase();

        if lower.contains("api key")
            || lower.contains("api_key")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("permission")
            || lower.contains("401")
            || lower.contains("403")
        {
            return TaskError::Auth(raw.to_string());
        }

        if lower.contains("quota")
            || lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("resource_exhausted")
            || lower.contains("429")
        {
            return TaskError::Quota(raw.to_string());
        }

        if lower.contains("connection")
            || lower.contains("network")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("dns")
            || lower.contains("could not resolve")
            || lower.contains("unreachable")
        {
            return TaskError::Network(raw.to_string());
        }

        TaskError::Unrecognized(raw.to_string())
    }

    /// Status-line wording shown while the error is visible.
    pub fn user_message(&self) -> String {
        match self {
            TaskError::Auth(_) => {
                "Neural link rejected: the API key looks invalid or revoked. \
                 Re-check it in the configuration screen."
                    .to_string()
            }
            TaskError::Quota(_) => {
                "Cognitive bandwidth exhausted: the API quota or rate limit was hit. \
                 Wait a moment and try again."
                    .to_string()
            }
            TaskError::Network(_) => {
                "Uplink unstable: I couldn't reach the service. \
                 Check your network connection."
                    .to_string()
            }
            TaskError::Persist(detail) => {
                format!("I couldn't save that: {detail}. Your input is still here; try again.")
            }
            TaskError::Recognition(detail) => {
                format!("I didn't catch that: {detail}")
            }
            TaskError::Unrecognized(detail) => {
                format!("Neural processing error: {detail}")
            }
        }
    }
}
