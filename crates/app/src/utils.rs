//! Helper functions shared by the screens and state methods.

use anyhow::{anyhow, Result};
use shared::agent_api::ChatMessage as ApiChatMessage;
use shared::chat::{Author, Session, Transcript};
use std::path::{Path, PathBuf};

/// Build the wire-format conversation: persona preamble as the system turn,
/// then the transcript in order.
pub fn conversation_to_api(persona: &str, transcript: &Transcript) -> Vec<ApiChatMessage> {
    let mut out = Vec::with_capacity(transcript.len() + 1);
    out.push(ApiChatMessage {
        role: "system".to_string(),
        content: persona.to_string(),
    });
    for msg in transcript.messages() {
        out.push(ApiChatMessage {
            role: match msg.author {
                Author::User => "user".to_string(),
                Author::Assistant => "assistant".to_string(),
            },
            content: msg.text.clone(),
        });
    }
    out
}

/// Write the transcript as a plain-text log into `dir`. Returns the path of
/// the created file.
pub fn export_transcript_to(session: &Session, dir: &Path) -> Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("tiya_log_{stamp}.txt"));

    let mut body = format!(
        "TIYA session log\noperator: {}\nexported: {}\n\n",
        session.user,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for msg in session.transcript().messages() {
        let who = match msg.author {
            Author::User => "YOU",
            Author::Assistant => "TIYA",
        };
        body.push_str(&format!("[{}] {}: {}\n", msg.time_label(), who, msg.text));
    }
    std::fs::write(&path, body)?;
    Ok(path)
}

/// Export into the local app data directory.
pub fn export_transcript(session: &Session) -> Result<PathBuf> {
    let proj = directories::ProjectDirs::from("com.local", "TIYA", "Tiya")
        .ok_or_else(|| anyhow!("no writable data directory"))?;
    let dir = proj.data_local_dir().join("logs");
    std::fs::create_dir_all(&dir)?;
    export_transcript_to(session, &dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::chat::Message;

    #[test]
    fn test_conversation_starts_with_persona_system_turn() {
        let mut t = Transcript::new();
        t.append(Message::user("hello"));
        t.append(Message::assistant("hi there"));

        let wire = conversation_to_api("persona text", &t);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[0].content, "persona text");
        assert_eq!(wire[1].role, "user");
        assert_eq!(wire[2].role, "assistant");
    }

    #[test]
    fn test_export_writes_every_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new("operator");
        session.append(Message::user("first question"));
        session.append(Message::assistant("first answer"));

        let path = export_transcript_to(&session, dir.path()).unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("operator"));
        assert!(body.contains("first question"));
        assert!(body.contains("first answer"));
    }
}
