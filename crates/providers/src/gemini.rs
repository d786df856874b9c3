use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::ChatMessage;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiCandidatePart {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

/// Thin wrapper around the generateContent endpoint. One request, one
/// response, no retries; failures bubble up for classification at the task
/// boundary.
pub struct GeminiClient {
    http: Client,
    auth_token: String,
    model: String,
    base_url: String,
}

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_ERROR_BODY: usize = 800;

/// Cut at most `max` bytes, backing up to a char boundary so multi-byte
/// text in an error body cannot split.
fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("no Gemini API key configured"));
        }
        Ok(Self {
            http: Client::builder().timeout(Duration::from_secs(45)).build()?,
            auth_token: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint. Used by tests against a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.auth_token
        );
        let mut system_instruction = None;
        let mut contents: Vec<GeminiContent> = Vec::new();
        for m in messages {
            if m.role == "system" {
                system_instruction = Some(GeminiContent {
                    role: "system".to_string(),
                    parts: vec![GeminiPart { text: m.content }],
                });
            } else {
                // Gemini expects roles "user" | "model"; we use "assistant".
                let role = match m.role.as_str() {
                    "assistant" => "model",
                    "user" => "user",
                    other => other,
                };
                contents.push(GeminiContent {
                    role: role.to_string(),
                    parts: vec![GeminiPart { text: m.content }],
                });
            }
        }
        let req = GeminiRequest {
            contents,
            system_instruction,
        };
        let resp = self.http.post(url).json(&req).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let body = body.trim();
            if body.is_empty() {
                return Err(anyhow!("gemini error: {}", status));
            }
            let body = if body.len() > MAX_ERROR_BODY {
                format!("{}...", truncate_on_char_boundary(body, MAX_ERROR_BODY))
            } else {
                body.to_string()
            };
            return Err(anyhow!("gemini error: {}\n{}", status, body));
        }
        let body: GeminiResponse = resp.json().await?;
        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
            .unwrap_or_default();
        Ok(text)
    }

    /// One-shot probe used by the setup screen: send "Hello" and require a
    /// non-empty reply. Returns the human-readable status line to persist in
    /// the config file.
    pub async fn validate(&self) -> Result<String> {
        let probe = vec![ChatMessage {
            role: "user".to_string(),
            content: "Hello".to_string(),
        }];
        let reply = self.generate(probe).await?;
        if reply.trim().is_empty() {
            return Err(anyhow!("invalid response from API"));
        }
        Ok("API key validated successfully".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serve exactly one canned HTTP response on a fresh local port.
    fn serve_once(status_line: &str, body: String) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status_line = status_line.to_string();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut data = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap_or(0);
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..n]);
                if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&data[..pos]).to_ascii_lowercase();
                    let len = headers
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if data.len() >= pos + 4 + len {
                        break;
                    }
                }
            }
            let resp = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(resp.as_bytes());
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_generate_against_stub_endpoint() {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "pong"}]}}]
        })
        .to_string();
        let base = serve_once("200 OK", body);
        let client = GeminiClient::new("AIza-test", "gemini-1.5-flash")
            .unwrap()
            .with_base_url(&base);

        let rt = tokio::runtime::Runtime::new().unwrap();
        let reply = rt
            .block_on(client.generate(vec![ChatMessage {
                role: "user".to_string(),
                content: "ping".to_string(),
            }]))
            .unwrap();
        assert_eq!(reply, "pong");
    }

    #[test]
    fn test_long_error_body_truncates_without_splitting_multibyte_text() {
        // 'é' straddles the truncation limit; the cut must back up to the
        // previous char boundary instead of panicking mid-character.
        let mut body = "a".repeat(MAX_ERROR_BODY - 1);
        body.push('é');
        body.push_str(&"b".repeat(200));
        let base = serve_once("400 Bad Request", body);
        let client = GeminiClient::new("AIza-test", "gemini-1.5-flash")
            .unwrap()
            .with_base_url(&base);

        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(client.generate(vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("gemini error: 400"), "{err}");
        assert!(err.ends_with("..."), "{err}");
        assert!(!err.contains('é'), "{err}");
    }

    #[test]
    fn test_truncation_backs_up_to_char_boundary() {
        let mut s = "a".repeat(799);
        s.push('é');
        assert_eq!(truncate_on_char_boundary(&s, 800).len(), 799);
        assert_eq!(truncate_on_char_boundary("short", 800), "short");
        assert_eq!(truncate_on_char_boundary("ééé", 3).len(), 2);
    }

    #[test]
    fn test_empty_key_is_rejected_up_front() {
        assert!(GeminiClient::new("", "gemini-1.5-flash").is_err());
        assert!(GeminiClient::new("   ", "gemini-1.5-flash").is_err());
    }

    #[test]
    fn test_request_maps_roles_for_wire_format() {
        // The request body must use "model" for assistant turns and hoist
        // the system turn into system_instruction.
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: "persona".to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            },
            ChatMessage {
                role: "assistant".to_string(),
                content: "hello".to_string(),
            },
        ];

        let mut system_instruction = None;
        let mut contents: Vec<GeminiContent> = Vec::new();
        for m in messages {
            if m.role == "system" {
                system_instruction = Some(GeminiContent {
                    role: "system".to_string(),
                    parts: vec![GeminiPart { text: m.content }],
                });
            } else {
                let role = match m.role.as_str() {
                    "assistant" => "model",
                    other => other,
                };
                contents.push(GeminiContent {
                    role: role.to_string(),
                    parts: vec![GeminiPart { text: m.content }],
                });
            }
        }

        let req = GeminiRequest {
            contents,
            system_instruction,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["system_instruction"]["parts"][0]["text"], "persona");
    }
}
