//! Remote document store for credentials, preferences, and chat history.
//!
//! The store is an explicitly constructed collaborator passed into the app
//! (never a global), so tests can substitute [`InMemoryStore`]. Identities
//! are passed through a one-way hash before use as record keys; the clear
//! username never reaches the store.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// SHA-256 hex of the lowercased identity. Used as the document key so the
/// store never sees the clear username.
pub fn hash_identity(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One archived conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub messages: Vec<shared::chat::Message>,
    pub timestamp: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(messages: Vec<shared::chat::Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages,
            timestamp: Utc::now(),
        }
    }
}

/// CRUD surface over the remote store. Every call is a single round trip;
/// callers run these from a task worker, never the UI thread.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Save or replace the stored API key for this identity.
    async fn store_key(&self, identity: &str, key: &str) -> Result<()>;

    /// `Ok(None)` means no record; `Err` means the lookup itself failed.
    /// Callers route both to the setup screen, but only the latter is a
    /// store failure worth logging.
    async fn get_key(&self, identity: &str) -> Result<Option<String>>;

    async fn store_preferences(&self, identity: &str, prefs: serde_json::Value) -> Result<()>;
    async fn get_preferences(&self, identity: &str) -> Result<serde_json::Value>;

    async fn append_chat_entry(&self, identity: &str, entry: ChatEntry) -> Result<()>;
    async fn list_recent_chat_entries(&self, identity: &str, limit: usize)
        -> Result<Vec<ChatEntry>>;

    /// Remove the user record and all chat history.
    async fn delete_all(&self, identity: &str) -> Result<()>;

    async fn update_last_login(&self, identity: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
struct UserRecord {
    api_key: Option<String>,
    preferences: Option<serde_json::Value>,
    chats: Vec<ChatEntry>,
    last_login: Option<DateTime<Utc>>,
}

/// In-memory store used in tests and when the app runs without remote
/// persistence configured.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, UserRecord>>,
    /// When set, every call fails as if the network were down.
    offline: Mutex<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    fn check_online(&self) -> Result<()> {
        if *self.offline.lock() {
            Err(anyhow!("document store unreachable: connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn store_key(&self, identity: &str, key: &str) -> Result<()> {
        self.check_online()?;
        let mut records = self.records.lock();
        let record = records.entry(hash_identity(identity)).or_default();
        record.api_key = Some(key.to_string());
        Ok(())
    }

    async fn get_key(&self, identity: &str) -> Result<Option<String>> {
        self.check_online()?;
        let records = self.records.lock();
        Ok(records
            .get(&hash_identity(identity))
            .and_then(|r| r.api_key.clone()))
    }

    async fn store_preferences(&self, identity: &str, prefs: serde_json::Value) -> Result<()> {
        self.check_online()?;
        let mut records = self.records.lock();
        records.entry(hash_identity(identity)).or_default().preferences = Some(prefs);
        Ok(())
    }

    async fn get_preferences(&self, identity: &str) -> Result<serde_json::Value> {
        self.check_online()?;
        let records = self.records.lock();
        Ok(records
            .get(&hash_identity(identity))
            .and_then(|r| r.preferences.clone())
            .unwrap_or_else(|| serde_json::json!({})))
    }

    async fn append_chat_entry(&self, identity: &str, entry: ChatEntry) -> Result<()> {
        self.check_online()?;
        let mut records = self.records.lock();
        records
            .entry(hash_identity(identity))
            .or_default()
            .chats
            .push(entry);
        Ok(())
    }

    async fn list_recent_chat_entries(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<ChatEntry>> {
        self.check_online()?;
        let records = self.records.lock();
        let mut chats = records
            .get(&hash_identity(identity))
            .map(|r| r.chats.clone())
            .unwrap_or_default();
        chats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        chats.truncate(limit);
        Ok(chats)
    }

    async fn delete_all(&self, identity: &str) -> Result<()> {
        self.check_online()?;
        self.records.lock().remove(&hash_identity(identity));
        Ok(())
    }

    async fn update_last_login(&self, identity: &str) -> Result<()> {
        self.check_online()?;
        let mut records = self.records.lock();
        records.entry(hash_identity(identity)).or_default().last_login = Some(Utc::now());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Firestore REST implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct FirestoreValue {
    #[serde(rename = "stringValue", skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
}

impl FirestoreValue {
    fn string(s: impl Into<String>) -> Self {
        Self {
            string_value: Some(s.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: HashMap<String, FirestoreValue>,
}

/// Thin wrapper over the Firestore REST API. User records live under
/// `users/{identity_hash}`, chat entries under `users/{hash}/chats/{id}`.
pub struct FirestoreStore {
    http: reqwest::Client,
    base_url: String,
}

impl FirestoreStore {
    pub fn new(project_id: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
            base_url: format!(
                "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents"
            ),
        })
    }

    /// Point the client at a different endpoint (emulator or test stub).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn user_url(&self, identity: &str) -> String {
        format!("{}/users/{}", self.base_url, hash_identity(identity))
    }

    async fn fetch_user(&self, identity: &str) -> Result<Option<FirestoreDocument>> {
        let resp = self.http.get(self.user_url(identity)).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(anyhow!("firestore error: {}", resp.status()));
        }
        Ok(Some(resp.json().await?))
    }

    async fn patch_user(
        &self,
        identity: &str,
        fields: HashMap<String, FirestoreValue>,
    ) -> Result<()> {
        let mask: Vec<String> = fields.keys().map(|k| format!("updateMask.fieldPaths={k}")).collect();
        let url = format!("{}?{}", self.user_url(identity), mask.join("&"));
        let doc = FirestoreDocument { fields };
        let resp = self.http.patch(url).json(&doc).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("firestore error: {}", resp.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn store_key(&self, identity: &str, key: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut fields = HashMap::new();
        fields.insert("api_key".to_string(), FirestoreValue::string(key));
        fields.insert("last_updated".to_string(), FirestoreValue::string(&now));
        fields.insert(
            "username_hash".to_string(),
            FirestoreValue::string(hash_identity(identity)),
        );
        self.patch_user(identity, fields)
            .await
            .context("storing API key")
    }

    async fn get_key(&self, identity: &str) -> Result<Option<String>> {
        let doc = self.fetch_user(identity).await.context("retrieving API key")?;
        Ok(doc.and_then(|d| {
            d.fields
                .get("api_key")
                .and_then(|v| v.string_value.clone())
        }))
    }

    async fn store_preferences(&self, identity: &str, prefs: serde_json::Value) -> Result<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "preferences".to_string(),
            FirestoreValue::string(prefs.to_string()),
        );
        fields.insert(
            "preferences_updated".to_string(),
            FirestoreValue::string(Utc::now().to_rfc3339()),
        );
        self.patch_user(identity, fields)
            .await
            .context("storing preferences")
    }

    async fn get_preferences(&self, identity: &str) -> Result<serde_json::Value> {
        let doc = self
            .fetch_user(identity)
            .await
            .context("retrieving preferences")?;
        let raw = doc.and_then(|d| {
            d.fields
                .get("preferences")
                .and_then(|v| v.string_value.clone())
        });
        match raw {
            Some(json) => Ok(serde_json::from_str(&json).unwrap_or_else(|_| serde_json::json!({}))),
            None => Ok(serde_json::json!({})),
        }
    }

    async fn append_chat_entry(&self, identity: &str, entry: ChatEntry) -> Result<()> {
        let url = format!(
            "{}/chats?documentId={}",
            self.user_url(identity),
            entry.id
        );
        let mut fields = HashMap::new();
        fields.insert(
            "messages".to_string(),
            FirestoreValue::string(serde_json::to_string(&entry.messages)?),
        );
        fields.insert(
            "timestamp".to_string(),
            FirestoreValue::string(entry.timestamp.to_rfc3339()),
        );
        let doc = FirestoreDocument { fields };
        let resp = self.http.post(url).json(&doc).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("firestore error: {}", resp.status()));
        }
        Ok(())
    }

    async fn list_recent_chat_entries(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<ChatEntry>> {
        #[derive(Deserialize)]
        struct ListResponse {
            #[serde(default)]
            documents: Vec<NamedDocument>,
        }
        #[derive(Deserialize)]
        struct NamedDocument {
            name: String,
            #[serde(default)]
            fields: HashMap<String, FirestoreValue>,
        }

        let url = format!("{}/chats?pageSize={}", self.user_url(identity), limit.max(1));
        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(anyhow!("firestore error: {}", resp.status()));
        }
        let body: ListResponse = resp.json().await?;

        let mut entries = Vec::new();
        for doc in body.documents {
            let id = doc
                .name
                .rsplit('/')
                .next()
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_else(Uuid::new_v4);
            let messages = doc
                .fields
                .get("messages")
                .and_then(|v| v.string_value.as_deref())
                .and_then(|json| serde_json::from_str(json).ok())
                .unwrap_or_default();
            let timestamp = doc
                .fields
                .get("timestamp")
                .and_then(|v| v.string_value.as_deref())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            entries.push(ChatEntry {
                id,
                messages,
                timestamp,
            });
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn delete_all(&self, identity: &str) -> Result<()> {
        // Chat subcollection documents go first, then the user record.
        let chats = self.list_recent_chat_entries(identity, 1000).await?;
        for entry in chats {
            let url = format!("{}/chats/{}", self.user_url(identity), entry.id);
            let _ = self.http.delete(url).send().await?;
        }
        let resp = self.http.delete(self.user_url(identity)).send().await?;
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(anyhow!("firestore error: {}", resp.status()));
        }
        Ok(())
    }

    async fn update_last_login(&self, identity: &str) -> Result<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "last_login".to_string(),
            FirestoreValue::string(Utc::now().to_rfc3339()),
        );
        self.patch_user(identity, fields)
            .await
            .context("updating last login")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::chat::Message;

    #[test]
    fn test_hash_identity_is_case_insensitive_and_stable() {
        assert_eq!(hash_identity("Operator"), hash_identity("operator"));
        // SHA-256 hex is 64 chars and never the input itself.
        let h = hash_identity("operator");
        assert_eq!(h.len(), 64);
        assert_ne!(h, "operator");
    }

    #[tokio::test]
    async fn test_credential_round_trip() {
        let store = InMemoryStore::new();
        store.store_key("operator", "AIza-secret").await.unwrap();

        let loaded = store.get_key("operator").await.unwrap();
        assert_eq!(loaded.as_deref(), Some("AIza-secret"));
    }

    #[tokio::test]
    async fn test_get_key_for_unknown_identity_is_none_not_error() {
        let store = InMemoryStore::new();
        assert_eq!(store.get_key("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_store_returns_errors() {
        let store = InMemoryStore::new();
        store.set_offline(true);
        assert!(store.get_key("operator").await.is_err());
        assert!(store.store_key("operator", "k").await.is_err());
    }

    #[tokio::test]
    async fn test_recent_chats_are_newest_first_and_limited() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            let mut entry = ChatEntry::new(vec![Message::user(format!("msg {i}"))]);
            entry.timestamp = Utc::now() + chrono::Duration::seconds(i);
            store.append_chat_entry("operator", entry).await.unwrap();
        }

        let recent = store.list_recent_chat_entries("operator", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].messages[0].text, "msg 4");
        assert_eq!(recent[2].messages[0].text, "msg 2");
    }

    #[tokio::test]
    async fn test_delete_all_removes_everything() {
        let store = InMemoryStore::new();
        store.store_key("operator", "k").await.unwrap();
        store
            .append_chat_entry("operator", ChatEntry::new(vec![Message::user("hi")]))
            .await
            .unwrap();

        store.delete_all("operator").await.unwrap();

        assert_eq!(store.get_key("operator").await.unwrap(), None);
        assert!(store
            .list_recent_chat_entries("operator", 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_firestore_get_key_reads_the_string_field() {
        let body = serde_json::json!({
            "fields": {"api_key": {"stringValue": "AIza-remote"}}
        })
        .to_string();
        let base = crate::test_http::serve_once("200 OK", body);
        let store = FirestoreStore::new("proj").unwrap().with_base_url(&base);

        let key = store.get_key("operator").await.unwrap();
        assert_eq!(key.as_deref(), Some("AIza-remote"));
    }

    #[tokio::test]
    async fn test_firestore_missing_user_is_none_not_error() {
        let base = crate::test_http::serve_once("404 Not Found", "{}".to_string());
        let store = FirestoreStore::new("proj").unwrap().with_base_url(&base);

        assert_eq!(store.get_key("operator").await.unwrap(), None);
    }
}
