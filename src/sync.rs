//! Find-or-create mirroring of the captured payload into a single GitHub gist.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::settings::{KEY_GIST_ID, SyncSettings};
use crate::store::SettingsStore;
use crate::transport::HttpTransport;

const USER_AGENT: &str = "WeReadLoginMonitor";

#[derive(Serialize)]
struct GistFile<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct UpdateGistRequest<'a> {
    description: &'a str,
    files: BTreeMap<&'a str, GistFile<'a>>,
}

#[derive(Serialize)]
struct CreateGistRequest<'a> {
    description: &'a str,
    public: bool,
    files: BTreeMap<&'a str, GistFile<'a>>,
}

#[derive(Deserialize)]
struct GistSummary {
    id: String,
    #[serde(default)]
    files: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
}

impl SyncOutcome {
    fn success(message: String) -> Self {
        Self { success: true, message }
    }

    fn failure(message: String) -> Self {
        Self { success: false, message }
    }
}

pub struct NoteSynchronizer {
    settings: SyncSettings,
    api_base: String,
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn SettingsStore>,
}

impl NoteSynchronizer {
    pub fn new(
        settings: SyncSettings,
        api_base: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            settings,
            api_base: api_base.into(),
            transport,
            store,
        }
    }

    /// Makes the configured file in the target gist hold `content`.
    ///
    /// Update failures never surface: they fall back to creating a fresh gist,
    /// so a stale or revoked id heals itself. The sync fails when the create step
    /// fails or when the id of the written gist cannot be saved.
    pub async fn sync(&self, content: &str) -> SyncOutcome {
        let Some(token) = self.settings.token.as_deref() else {
            tracing::warn!("GitHub token is not configured, skipping gist upload");
            return SyncOutcome::failure("GitHub token is not configured".to_string());
        };
        let headers = auth_headers(token);
        let persisted = self.settings.gist_id.clone();

        let target = if self.settings.discover {
            match self.discover(&headers).await {
                Ok(Some(id)) => Some(id),
                Ok(None) => persisted.clone(),
                Err(e) => {
                    tracing::warn!("Gist discovery failed: {}", e);
                    persisted.clone()
                }
            }
        } else {
            persisted.clone()
        };

        if let Some(id) = target {
            match self.update(&id, content, &headers).await {
                Ok(()) => {
                    tracing::info!("Gist updated: {}, file: {}", id, self.settings.filename);
                    if persisted.as_deref() != Some(id.as_str()) {
                        if let Err(outcome) = self.persist(&id) {
                            return outcome;
                        }
                    }
                    return SyncOutcome::success(format!("Gist updated: {}", id));
                }
                Err(e) => {
                    tracing::warn!("Updating gist {} failed, creating a new one: {}", id, e);
                }
            }
        }

        match self.create(content, &headers).await {
            Ok(id) => match self.persist(&id) {
                Ok(()) => {
                    tracing::info!("New gist created: {}, file: {}", id, self.settings.filename);
                    SyncOutcome::success(format!("New gist created: {}", id))
                }
                Err(outcome) => outcome,
            },
            Err(e) => {
                tracing::error!("Gist creation failed: {}", e);
                SyncOutcome::failure(format!("Gist creation failed: {}", e))
            }
        }
    }

    /// The stored id must name the gist that holds the file, so a failed save fails the sync.
    fn persist(&self, id: &str) -> std::result::Result<(), SyncOutcome> {
        self.store.set(KEY_GIST_ID, id).map_err(|e| {
            tracing::error!("Gist {} was written but its id could not be saved: {}", id, e);
            SyncOutcome::failure(format!("Gist {} was written but its id could not be saved: {}", id, e))
        })
    }

    async fn discover(&self, headers: &[(String, String)]) -> Result<Option<String>> {
        let url = format!("{}/gists?per_page=100", self.api_base);
        let response = self.transport.get(&url, headers).await?;
        if response.status != 200 {
            return Err(AppError::StatusError(response.status));
        }

        let gists: Vec<GistSummary> = serde_json::from_str(&response.body)?;
        let found = gists
            .into_iter()
            .find(|gist| gist.files.contains_key(&self.settings.filename))
            .map(|gist| gist.id);

        match &found {
            Some(id) => tracing::debug!("Found gist {} holding {}", id, self.settings.filename),
            None => tracing::debug!("No gist holds {}", self.settings.filename),
        }
        Ok(found)
    }

    async fn update(&self, id: &str, content: &str, headers: &[(String, String)]) -> Result<()> {
        let body = UpdateGistRequest {
            description: &self.settings.description,
            files: self.files(content),
        };
        let url = format!("{}/gists/{}", self.api_base, id);
        let response = self
            .transport
            .patch(&url, headers, serde_json::to_string(&body)?)
            .await?;

        if response.status != 200 {
            return Err(AppError::StatusError(response.status));
        }
        Ok(())
    }

    async fn create(&self, content: &str, headers: &[(String, String)]) -> Result<String> {
        let body = CreateGistRequest {
            description: &self.settings.description,
            public: false,
            files: self.files(content),
        };
        let url = format!("{}/gists", self.api_base);
        let response = self
            .transport
            .post(&url, headers, serde_json::to_string(&body)?)
            .await?;

        if response.status != 201 {
            return Err(AppError::StatusError(response.status));
        }

        let json: Value = serde_json::from_str(&response.body)?;
        json["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::ParseError("Create response has no gist id".to_string()))
    }

    fn files<'a>(&'a self, content: &'a str) -> BTreeMap<&'a str, GistFile<'a>> {
        BTreeMap::from([(self.settings.filename.as_str(), GistFile { content })])
    }
}

fn auth_headers(token: &str) -> Vec<(String, String)> {
    vec![
        ("Authorization".to_string(), format!("token {}", token)),
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/vnd.github+json".to_string()),
        ("User-Agent".to_string(), USER_AGENT.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::transport::testing::FakeTransport;
    use serde_json::json;

    const BASE: &str = "https://api.example.test";

    fn settings(token: Option<&str>, gist_id: Option<&str>) -> SyncSettings {
        SyncSettings {
            token: token.map(str::to_string),
            gist_id: gist_id.map(str::to_string),
            filename: "weread_login_info.json".to_string(),
            description: "WeRead login info".to_string(),
            upload_enabled: true,
            debug: false,
            discover: false,
        }
    }

    fn synchronizer(
        settings: SyncSettings,
        transport: FakeTransport,
    ) -> (NoteSynchronizer, Arc<FakeTransport>, Arc<MemoryStore>) {
        let transport = Arc::new(transport);
        let store = Arc::new(match &settings.gist_id {
            Some(id) => MemoryStore::with_values([(KEY_GIST_ID, id.as_str())]),
            None => MemoryStore::new(),
        });
        let sync = NoteSynchronizer::new(settings, BASE, transport.clone(), store.clone());
        (sync, transport, store)
    }

    fn body_of(call: &crate::transport::testing::RecordedCall) -> Value {
        serde_json::from_str(call.body.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn missing_token_fails_without_network() {
        let (sync, transport, store) = synchronizer(settings(None, Some("g1")), FakeTransport::new());

        let outcome = sync.sync("payload").await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("token"));
        assert!(transport.calls().is_empty());
        assert_eq!(store.get(KEY_GIST_ID).as_deref(), Some("g1"));
    }

    #[tokio::test]
    async fn accepted_update_makes_exactly_one_call() {
        let (sync, transport, store) = synchronizer(
            settings(Some("ghp_t"), Some("g1")),
            FakeTransport::new().respond(200, r#"{"id":"g1"}"#),
        );

        let outcome = sync.sync("payload").await;

        assert!(outcome.success);
        assert!(outcome.message.contains("g1"));
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "PATCH");
        assert_eq!(calls[0].url, format!("{}/gists/g1", BASE));
        assert_eq!(
            body_of(&calls[0]),
            json!({
                "description": "WeRead login info",
                "files": { "weread_login_info.json": { "content": "payload" } }
            })
        );
        assert!(calls[0]
            .headers
            .contains(&("Authorization".to_string(), "token ghp_t".to_string())));
        assert_eq!(store.get(KEY_GIST_ID).as_deref(), Some("g1"));
    }

    #[tokio::test]
    async fn rejected_update_falls_back_to_create() {
        let (sync, transport, store) = synchronizer(
            settings(Some("ghp_t"), Some("stale")),
            FakeTransport::new()
                .respond(404, r#"{"message":"Not Found"}"#)
                .respond(201, r#"{"id":"fresh"}"#),
        );

        let outcome = sync.sync("payload").await;

        assert_eq!(
            outcome,
            SyncOutcome {
                success: true,
                message: "New gist created: fresh".to_string()
            }
        );
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "PATCH");
        assert_eq!(calls[1].method, "POST");
        assert_eq!(store.get(KEY_GIST_ID).as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn transport_error_on_update_also_falls_back() {
        let (sync, transport, _store) = synchronizer(
            settings(Some("ghp_t"), Some("g1")),
            FakeTransport::new()
                .fail(AppError::Timeout(10))
                .respond(500, "boom"),
        );

        let outcome = sync.sync("payload").await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("500"));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn without_persisted_id_create_is_the_only_call() {
        let (sync, transport, store) = synchronizer(
            settings(Some("ghp_t"), None),
            FakeTransport::new().respond(201, r#"{"id":"new1","public":false}"#),
        );

        let outcome = sync.sync("payload").await;

        assert!(outcome.success);
        assert!(outcome.message.contains("new1"));
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].url, format!("{}/gists", BASE));
        assert_eq!(
            body_of(&calls[0]),
            json!({
                "description": "WeRead login info",
                "public": false,
                "files": { "weread_login_info.json": { "content": "payload" } }
            })
        );
        assert_eq!(store.get(KEY_GIST_ID).as_deref(), Some("new1"));
    }

    #[tokio::test]
    async fn failed_create_persists_nothing() {
        let (sync, _transport, store) = synchronizer(
            settings(Some("ghp_t"), None),
            FakeTransport::new().respond(422, r#"{"message":"Validation Failed"}"#),
        );

        let outcome = sync.sync("payload").await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("422"));
        assert_eq!(store.get(KEY_GIST_ID), None);
    }

    #[tokio::test]
    async fn create_without_id_is_a_failure() {
        let (sync, _transport, store) = synchronizer(
            settings(Some("ghp_t"), None),
            FakeTransport::new().respond(201, r#"{"url":"https://example.test"}"#),
        );

        let outcome = sync.sync("payload").await;

        assert!(!outcome.success);
        assert_eq!(store.get(KEY_GIST_ID), None);
    }

    struct ReadOnlyStore;

    impl SettingsStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(AppError::StorageError("read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn unsaved_id_after_create_fails_the_sync() {
        let transport = Arc::new(FakeTransport::new().respond(201, r#"{"id":"new1"}"#));
        let sync = NoteSynchronizer::new(settings(Some("ghp_t"), None), BASE, transport, Arc::new(ReadOnlyStore));

        let outcome = sync.sync("payload").await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("new1"));
        assert!(outcome.message.contains("read-only"));
    }

    #[tokio::test]
    async fn unsaved_id_after_discovered_update_fails_the_sync() {
        let mut s = settings(Some("ghp_t"), Some("old"));
        s.discover = true;
        let listing = json!([{ "id": "found", "files": { "weread_login_info.json": {} } }]);
        let transport = Arc::new(
            FakeTransport::new()
                .respond(200, &listing.to_string())
                .respond(200, "{}"),
        );
        let sync = NoteSynchronizer::new(s, BASE, transport.clone(), Arc::new(ReadOnlyStore));

        let outcome = sync.sync("payload").await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("found"));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn update_of_the_stored_id_writes_nothing_back() {
        let transport = Arc::new(FakeTransport::new().respond(200, "{}"));
        let sync = NoteSynchronizer::new(settings(Some("ghp_t"), Some("g1")), BASE, transport, Arc::new(ReadOnlyStore));

        let outcome = sync.sync("payload").await;

        assert_eq!(outcome.message, "Gist updated: g1");
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn discovery_prefers_the_gist_holding_the_file() {
        let mut s = settings(Some("ghp_t"), Some("old"));
        s.discover = true;
        let listing = json!([
            { "id": "other", "files": { "notes.md": {} } },
            { "id": "found", "files": { "weread_login_info.json": {} } }
        ]);
        let (sync, transport, store) = synchronizer(
            s,
            FakeTransport::new()
                .respond(200, &listing.to_string())
                .respond(200, "{}"),
        );

        let outcome = sync.sync("payload").await;

        assert_eq!(outcome.message, "Gist updated: found");
        let calls = transport.calls();
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[1].url, format!("{}/gists/found", BASE));
        assert_eq!(store.get(KEY_GIST_ID).as_deref(), Some("found"));
    }

    #[tokio::test]
    async fn failed_discovery_uses_the_persisted_id() {
        let mut s = settings(Some("ghp_t"), Some("g1"));
        s.discover = true;
        let (sync, transport, _store) = synchronizer(
            s,
            FakeTransport::new()
                .respond(401, r#"{"message":"Bad credentials"}"#)
                .respond(200, "{}"),
        );

        let outcome = sync.sync("payload").await;

        assert_eq!(outcome.message, "Gist updated: g1");
        assert_eq!(transport.calls()[1].url, format!("{}/gists/g1", BASE));
    }

    #[tokio::test]
    async fn discovery_with_no_match_and_no_id_creates() {
        let mut s = settings(Some("ghp_t"), None);
        s.discover = true;
        let (sync, transport, _store) = synchronizer(
            s,
            FakeTransport::new()
                .respond(200, "[]")
                .respond(201, r#"{"id":"n"}"#),
        );

        let outcome = sync.sync("payload").await;

        assert!(outcome.success);
        let methods: Vec<_> = transport.calls().iter().map(|c| c.method).collect();
        assert_eq!(methods, vec!["GET", "POST"]);
    }
}
