use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::extract::{CapturedRequest, extract};
use crate::settings::SyncSettings;
use crate::store::SettingsStore;
use crate::sync::{NoteSynchronizer, SyncOutcome};
use crate::transport::HttpTransport;

pub const NOTIFY_TITLE: &str = "WeRead login info";
pub const NOTIFY_EXTRACT_SUCCESS: &str = "Login info extracted";
pub const NOTIFY_EXTRACT_ERROR: &str = "Login info extraction failed";
pub const NOTIFY_GIST_SUCCESS: &str = "Uploaded to gist";
pub const NOTIFY_GIST_ERROR: &str = "Gist upload failed";

/// A user-facing message for the host to display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub subtitle: String,
    pub body: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CaptureOutcome {
    pub extracted: bool,
    pub vid: Option<String>,
    pub sync: Option<SyncOutcome>,
    pub notifications: Vec<Notification>,
}

impl CaptureOutcome {
    /// Outcome for a payload the host sent in a shape that cannot be read.
    pub fn rejected(reason: impl Into<String>) -> Self {
        let mut outcome = Self::default();
        outcome.notify(NOTIFY_EXTRACT_ERROR, reason);
        outcome
    }

    fn notify(&mut self, subtitle: &str, body: impl Into<String>) {
        let body = body.into();
        tracing::info!("[{}] {}: {}", NOTIFY_TITLE, subtitle, body);
        self.notifications.push(Notification {
            title: NOTIFY_TITLE.to_string(),
            subtitle: subtitle.to_string(),
            body,
        });
    }
}

/// Runs one captured login request through extraction and gist upload.
pub struct CaptureService {
    store: Arc<dyn SettingsStore>,
    transport: Arc<dyn HttpTransport>,
    api_base: String,
}

impl CaptureService {
    pub fn new(store: Arc<dyn SettingsStore>, transport: Arc<dyn HttpTransport>, api_base: impl Into<String>) -> Self {
        Self {
            store,
            transport,
            api_base: api_base.into(),
        }
    }

    /// Never fails: every problem ends up as a notification on the outcome.
    pub async fn process(&self, request: &CapturedRequest) -> CaptureOutcome {
        tracing::info!("Processing captured login request");
        let mut outcome = CaptureOutcome::default();

        if let Err(e) = self.run(request, &mut outcome).await {
            tracing::error!("Error while processing request: {}", e);
            outcome.notify(NOTIFY_EXTRACT_ERROR, e.to_string());
        }

        outcome
    }

    async fn run(&self, request: &CapturedRequest, outcome: &mut CaptureOutcome) -> Result<()> {
        let settings = SyncSettings::load(self.store.as_ref());

        let envelope = extract(request);
        let payload = envelope.to_payload()?;
        outcome.extracted = true;
        outcome.vid = Some(envelope.vid.clone());
        outcome.notify(NOTIFY_EXTRACT_SUCCESS, format!("VID: {}", envelope.vid));

        if settings.debug {
            tracing::debug!("Login info:\n{}", payload);
        }

        if !settings.upload_enabled {
            tracing::debug!("Gist upload disabled");
            return Ok(());
        }

        let synchronizer = NoteSynchronizer::new(
            settings,
            self.api_base.clone(),
            self.transport.clone(),
            self.store.clone(),
        );
        let result = synchronizer.sync(&payload).await;
        if result.success {
            outcome.notify(NOTIFY_GIST_SUCCESS, result.message.clone());
        } else {
            outcome.notify(NOTIFY_GIST_ERROR, result.message.clone());
        }
        outcome.sync = Some(result);

        Ok(())
    }
}
