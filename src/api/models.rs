use serde::Serialize;
use chrono::{DateTime, Utc};

use crate::capture::CaptureOutcome;

/// Body of the completion signal returned to the host.
#[derive(Serialize)]
pub struct CaptureResponse {
    #[serde(flatten)]
    pub outcome: CaptureOutcome,
    pub processed_at: DateTime<Utc>,
}
