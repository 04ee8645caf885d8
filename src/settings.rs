use crate::store::SettingsStore;

pub const KEY_GITHUB_TOKEN: &str = "wr_github_token";
pub const KEY_GIST_ID: &str = "wr_gist_id";
pub const KEY_GIST_FILENAME: &str = "wr_gist_filename";
pub const KEY_GIST_DESCRIPTION: &str = "wr_gist_description";
pub const KEY_ENABLE_GIST: &str = "wr_enable_gist";
pub const KEY_DEBUG_MODE: &str = "wr_debug_mode";
pub const KEY_GIST_DISCOVER: &str = "wr_gist_discover";

pub const DEFAULT_FILENAME: &str = "weread_login_info.json";
pub const DEFAULT_DESCRIPTION: &str = "WeRead login info";

/// Snapshot of the persisted settings, taken once per capture.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSettings {
    pub token: Option<String>,
    pub gist_id: Option<String>,
    pub filename: String,
    pub description: String,
    pub upload_enabled: bool,
    pub debug: bool,
    /// Scan the account's gists for `filename` before trusting `gist_id`.
    pub discover: bool,
}

impl SyncSettings {
    pub fn load(store: &dyn SettingsStore) -> Self {
        let value = |key: &str| store.get(key).filter(|v| !v.is_empty());
        let flag = |key: &str| value(key).is_some_and(|v| v == "true");

        Self {
            token: value(KEY_GITHUB_TOKEN),
            gist_id: value(KEY_GIST_ID),
            filename: value(KEY_GIST_FILENAME).unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
            description: value(KEY_GIST_DESCRIPTION).unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            upload_enabled: flag(KEY_ENABLE_GIST),
            debug: flag(KEY_DEBUG_MODE),
            discover: flag(KEY_GIST_DISCOVER),
        }
    }
}
