pub mod api;
pub mod capture;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod settings;
pub mod store;
pub mod sync;
pub mod transport;

use std::sync::Arc;
use capture::CaptureService;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub capture: Arc<CaptureService>,
}
