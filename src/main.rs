use std::sync::Arc;
use tokio::net::TcpListener;
use weread_login_sync::{
    api::routes::create_router,
    capture::CaptureService,
    config::Config,
    logging::init_logging,
    store::JsonFileStore,
    transport::ReqwestTransport,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;
    init_logging();

    let store = JsonFileStore::new(&config.settings_path);
    tracing::info!("Using settings file {}", store.path().display());

    let capture = CaptureService::new(
        Arc::new(store),
        Arc::new(ReqwestTransport::new(config.http_timeout)),
        config.gist_api_base.clone(),
    );

    let server_addr = config.server_addr;
    let app_state = AppState {
        capture: Arc::new(capture),
    };

    // Build the router with routes
    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;

    tracing::info!("Listening on {}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
