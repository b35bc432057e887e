//! ==============================================================================
//! main.rs - farm monitor dashboard entry point
//! ==============================================================================
//!
//! purpose:
//!     serves a map of the farm's sensors. clicking a pin opens the sensor's
//!     detail surface (camera / soil / temperature) backed by readings
//!     fetched from the farm backend.
//!
//! responsibilities:
//!     - load configuration (config/monitor.toml + env overrides)
//!     - initialize logging
//!     - mount the map view (loads the sensor catalog)
//!     - serve the dashboard until ctrl-c, then tear the view down
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                 dashboard (this binary)                  │
//!     │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐   │
//!     │  │ web server  │──▶│  dashboard  │──▶│  fetch tasks  │   │
//!     │  │ (axum)      │   │  (driver)   │   │  (tokio)      │   │
//!     │  └──────┬──────┘   └──────┬──────┘   └───────┬───────┘   │
//!     │         │ render          │ transitions      │ results   │
//!     │         │           ┌─────┴─────┐            │ + ticket  │
//!     │         └──────────▶│  MapView  │◀───────────┘           │
//!     │                     └───────────┘                        │
//!     └──────────────────────────────────┬───────────────────────┘
//!                                        │ http (GET only)
//!                                 ┌──────┴──────┐
//!                                 │farm backend │
//!                                 └─────────────┘
//!
//! ==============================================================================

use farm_monitor::api::HttpSensorApi;
use farm_monitor::config::MonitorConfig;
use farm_monitor::dashboard::Dashboard;
use farm_monitor::map_view::MapView;
use farm_monitor::server;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // step 1: load configuration
    let (config, source) = MonitorConfig::load_or_default();

    // step 2: logging (RUST_LOG wins over the config file)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    source.log();
    config.log_summary();

    // step 3: backend client and view state
    let api = HttpSensorApi::new(&config.api_base(), config.request_timeout())
        .context("failed to build http client")?;
    let dashboard = Dashboard::new(api, MapView::from_config(&config.map), config.fetch_window())
        .with_sensor_data_logging(config.logging.show_sensor_data);

    // step 4: mount the map view; the catalog loads in the background
    let _ = dashboard.mount().await;

    // step 5: serve
    if !config.map.icons_dir.is_dir() {
        tracing::warn!(dir = %config.map.icons_dir.display(), "icons directory missing - markers will have no images");
    }
    let app = server::router(dashboard.clone(), &config.map.icon_base, &config.map.icons_dir);
    let listener = tokio::net::TcpListener::bind(config.server.bind.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!("dashboard live at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    dashboard.teardown().await;
    tracing::info!("dashboard stopped");
    Ok(())
}
