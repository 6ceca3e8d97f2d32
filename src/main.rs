use log::{debug, error, info, warn};
use std::process;

use library_backend::app::{shutdown_signal, AppBuilder};
use library_backend::config::{load_config, Profile};
use library_backend::constants::SERVICE_NAME;
use library_backend::{logging, routes};

#[tokio::main]
async fn main() {
    let settings = load_config();
    let sink = logging::init(settings.debug);

    info!(
        "{} {} starting up (built {}, {})",
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATE"),
        env!("RUSTC_VERSION")
    );
    debug!("Logging to {:?}", sink);
    debug!("Settings: {:?}", settings);

    if settings.profile.profile == Profile::Production {
        for var in settings.profile.defaulted_secrets() {
            warn!("{} is not set; production is running on the development default", var);
        }
    }

    let app = match AppBuilder::new(settings)
        .route_groups(routes::collaborators())
        .build()
    {
        Ok(app) => app,
        Err(e) => {
            error!("Bootstrap failed: {}", e);
            process::exit(1);
        }
    };

    for registration in app.failed_groups() {
        if let Err(e) = &registration.outcome {
            warn!("Could not load route group '{}': {}", registration.name, e);
        }
    }

    if let Err(e) = app.ensure_schema().await {
        error!("Failed to create database tables: {}", e);
        process::exit(1);
    }
    info!("Database tables created successfully");

    if let Err(e) = app.serve(shutdown_signal()).await {
        error!("{}", e);
        process::exit(1);
    }
}
