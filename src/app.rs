use axum::extract::Extension;
use axum::handler::Handler;
use axum::routing::get;
use axum::Router;
use log::{debug, info, warn};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::auth::TokenManager;
use crate::config::{ConfigProfile, Settings};
use crate::db::Database;
use crate::error::panic_response;
use crate::handlers::{health, not_found};
use crate::routes::{GroupRegistration, RouteGroup};

/// Everything a request handler may need, attached to every request.
#[derive(Clone)]
pub struct AppContext {
    pub profile: Arc<ConfigProfile>,
    pub tokens: TokenManager,
    pub database: Database,
}

#[derive(Debug)]
pub enum BootstrapError {
    /// `build` was called outside a Tokio runtime.
    Runtime(String),
    Database(sqlx::Error),
    Bind(String),
    Serve(String),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::Runtime(msg) => write!(f, "No async runtime: {}", msg),
            BootstrapError::Database(e) => write!(f, "Database error: {}", e),
            BootstrapError::Bind(msg) => write!(f, "Bind failed: {}", msg),
            BootstrapError::Serve(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootstrapError::Database(e) => Some(e),
            _ => None,
        }
    }
}

/// The initializing state: settings applied, route groups being collected.
pub struct AppBuilder {
    settings: Settings,
    groups: Vec<Box<dyn RouteGroup>>,
}

impl AppBuilder {
    pub fn new(settings: Settings) -> AppBuilder {
        AppBuilder {
            settings,
            groups: Vec::new(),
        }
    }

    pub fn route_group(mut self, group: Box<dyn RouteGroup>) -> AppBuilder {
        self.groups.push(group);
        self
    }

    pub fn route_groups<I>(mut self, groups: I) -> AppBuilder
    where
        I: IntoIterator<Item = Box<dyn RouteGroup>>,
    {
        self.groups.extend(groups);
        self
    }

    /// Wire the runtime and mount every group that loads.
    ///
    /// A group that fails to load is recorded in [`Application::registrations`]
    /// and skipped; it never fails the build. It fails only when called outside
    /// a Tokio runtime (the pool's maintenance task needs one) or when the
    /// driver cannot parse the database locator.
    pub fn build(self) -> Result<Application, BootstrapError> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| BootstrapError::Runtime(e.to_string()))?;

        let AppBuilder { settings, groups } = self;
        let profile = Arc::new(settings.profile.clone());

        let cors = CorsLayer::new()
            .allow_origin(AnyOrigin)
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin);

        let tokens = TokenManager::new(&profile);

        let database = Database::connect_lazy(&profile, settings.db_max_connections)
            .map_err(BootstrapError::Database)?;

        let context = AppContext {
            profile,
            tokens,
            database,
        };

        let mut router = Router::new().route("/api/health", get(health::health_check));
        let mut registrations = Vec::with_capacity(groups.len());
        let mut schema = Vec::new();

        for group in &groups {
            let name = group.name().to_string();
            let outcome = match group.routes(&context) {
                Ok(routes) => {
                    router = router.merge(routes);
                    schema.extend(group.schema());
                    debug!("route group '{}' mounted", name);
                    Ok(())
                }
                Err(e) => Err(e),
            };
            registrations.push(GroupRegistration { name, outcome });
        }

        let debug = settings.debug;
        let router = router
            .fallback(not_found::not_found.into_service())
            .layer(CatchPanicLayer::custom(
                move |payload: Box<dyn Any + Send + 'static>| panic_response(payload, debug),
            ))
            .layer(cors)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO)),
            )
            .layer(Extension(context.clone()));

        info!(
            "Application ready: profile={}, {} of {} route groups loaded",
            context.profile.profile,
            registrations.iter().filter(|r| r.is_loaded()).count(),
            registrations.len()
        );

        Ok(Application {
            settings,
            context,
            router,
            registrations,
            schema,
        })
    }
}

/// The ready-to-serve state. Configuration is fixed from here on.
pub struct Application {
    settings: Settings,
    context: AppContext,
    router: Router,
    registrations: Vec<GroupRegistration>,
    schema: Vec<String>,
}

impl Application {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// One entry per route group, in registration order.
    pub fn registrations(&self) -> &[GroupRegistration] {
        &self.registrations
    }

    pub fn failed_groups(&self) -> impl Iterator<Item = &GroupRegistration> {
        self.registrations.iter().filter(|r| !r.is_loaded())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Create the tables declared by the loaded route groups, if missing.
    pub async fn ensure_schema(&self) -> Result<(), BootstrapError> {
        self.context
            .database
            .ensure_schema(&self.schema)
            .await
            .map_err(BootstrapError::Database)
    }

    /// Bind `host:port` and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), BootstrapError>
    where
        F: Future<Output = ()>,
    {
        let addr = bind_address(&self.settings).await?;
        let server = axum::Server::try_bind(&addr)
            .map_err(|e| BootstrapError::Bind(format!("{}: {}", addr, e)))?;

        info!(
            "Server listening on {} (debug={})",
            addr, self.settings.debug
        );
        server
            .serve(self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| BootstrapError::Serve(e.to_string()))
    }
}

async fn bind_address(settings: &Settings) -> Result<SocketAddr, BootstrapError> {
    let mut addrs = tokio::net::lookup_host((settings.host.as_str(), settings.port))
        .await
        .map_err(|e| BootstrapError::Bind(format!("{}: {}", settings.bind_address(), e)))?;
    addrs.next().ok_or_else(|| {
        BootstrapError::Bind(format!("{}: no usable address", settings.bind_address()))
    })
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => { info!("Received Ctrl+C, shutting down"); }
                    _ = sigterm.recv() => { info!("Received SIGTERM, shutting down"); }
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                if ctrl_c.await.is_ok() {
                    info!("Received Ctrl+C, shutting down");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    }
}
