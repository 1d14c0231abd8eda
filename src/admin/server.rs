//! Admin HTTP Server Module
//!
//! This module sets up the HTTP server for the configuration API using axum.
//! Everything except `/health` lives below `/<prefix>` and requires Basic
//! authentication.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::admin::audit::{AuditEntryBuilder, AuditLog};
use crate::admin::auth::{AuthState, auth_middleware};
use crate::admin::error::{AdminError, AdminResult, ResponseCode};
use crate::admin::types::UserAccount;
use crate::admin::{handlers, service};
use crate::schema::SchemaRegistry;
use crate::service::ServiceController;
use crate::settings::Settings;
use crate::store::{ConfigStore, FileStage, JsonFilePersistence};

/// Admin server configuration
#[derive(Debug, Clone)]
pub struct AdminServerConfig {
    /// Listen address for the API
    pub listen_addr: SocketAddr,

    /// REST prefix without surrounding slashes
    pub prefix: String,

    /// Accounts for Basic authentication
    pub users: Vec<UserAccount>,
}

impl AdminServerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            listen_addr: settings.listen,
            prefix: settings.prefix().to_string(),
            users: settings.users.clone(),
        }
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub service: Arc<ServiceController>,
    pub audit: Arc<Mutex<AuditLog>>,
}

impl AppState {
    pub fn new(service: Arc<ServiceController>, audit: AuditLog) -> Self {
        Self {
            store: Arc::clone(service.store()),
            service,
            audit: Arc::new(Mutex::new(audit)),
        }
    }

    /// Open the store, controller and audit log under the settings' data directory
    pub fn open(settings: &Settings) -> AdminResult<Self> {
        let registry = Arc::new(SchemaRegistry::standard());
        let persistence = JsonFilePersistence::new(settings.config_path());
        let files = FileStage::new(&settings.data_dir);
        let store = ConfigStore::open(registry, Box::new(persistence), files)
            .map_err(|e| AdminError::Internal(e.to_string()))?;

        let service = ServiceController::new(
            Arc::new(store),
            settings.server_name.as_str(),
            Duration::from_millis(settings.restart_delay_ms),
        );
        let audit = AuditLog::new(settings.audit_log_path())?;
        Ok(Self::new(Arc::new(service), audit))
    }

    /// Append to the audit trail
    ///
    /// The action has already taken effect, so a failed append is logged
    /// rather than reported to the client.
    pub fn record(&self, entry: AuditEntryBuilder) {
        let result = match self.audit.lock() {
            Ok(mut audit) => audit.append(entry).map(|_| ()),
            Err(_) => Err(AdminError::AuditLog("audit log lock poisoned".to_string())),
        };
        if let Err(e) = result {
            log::error!("Failed to write audit entry: {}", e);
        }
    }
}

/// Start the admin HTTP server
pub async fn start_admin_server(config: AdminServerConfig, state: AppState) -> AdminResult<()> {
    let app = build_router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    log::info!("Configuration API listening on http://{}/{}", config.listen_addr, config.prefix);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AdminError::Internal(e.to_string()))?;

    log::info!("Configuration API stopped");
    Ok(())
}

/// Build the application router with all routes
pub fn build_router(config: &AdminServerConfig, state: AppState) -> Router {
    let auth_state = AuthState::new(config.users.clone());

    // Refused with 503 while the server restarts
    let guarded = Router::new()
        .route(
            "/config",
            get(handlers::get_config)
                .post(handlers::post_config)
                .fallback(service::unsupported),
        )
        .route(
            "/config/*path",
            get(handlers::get_config_path)
                .delete(handlers::delete_config_path)
                .fallback(service::unsupported),
        )
        .route("/file/:name", put(handlers::put_file).fallback(service::unsupported))
        .route("/service/restart", post(service::restart).fallback(service::unsupported))
        .route("/service/import", post(service::import).fallback(service::unsupported))
        .route("/service/export", post(service::export).fallback(service::unsupported))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_available));

    let api_router = Router::new()
        .route("/service/status", get(service::get_status).fallback(service::unsupported))
        .route("/audit", get(handlers::get_audit_log))
        .merge(guarded)
        .fallback(service::unsupported)
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(state);

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health_check))
        .nest(&format!("/{}", config.prefix), api_router)
        .fallback(service::unsupported)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(track_requests)),
        )
}

async fn require_available(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AdminError> {
    state.service.ensure_available()?;
    Ok(next.run(req).await)
}

/// Count requests by verb and result code
async fn track_requests(req: Request, next: Next) -> Response {
    let verb = req.method().to_string();
    let response = next.run(req).await;

    let code = match response.extensions().get::<ResponseCode>() {
        Some(ResponseCode(code)) => code.to_string(),
        None => response.status().as_u16().to_string(),
    };
    metrics::counter!("config_requests_total", "verb" => verb, "code" => code).increment(1);
    response
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutdown signal received"),
        Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
    }
}
