//! Admin API Request Handlers
//!
//! Configuration, file upload and audit endpoints. Service operations live
//! in `admin::service`.

use axum::{
    extract::{Extension, Path, Query, State},
    response::{IntoResponse, Json},
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};

use crate::admin::audit::{AuditEntryBuilder, AuditFilter};
use crate::admin::auth::{require_role, AuthUser};
use crate::admin::error::{AdminError, AdminResult};
use crate::admin::server::AppState;
use crate::admin::types::*;
use crate::store::View;
use crate::validate::ConfigError;

/// Health check endpoint (no auth required)
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `GET config`: every type in one document
pub async fn get_config(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AdminResult<Json<Value>> {
    require_role(&user, Role::Viewer)?;

    let snapshot = state.store.snapshot()?;
    let document = snapshot.document.to_json(state.store.registry(), View::Public);

    log::debug!("User {} read the configuration (version {})", user.name, snapshot.version);
    Ok(Json(with_api_version(document)))
}

/// `GET config/<Type>[/<Key>...]`
pub async fn get_config_path(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(path): Path<String>,
) -> AdminResult<Json<Value>> {
    require_role(&user, Role::Viewer)?;

    let segments = split_path(&path);
    let Some((type_segment, keys)) = segments.split_first() else {
        return Err(ConfigError::HttpNotFound { path: path.clone() }.into());
    };

    let registry = state.store.registry();
    let ty = registry
        .lookup(type_segment)
        .ok_or_else(|| ConfigError::HttpNotFound { path: path.clone() })?;

    let snapshot = state.store.snapshot()?;
    let selected = snapshot.document.select(ty, keys, View::Public)?;
    Ok(Json(with_api_version(selected)))
}

/// `POST config`
pub async fn post_config(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> AdminResult<Json<ApiResponse>> {
    require_role(&user, Role::Operator)?;

    let body = parse_body(&body)?;
    let committed = state.store.post(&body)?;

    let target = targets(&body);
    log::info!(
        "User {} (role: {:?}) posted {} (version {})",
        user.name,
        user.role,
        target,
        committed.snapshot.version
    );

    state.record(
        AuditEntryBuilder::new(&user.name, user.role, AuditAction::ConfigPost, target)
            .version(committed.snapshot.version)
            .details(serde_json::to_value(&committed.outcome.changes)?),
    );

    Ok(Json(ApiResponse::success()))
}

/// `DELETE config/<Type>/<Key>...`
pub async fn delete_config_path(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(path): Path<String>,
) -> AdminResult<Json<ApiResponse>> {
    require_role(&user, Role::Operator)?;

    let segments = split_path(&path);
    let Some((type_segment, keys)) = segments.split_first() else {
        return Err(ConfigError::HttpNotFound { path: path.clone() }.into());
    };

    let committed = state.store.delete(type_segment, keys)?;

    log::info!(
        "User {} (role: {:?}) deleted {} (version {})",
        user.name,
        user.role,
        path,
        committed.snapshot.version
    );

    state.record(
        AuditEntryBuilder::new(&user.name, user.role, AuditAction::ConfigDelete, path.as_str())
            .version(committed.snapshot.version)
            .details(serde_json::to_value(&committed.outcome.changes)?),
    );

    Ok(Json(ApiResponse::completed()))
}

/// `PUT file/<name>`: stage an uploaded file for a certificate object
pub async fn put_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(name): Path<String>,
    body: Bytes,
) -> AdminResult<Json<ApiResponse>> {
    require_role(&user, Role::Operator)?;

    state.store.files().stage(&name, &body)?;
    log::info!("User {} uploaded file {} ({} bytes)", user.name, name, body.len());

    state.record(
        AuditEntryBuilder::new(&user.name, user.role, AuditAction::FileUpload, name.as_str())
            .details(json!({ "Size": body.len() })),
    );

    Ok(Json(ApiResponse::success()))
}

/// `GET audit` (Admin only)
pub async fn get_audit_log(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AuditQuery>,
) -> AdminResult<Json<Value>> {
    require_role(&user, Role::Admin)?;

    let filter = AuditFilter {
        operator: query.operator,
        action: None,
        limit: query.limit,
    };

    let audit = state
        .audit
        .lock()
        .map_err(|_| AdminError::AuditLog("audit log lock poisoned".to_string()))?;
    let entries = audit.query(&filter)?;
    let verified = audit.verify_integrity()?;

    log::debug!("Audit log queried by {}: {} entries returned", user.name, entries.len());

    Ok(Json(json!({
        "Entries": entries,
        "Verified": verified,
    })))
}

/// Parse a request body; an empty body is a null object
pub(crate) fn parse_body(body: &[u8]) -> AdminResult<Value> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ConfigError::NullObject.into());
    }
    serde_json::from_slice(body).map_err(|e| {
        log::debug!("Rejected malformed request body: {}", e);
        AdminError::from(ConfigError::InvalidValue {
            property: "JSON".to_string(),
            value: e.to_string(),
        })
    })
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn with_api_version(document: Value) -> Value {
    match document {
        Value::Object(mut map) => {
            map.insert("Version".to_string(), Value::String(crate::API_VERSION.to_string()));
            Value::Object(map)
        }
        other => other,
    }
}

/// Comma-separated list of the types a POST body addresses
fn targets(body: &Value) -> String {
    match body {
        Value::Object(map) => map
            .keys()
            .filter(|key| key.as_str() != "Version")
            .cloned()
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    }
}
