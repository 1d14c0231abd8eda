//! Service Operation Handlers
//!
//! `service/status`, `service/restart`, `service/import` and
//! `service/export`. These are Admin-only except status, which any
//! authenticated user may read.

use axum::{
    extract::{Extension, OriginalUri, State},
    response::Json,
};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::admin::audit::AuditEntryBuilder;
use crate::admin::auth::{require_role, AuthUser};
use crate::admin::error::AdminResult;
use crate::admin::handlers::parse_body;
use crate::admin::server::AppState;
use crate::admin::types::*;
use crate::service::{transfer, ExportRequest, ImportRequest, RestartMode, RestartRequest};
use crate::store::{ImportOptions, View};
use crate::validate::ConfigError;

/// `GET service/status`
pub async fn get_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AdminResult<Json<Value>> {
    require_role(&user, Role::Viewer)?;

    let status = state.service.status()?;
    Ok(Json(json!({ "Server": status })))
}

/// `POST service/restart`
pub async fn restart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> AdminResult<Json<ApiResponse>> {
    require_role(&user, Role::Admin)?;

    let request = RestartRequest::parse(&parse_body(&body)?)?;
    state.service.restart(request.mode)?;

    log::info!("User {} (role: {:?}) requested restart ({:?})", user.name, user.role, request.mode);

    let action = match request.mode {
        RestartMode::ResetConfig => AuditAction::ConfigReset,
        _ => AuditAction::Restart,
    };
    let mut entry = AuditEntryBuilder::new(&user.name, user.role, action, "Server")
        .details(json!({ "Mode": format!("{:?}", request.mode) }));
    if request.mode == RestartMode::ResetConfig {
        entry = entry.version(state.store.snapshot()?.version);
    }
    state.record(entry);

    Ok(Json(ApiResponse::completed()))
}

/// `POST service/export`: seal the committed configuration into a user file
pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> AdminResult<Json<ApiResponse>> {
    require_role(&user, Role::Admin)?;

    let request = ExportRequest::parse(&parse_body(&body)?)?;
    let snapshot = state.store.snapshot()?;
    let config = snapshot.document.to_json(state.store.registry(), View::Full);

    let envelope = transfer::seal(&request.password, config);
    let content = serde_json::to_vec_pretty(&envelope)?;
    state.store.files().stage(&request.file_name, &content)?;

    log::info!(
        "User {} exported configuration version {} to {}",
        user.name,
        snapshot.version,
        request.file_name
    );

    state.record(
        AuditEntryBuilder::new(&user.name, user.role, AuditAction::ConfigExport, request.file_name.as_str())
            .version(snapshot.version),
    );

    Ok(Json(ApiResponse::completed()))
}

/// `POST service/import`: preview, or apply and enter maintenance mode
pub async fn import(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> AdminResult<Json<ApiResponse>> {
    require_role(&user, Role::Admin)?;

    let request = ImportRequest::parse(&parse_body(&body)?)?;
    let content = state.store.files().read(&request.file_name)?;
    let config = transfer::open(&request.file_name, &content, &request.password)?;

    let imported = state.store.import(
        &config,
        ImportOptions {
            disable_objects: request.disable_objects,
            persist: request.apply_config,
        },
    )?;

    let action = if request.apply_config {
        state.service.enter_maintenance(true)?;
        log::info!(
            "User {} applied import {} as version {:?}",
            user.name,
            request.file_name,
            imported.version
        );
        AuditAction::ConfigImportApply
    } else {
        log::info!("User {} previewed import {}", user.name, request.file_name);
        AuditAction::ConfigImportPreview
    };

    let mut entry = AuditEntryBuilder::new(&user.name, user.role, action, request.file_name.as_str())
        .applied(request.apply_config)
        .details(json!({ "DisableObjects": request.disable_objects }));
    if let Some(version) = imported.version {
        entry = entry.version(version);
    }
    state.record(entry);

    Ok(Json(ApiResponse::completed().with_members(imported.document)))
}

/// Any method or path the API does not serve
pub async fn unsupported(OriginalUri(uri): OriginalUri) -> AdminResult<Json<ApiResponse>> {
    Err(ConfigError::BadRestCall {
        call: uri.path().to_string(),
    }
    .into())
}
