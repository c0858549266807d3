use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::builder::editable::CommitOutcome;
use crate::builder::preview::RenderMode;
use crate::builder::session::{RasterOptions, Session, SharedSession};
use crate::builder::store::Change;
use crate::cv::schema::{Customization, CustomizationPatch, CvDocument};
use crate::errors::AppError;
use crate::export::json::export_json;
use crate::export::text::export_text_pdf;
use crate::export::{CaptureRasterizer, ExportArtifact};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / response bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub locale: Option<String>,
    /// Inline document; takes precedence over the locale dataset.
    pub document: Option<CvDocument>,
    pub customization: Option<Customization>,
}

#[derive(Debug, Deserialize)]
pub struct FieldUpdate {
    pub path: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ListReplace {
    pub path: String,
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListItemUpdate {
    pub path: String,
    pub index: usize,
    pub value: String,
}

/// Without `value` a default record is appended to a list of records.
#[derive(Debug, Deserialize)]
pub struct ListAdd {
    pub path: String,
    pub value: Option<String>,
}

/// Without `index`, `path` names the item itself (`experience[#4]`).
#[derive(Debug, Deserialize)]
pub struct ListRemove {
    pub path: String,
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub ats: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub document: Arc<CvDocument>,
    pub editing: bool,
    pub ats_mode: bool,
    pub customization: Customization,
    pub revision: u64,
    pub preview_mounted: bool,
    /// Scale the browser should capture the preview at for raster export.
    pub raster_scale: f32,
}

impl SessionView {
    fn new(session: &Session, state: &AppState) -> Self {
        let store = session.store();
        Self {
            id: session.id(),
            locale: session.locale().to_string(),
            created_at: session.created_at(),
            document: store.current().clone(),
            editing: store.is_editing(),
            ats_mode: store.ats_mode(),
            customization: store.customization().clone(),
            revision: store.revision(),
            preview_mounted: session.preview().is_mounted(),
            raster_scale: state.config.raster_scale,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EditResponse {
    pub applied: bool,
    /// Stable path of the change, when one was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<String>,
    pub view: SessionView,
}

impl EditResponse {
    fn new(change: Option<Change>, session: &Session, state: &AppState) -> Self {
        Self {
            applied: change.is_some(),
            changed: change.map(|c| c.path.to_string()),
            view: SessionView::new(session, state),
        }
    }
}

async fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, AppError> {
    state.sessions.get(id).await
}

// ────────────────────────────────────────────────────────────────────────────
// Datasets and sessions
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/builder/datasets
pub async fn handle_list_datasets(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "locales": state.datasets.locales(),
        "defaultLocale": state.config.default_locale,
    }))
}

/// POST /api/v1/builder/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let locale = req
        .locale
        .unwrap_or_else(|| state.config.default_locale.clone());
    let document = match req.document {
        Some(document) => document,
        None => state
            .datasets
            .get(&locale)
            .map(|doc| CvDocument::clone(doc))
            .ok_or_else(|| AppError::NotFound(format!("No CV dataset for locale '{locale}'")))?,
    };

    let customization = req.customization.unwrap_or_default();
    customization.validate()?;

    let session = Session::new(locale, document, customization);
    let shared = state.sessions.create(session).await?;
    let session = shared.lock().await;
    Ok((StatusCode::CREATED, Json(SessionView::new(&session, &state))))
}

/// GET /api/v1/builder/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let shared = find_session(&state, id).await?;
    let session = shared.lock().await;
    Ok(Json(SessionView::new(&session, &state)))
}

/// DELETE /api/v1/builder/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Document edits
// ────────────────────────────────────────────────────────────────────────────

/// PATCH /api/v1/builder/sessions/:id/fields
pub async fn handle_update_field(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FieldUpdate>,
) -> Result<Json<EditResponse>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    let change = match session.commit_field(&req.path, &req.value)? {
        CommitOutcome::Applied(change) => Some(change),
        CommitOutcome::Unchanged => {
            debug!("Session {id}: {} unchanged", req.path);
            None
        }
    };
    Ok(Json(EditResponse::new(change, &session, &state)))
}

/// PUT /api/v1/builder/sessions/:id/lists
pub async fn handle_replace_list(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ListReplace>,
) -> Result<Json<EditResponse>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    let change = session.update_list(&req.path, req.items)?;
    Ok(Json(EditResponse::new(Some(change), &session, &state)))
}

/// PATCH /api/v1/builder/sessions/:id/lists/item
pub async fn handle_update_list_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ListItemUpdate>,
) -> Result<Json<EditResponse>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    let change = session.update_list_item(&req.path, req.index, req.value)?;
    Ok(Json(EditResponse::new(Some(change), &session, &state)))
}

/// POST /api/v1/builder/sessions/:id/lists/items
pub async fn handle_add_list_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ListAdd>,
) -> Result<Json<EditResponse>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    let change = match req.value {
        Some(value) => session.add_list_item(&req.path, value)?,
        None => session.add_entry(&req.path)?,
    };
    Ok(Json(EditResponse::new(Some(change), &session, &state)))
}

/// POST /api/v1/builder/sessions/:id/lists/remove
pub async fn handle_remove_list_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ListRemove>,
) -> Result<Json<EditResponse>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    let change = match req.index {
        Some(index) => session.remove_list_item(&req.path, index)?,
        None => session.remove_item(&req.path)?,
    };
    Ok(Json(EditResponse::new(Some(change), &session, &state)))
}

/// POST /api/v1/builder/sessions/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    session.reset()?;
    info!("Session {id}: reset to original");
    Ok(Json(SessionView::new(&session, &state)))
}

// ────────────────────────────────────────────────────────────────────────────
// Presentation
// ────────────────────────────────────────────────────────────────────────────

/// PUT /api/v1/builder/sessions/:id/editing
pub async fn handle_set_editing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<Toggle>,
) -> Result<Json<SessionView>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    session.set_editing(req.enabled)?;
    Ok(Json(SessionView::new(&session, &state)))
}

/// PUT /api/v1/builder/sessions/:id/ats-mode
pub async fn handle_set_ats_mode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<Toggle>,
) -> Result<Json<SessionView>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    session.set_ats_mode(req.enabled)?;
    Ok(Json(SessionView::new(&session, &state)))
}

/// PATCH /api/v1/builder/sessions/:id/customization
pub async fn handle_update_customization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<CustomizationPatch>,
) -> Result<Json<SessionView>, AppError> {
    patch.validate()?;
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    session.update_customization(patch)?;
    Ok(Json(SessionView::new(&session, &state)))
}

/// GET /api/v1/builder/sessions/:id/preview
/// Mounts the preview on first request and returns the latest frame as HTML.
pub async fn handle_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    let frame = session.mount_preview()?;
    Ok(Html(frame.root.to_html()))
}

// ────────────────────────────────────────────────────────────────────────────
// Exports
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/builder/sessions/:id/export/json
pub async fn handle_export_json(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ExportArtifact, AppError> {
    let shared = find_session(&state, id).await?;
    let document = shared.lock().await.store().export_data();
    Ok(export_json(&document)?)
}

/// GET /api/v1/builder/sessions/:id/export/pdf?ats=
pub async fn handle_export_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<ExportArtifact, AppError> {
    let shared = find_session(&state, id).await?;
    let (document, customization, labels, ats) = {
        let session = shared.lock().await;
        let store = session.store();
        (
            store.current().clone(),
            store.customization().clone(),
            session.labels(),
            query.ats.unwrap_or(store.ats_mode()),
        )
    };
    let artifact = export_text_pdf(document, customization, labels, ats).await?;
    info!("Session {id}: exported {}", artifact.file_name);
    Ok(artifact)
}

/// POST /api/v1/builder/sessions/:id/export/pdf/raster?ats=
/// Multipart body with `standard` and/or `ats` captures of the preview.
pub async fn handle_export_raster_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut rasterizer = CaptureRasterizer::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let mode = match field.name() {
            Some("standard") => RenderMode::Standard,
            Some("ats") => RenderMode::Ats,
            other => {
                return Err(AppError::Validation(format!(
                    "unexpected multipart field {other:?}; expected 'standard' or 'ats'"
                )))
            }
        };
        let capture = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?;
        rasterizer.insert(mode, capture);
    }

    let options = RasterOptions {
        force_ats: query.ats.unwrap_or(false),
        scale: state.config.raster_scale,
        settle_timeout: state.config.render_settle_timeout,
    };
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;
    match session.export_raster_pdf(&rasterizer, options).await? {
        Some(artifact) => Ok(artifact.into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
