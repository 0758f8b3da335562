//! Route handlers.

use crate::auth::RemoteUser;
use crate::error::{ApiError, ApiResult};
use crate::resources::{DrawResource, NoteResource};
use crate::{with_connection, AppState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use leornian_core::captcha::CaptchaVerifier;
use leornian_core::model::collection::CollectionFilter;
use leornian_core::model::support::SupportMessageDraft;
use leornian_core::service::collection_service::CollectionService;
use leornian_core::service::drill_service::{DrillService, NoteDraw};
use leornian_core::service::note_service::{preview_html as render_preview, NoteService};
use leornian_core::service::support_service::SupportService;
use leornian_core::{core_version, DrawRequest, DrillStatus, Page};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DrawBody {
    pub promote: Option<String>,
    pub demote: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub subject: String,
    pub message: String,
    pub captcha: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub code: String,
    pub saved: bool,
    pub changed: bool,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": core_version() }))
}

pub async fn get_note(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<Json<NoteResource>> {
    with_connection(&state, move |conn, state| {
        let note = NoteService::new(conn).get_note(&code)?;
        Ok(Json(NoteResource::from_note(&note, &state.settings)))
    })
    .await
}

pub async fn preview_html(Json(request): Json<PreviewRequest>) -> ApiResult<Json<Value>> {
    let html = render_preview(&request.text).map_err(|err| ApiError::BadRequest {
        field: Some(err.field.to_string()),
        message: err.message,
    })?;
    Ok(Json(json!({ "html": html })))
}

pub async fn list_collection(
    State(state): State<Arc<AppState>>,
    remote: RemoteUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<NoteResource>>> {
    with_connection(&state, move |conn, state| {
        let user = remote.require(conn)?;
        let page = CollectionService::new(conn).list(&user, CollectionFilter::All, query.page)?;
        Ok(Json(
            page.map(|note| NoteResource::from_note(&note, &state.settings)),
        ))
    })
    .await
}

pub async fn save_note(
    State(state): State<Arc<AppState>>,
    remote: RemoteUser,
    Path(code): Path<String>,
) -> ApiResult<Json<SaveResponse>> {
    with_connection(&state, move |conn, _| {
        let user = remote.require(conn)?;
        let change = CollectionService::new(conn).save(&user, &code)?;
        Ok(Json(SaveResponse {
            code: change.note.code,
            saved: true,
            changed: change.changed,
        }))
    })
    .await
}

pub async fn unsave_note(
    State(state): State<Arc<AppState>>,
    remote: RemoteUser,
    Path(code): Path<String>,
) -> ApiResult<Json<SaveResponse>> {
    with_connection(&state, move |conn, _| {
        let user = remote.require(conn)?;
        let change = CollectionService::new(conn).unsave(&user, &code)?;
        Ok(Json(SaveResponse {
            code: change.note.code,
            saved: false,
            changed: change.changed,
        }))
    })
    .await
}

pub async fn notes_by_author(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<NoteResource>>> {
    with_connection(&state, move |conn, state| {
        let page = NoteService::new(conn).notes_by_author(&username, query.page)?;
        Ok(Json(
            page.map(|note| NoteResource::from_note(&note, &state.settings)),
        ))
    })
    .await
}

pub async fn drill_peek(
    State(state): State<Arc<AppState>>,
    remote: RemoteUser,
) -> ApiResult<Json<DrillStatus>> {
    with_connection(&state, move |conn, _| {
        let user = remote.require(conn)?;
        Ok(Json(DrillService::new(conn).peek(&user)?))
    })
    .await
}

pub async fn drill_draw(
    State(state): State<Arc<AppState>>,
    remote: RemoteUser,
    body: Option<Json<DrawBody>>,
) -> ApiResult<Json<Value>> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    with_connection(&state, move |conn, state| {
        let user = remote.require(conn)?;
        let request = DrawRequest {
            promote: body.promote,
            demote: body.demote,
        };
        let outcome =
            DrillService::new(conn).draw_note(&user, &request, &mut rand::thread_rng())?;
        match outcome {
            NoteDraw::Drawn { entry, note } => {
                let resource = DrawResource::new(&entry, &note, &state.settings);
                serde_json::to_value(resource)
                    .map(Json)
                    .map_err(|err| ApiError::Internal(err.to_string()))
            }
            NoteDraw::InsufficientCollection => {
                Ok(Json(json!({ "error": "insufficient-collection" })))
            }
        }
    })
    .await
}

pub async fn contact_support(
    State(state): State<Arc<AppState>>,
    remote: RemoteUser,
    Json(request): Json<ContactRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    with_connection(&state, move |conn, state| {
        let sender = remote.resolve(conn)?;
        let draft = SupportMessageDraft::new(request.subject, request.message);
        let verifier = CaptchaVerifier::new(Arc::clone(&state.captcha), state.settings.captcha.clone());
        let message = SupportService::new(conn, state.mailer.as_ref(), &state.settings)
            .contact_support(sender.as_ref(), &draft, &verifier, request.captcha.as_deref())?;
        info!(
            "event=api_contact module=api status=ok message_id={}",
            message.id
        );
        Ok((StatusCode::CREATED, Json(json!({ "id": message.id.to_string() }))))
    })
    .await
}
