use crate::api::error::AppError;
use crate::api::handlers::current_user;
use crate::entities::{access_log_entries, links, viewer_sessions};
use crate::models::ExpiryMode;
use crate::services::link_service::CreateLinkParams;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLinkRequest {
    pub document_id: String,
    pub expiry_mode: String,
    pub countdown_seconds: Option<i64>,
    pub fixed_deadline: Option<DateTime<Utc>>,
    pub custom_expired_redirect: Option<String>,
    pub custom_expired_message: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LinkResponse {
    pub id: String,
    pub document_id: String,
    pub token: String,
    pub expiry_mode: String,
    pub countdown_seconds: Option<i64>,
    pub fixed_deadline: Option<DateTime<Utc>>,
    pub status: String,
    pub first_opened_at: Option<DateTime<Utc>>,
    pub open_count: i64,
    pub custom_expired_redirect: Option<String>,
    pub custom_expired_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<links::Model> for LinkResponse {
    fn from(l: links::Model) -> Self {
        Self {
            id: l.id,
            document_id: l.document_id,
            token: l.token,
            expiry_mode: l.expiry_mode,
            countdown_seconds: l.countdown_seconds,
            fixed_deadline: l.fixed_deadline,
            status: l.status,
            first_opened_at: l.first_opened_at,
            open_count: l.open_count,
            custom_expired_redirect: l.custom_expired_redirect,
            custom_expired_message: l.custom_expired_message,
            created_at: l.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AccessLogEntryResponse {
    pub viewer_ip: String,
    pub user_agent: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

impl From<access_log_entries::Model> for AccessLogEntryResponse {
    fn from(e: access_log_entries::Model) -> Self {
        Self {
            viewer_ip: e.viewer_ip,
            user_agent: e.user_agent,
            accessed_at: e.accessed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ViewerSessionResponse {
    pub viewer_ip: String,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl From<viewer_sessions::Model> for ViewerSessionResponse {
    fn from(s: viewer_sessions::Model) -> Self {
        Self {
            viewer_ip: s.viewer_ip,
            started_at: s.started_at,
            deadline: s.deadline,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LinkStatsResponse {
    pub link: LinkResponse,
    pub unique_viewers: u64,
    pub sessions: Vec<ViewerSessionResponse>,
    pub active_sessions: u64,
    pub recent_log: Vec<AccessLogEntryResponse>,
}

#[utoipa::path(
    post,
    path = "/links",
    request_body = CreateLinkRequest,
    responses(
        (status = 201, description = "Link created", body = LinkResponse),
        (status = 400, description = "Invalid expiry parameters"),
        (status = 403, description = "Subscription inactive"),
        (status = 404, description = "Document not found")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn create_link(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    let user = current_user(&state, &claims).await?;

    let expiry_mode = ExpiryMode::parse(&payload.expiry_mode).ok_or(AppError::BadRequest(
        format!("Unknown expiry mode: {}", payload.expiry_mode),
    ))?;

    let link = state
        .link_service
        .create_link(
            &user,
            CreateLinkParams {
                document_id: payload.document_id,
                expiry_mode,
                countdown_seconds: payload.countdown_seconds,
                fixed_deadline: payload.fixed_deadline,
                custom_expired_redirect: payload.custom_expired_redirect,
                custom_expired_message: payload.custom_expired_message,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(link.into())))
}

#[utoipa::path(
    get,
    path = "/links",
    responses(
        (status = 200, description = "Owner's links", body = [LinkResponse])
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn list_links(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<LinkResponse>>, AppError> {
    let links = state.link_service.list_links(&claims.sub).await?;
    Ok(Json(links.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/links/{id}/revoke",
    params(("id" = String, Path, description = "Link id")),
    responses(
        (status = 200, description = "Link revoked (idempotent)", body = LinkResponse),
        (status = 404, description = "Link not found")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn revoke_link(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<LinkResponse>, AppError> {
    let link = state.link_service.revoke_link(&id, &claims.sub).await?;
    Ok(Json(link.into()))
}

#[utoipa::path(
    delete,
    path = "/links/{id}",
    params(("id" = String, Path, description = "Link id")),
    responses(
        (status = 204, description = "Link deleted"),
        (status = 404, description = "Link not found")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn delete_link(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.link_service.delete_link(&id, &claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/links/{id}/stats",
    params(("id" = String, Path, description = "Link id")),
    responses(
        (status = 200, description = "Per-link statistics", body = LinkStatsResponse),
        (status = 404, description = "Link not found")
    ),
    security(("jwt" = [])),
    tag = "links"
)]
pub async fn link_stats(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<LinkStatsResponse>, AppError> {
    let report = state.link_service.get_stats(&id, &claims.sub).await?;
    Ok(Json(LinkStatsResponse {
        link: report.link.into(),
        unique_viewers: report.unique_viewers,
        sessions: report.sessions.into_iter().map(Into::into).collect(),
        active_sessions: report.active_sessions,
        recent_log: report.recent_log.into_iter().map(Into::into).collect(),
    }))
}
