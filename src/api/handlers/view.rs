use crate::api::error::AppError;
use crate::models::{AccessDecision, ExpiredReason};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use utoipa::ToSchema;

/// Stamped into the viewer payload so the frontend can overlay it on the
/// rendered document.
#[derive(Serialize, ToSchema)]
pub struct Watermark {
    pub viewer_ip: String,
    pub timestamp: DateTime<Utc>,
    pub link_id: String,
}

/// Viewer-facing resolution payload. Expired and revoked links answer 200
/// with a denial body; only unknown tokens 404.
#[derive(Serialize, ToSchema)]
pub struct ViewResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[utoipa::path(
    get,
    path = "/view/{token}",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Link state for this viewer", body = ViewResponse),
        (status = 404, description = "Unknown token")
    ),
    tag = "view"
)]
pub async fn view_link(
    State(state): State<crate::AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ViewResponse>, AppError> {
    let viewer_ip = crate::utils::net::extract_ip(&headers);
    let user_agent = crate::utils::net::extract_user_agent(&headers);

    let outcome = state
        .access_service
        .resolve(&token, &viewer_ip, user_agent)
        .await?;
    let link = outcome.link;

    let response = match outcome.decision {
        AccessDecision::Active {
            deadline,
            remaining_seconds,
        } => ViewResponse {
            status: "active".to_string(),
            file_url: Some(format!("/view/{}/file", link.token)),
            filename: None,
            expires_at: deadline,
            remaining_seconds,
            watermark: Some(Watermark {
                viewer_ip,
                timestamp: state.clock.now(),
                link_id: link.id,
            }),
            message: None,
            redirect_url: None,
        },
        AccessDecision::Expired { reason } => {
            // An inactive owner is the owner's problem, not something their
            // custom branding should dress up
            let custom_allowed = reason != ExpiredReason::OwnerInactive;
            ViewResponse {
                status: "expired".to_string(),
                file_url: None,
                filename: None,
                expires_at: None,
                remaining_seconds: None,
                watermark: None,
                message: Some(
                    link.custom_expired_message
                        .filter(|_| custom_allowed)
                        .unwrap_or_else(|| reason.default_message().to_string()),
                ),
                redirect_url: link.custom_expired_redirect.filter(|_| custom_allowed),
            }
        }
        AccessDecision::Revoked => ViewResponse {
            status: "revoked".to_string(),
            file_url: None,
            filename: None,
            expires_at: None,
            remaining_seconds: None,
            watermark: None,
            message: Some(
                link.custom_expired_message
                    .unwrap_or_else(|| "This link has been revoked".to_string()),
            ),
            redirect_url: link.custom_expired_redirect,
        },
        // resolve establishes sessions itself; this cannot come back from it
        AccessDecision::SessionRequired => {
            return Err(AppError::Internal(
                "Unestablished session after resolve".to_string(),
            ));
        }
    };

    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/view/{token}/file",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Document bytes"),
        (status = 403, description = "No session established for this viewer"),
        (status = 404, description = "Unknown or revoked token"),
        (status = 410, description = "Link expired")
    ),
    tag = "view"
)]
pub async fn fetch_file(
    State(state): State<crate::AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let viewer_ip = crate::utils::net::extract_ip(&headers);

    let grant = state.access_service.fetch(&token, &viewer_ip).await?;
    let data = state.document_service.read_bytes(&grant.document).await?;

    let encoded_filename =
        utf8_percent_encode(&grant.document.filename, NON_ALPHANUMERIC).to_string();
    let fallback: String = grant
        .document
        .filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect();
    let disposition = format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded_filename
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, grant.document.mime_type.as_str())
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CACHE_CONTROL, "no-store")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(response.into_response())
}
