use crate::api::error::AppError;
use crate::api::handlers::current_user;
use crate::entities::documents;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: String,
    pub filename: String,
    pub size: i64,
    pub mime_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<documents::Model> for DocumentResponse {
    fn from(d: documents::Model) -> Self {
        Self {
            id: d.id,
            filename: d.filename,
            size: d.size,
            mime_type: d.mime_type,
            created_at: d.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DeleteDocumentResponse {
    pub revoked_links: u64,
}

#[utoipa::path(
    post,
    path = "/documents",
    request_body(content = Object, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document uploaded", body = DocumentResponse),
        (status = 400, description = "Missing file part")
    ),
    security(("jwt" = [])),
    tag = "documents"
)]
pub async fn upload_document(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    let user = current_user(&state, &claims).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or(AppError::BadRequest("Missing filename".to_string()))?;
        let mime_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
            .to_vec();

        let document = state
            .document_service
            .upload(&user.id, filename, mime_type, data)
            .await?;
        return Ok((StatusCode::CREATED, Json(document.into())));
    }

    Err(AppError::BadRequest("Missing file part".to_string()))
}

#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "Owner's documents", body = [DocumentResponse])
    ),
    security(("jwt" = [])),
    tag = "documents"
)]
pub async fn list_documents(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let documents = state.document_service.list(&claims.sub).await?;
    Ok(Json(documents.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    delete,
    path = "/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document deleted, its links revoked", body = DeleteDocumentResponse),
        (status = 404, description = "Document not found")
    ),
    security(("jwt" = [])),
    tag = "documents"
)]
pub async fn delete_document(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<DeleteDocumentResponse>, AppError> {
    // Ownership check happens here; only then do the links flip
    state.document_service.get(&id, &claims.sub).await?;

    let revoked_links = state.link_service.revoke_links_for_document(&id).await?;
    state.document_service.delete(&id, &claims.sub).await?;

    Ok(Json(DeleteDocumentResponse { revoked_links }))
}
