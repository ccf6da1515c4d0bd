use crate::api::error::AppError;
use crate::api::handlers::current_user;
use crate::api::handlers::links::LinkResponse;
use crate::services::stats_service::{DashboardStats, PlatformStats};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
};

#[utoipa::path(
    get,
    path = "/dashboard/stats",
    responses(
        (status = 200, description = "Owner dashboard aggregates", body = DashboardStats)
    ),
    security(("jwt" = [])),
    tag = "dashboard"
)]
pub async fn dashboard_stats(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DashboardStats>, AppError> {
    let stats = state.stats_service.owner_dashboard(&claims.sub).await?;
    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Platform-wide aggregates", body = PlatformStats),
        (status = 403, description = "Admin role required")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn admin_stats(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PlatformStats>, AppError> {
    require_admin(&state, &claims).await?;
    let stats = state.stats_service.platform_stats().await?;
    Ok(Json(stats))
}

#[utoipa::path(
    post,
    path = "/admin/links/{id}/revoke",
    params(("id" = String, Path, description = "Link id")),
    responses(
        (status = 200, description = "Link revoked", body = LinkResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Link not found")
    ),
    security(("jwt" = [])),
    tag = "admin"
)]
pub async fn admin_revoke_link(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<LinkResponse>, AppError> {
    require_admin(&state, &claims).await?;
    let link = state.link_service.admin_revoke_link(&id).await?;
    Ok(Json(link.into()))
}

async fn require_admin(state: &crate::AppState, claims: &Claims) -> Result<(), AppError> {
    let user = current_user(state, claims).await?;
    if user.role != "admin" {
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }
    Ok(())
}
