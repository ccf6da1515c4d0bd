pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod health;
pub mod links;
pub mod view;

use crate::AppState;
use crate::api::error::AppError;
use crate::entities::{prelude::Users, users};
use crate::utils::auth::Claims;
use sea_orm::EntityTrait;

/// Loads the authenticated user's row. The auth middleware already checked
/// existence, but the row can vanish between then and now.
pub(crate) async fn current_user(
    state: &AppState,
    claims: &Claims,
) -> Result<users::Model, AppError> {
    Users::find_by_id(claims.sub.as_str())
        .one(&state.db)
        .await?
        .ok_or(AppError::Unauthorized("User not found".to_string()))
}
