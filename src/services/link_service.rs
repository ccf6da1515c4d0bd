use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{ExpiryMode, LinkStatus};
use crate::utils::clock::Clock;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Parameters for creating a link, already deserialized and owner-scoped.
#[derive(Debug, Clone)]
pub struct CreateLinkParams {
    pub document_id: String,
    pub expiry_mode: ExpiryMode,
    pub countdown_seconds: Option<i64>,
    pub fixed_deadline: Option<chrono::DateTime<Utc>>,
    pub custom_expired_redirect: Option<String>,
    pub custom_expired_message: Option<String>,
}

/// Per-link statistics for the owner's detail view.
#[derive(Debug, Clone)]
pub struct LinkStatsReport {
    pub link: links::Model,
    pub unique_viewers: u64,
    pub sessions: Vec<viewer_sessions::Model>,
    pub active_sessions: u64,
    pub recent_log: Vec<access_log_entries::Model>,
}

/// Owner-facing link lifecycle: creation, listing, revocation, deletion.
pub struct LinkService {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl LinkService {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// 32 random bytes, base64url without padding. Unguessable and safe to
    /// embed in a path segment.
    fn generate_token() -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..32).map(|_| rng.r#gen()).collect();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub async fn create_link(
        &self,
        owner: &users::Model,
        params: CreateLinkParams,
    ) -> Result<links::Model, AppError> {
        if owner.subscription_status != "active" {
            return Err(AppError::NotEntitled(
                "Active subscription required to create links".to_string(),
            ));
        }

        // Owners can only share their own documents; a foreign id looks the
        // same as a missing one
        Documents::find_by_id(params.document_id.as_str())
            .filter(documents::Column::OwnerId.eq(&owner.id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound("Document not found".to_string()))?;

        match params.expiry_mode {
            ExpiryMode::Countdown => {
                let secs = params.countdown_seconds.ok_or(AppError::BadRequest(
                    "countdown_seconds is required for countdown links".to_string(),
                ))?;
                if secs <= 0 {
                    return Err(AppError::BadRequest(
                        "countdown_seconds must be positive".to_string(),
                    ));
                }
            }
            ExpiryMode::Fixed => {
                let deadline = params.fixed_deadline.ok_or(AppError::BadRequest(
                    "fixed_deadline is required for fixed links".to_string(),
                ))?;
                if deadline <= self.clock.now() {
                    return Err(AppError::BadRequest(
                        "fixed_deadline must be in the future".to_string(),
                    ));
                }
            }
            ExpiryMode::Manual => {}
        }

        let link = links::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            owner_id: Set(owner.id.clone()),
            document_id: Set(params.document_id),
            token: Set(Self::generate_token()),
            expiry_mode: Set(params.expiry_mode.as_str().to_string()),
            countdown_seconds: Set(match params.expiry_mode {
                ExpiryMode::Countdown => params.countdown_seconds,
                _ => None,
            }),
            fixed_deadline: Set(match params.expiry_mode {
                ExpiryMode::Fixed => params.fixed_deadline,
                _ => None,
            }),
            status: Set(LinkStatus::Active.as_str().to_string()),
            first_opened_at: Set(None),
            open_count: Set(0),
            custom_expired_redirect: Set(params.custom_expired_redirect),
            custom_expired_message: Set(params.custom_expired_message),
            created_at: Set(self.clock.now()),
        };

        let link = link.insert(&self.db).await?;
        info!(link_id = %link.id, owner_id = %link.owner_id, mode = %link.expiry_mode, "Link created");
        Ok(link)
    }

    pub async fn list_links(&self, owner_id: &str) -> Result<Vec<links::Model>, AppError> {
        Ok(Links::find()
            .filter(links::Column::OwnerId.eq(owner_id))
            .order_by(links::Column::CreatedAt, Order::Desc)
            .all(&self.db)
            .await?)
    }

    pub async fn get_link(&self, link_id: &str, owner_id: &str) -> Result<links::Model, AppError> {
        Links::find_by_id(link_id)
            .filter(links::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound("Link not found".to_string()))
    }

    /// Revocation is idempotent and terminal. Revoking an already expired or
    /// revoked link succeeds and leaves it revoked.
    pub async fn revoke_link(&self, link_id: &str, owner_id: &str) -> Result<links::Model, AppError> {
        let link = self.get_link(link_id, owner_id).await?;
        self.revoke(link).await
    }

    /// Admin revocation skips the ownership filter.
    pub async fn admin_revoke_link(&self, link_id: &str) -> Result<links::Model, AppError> {
        let link = Links::find_by_id(link_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound("Link not found".to_string()))?;
        self.revoke(link).await
    }

    async fn revoke(&self, link: links::Model) -> Result<links::Model, AppError> {
        if link.status == LinkStatus::Revoked.as_str() {
            return Ok(link);
        }
        let id = link.id.clone();
        let mut active: links::ActiveModel = link.into();
        active.status = Set(LinkStatus::Revoked.as_str().to_string());
        let link = active.update(&self.db).await?;
        info!(link_id = %id, "Link revoked");
        Ok(link)
    }

    /// Removes the link record itself. Sessions, viewer rows and log entries
    /// go with it via cascade.
    pub async fn delete_link(&self, link_id: &str, owner_id: &str) -> Result<(), AppError> {
        let res = Links::delete_many()
            .filter(links::Column::Id.eq(link_id))
            .filter(links::Column::OwnerId.eq(owner_id))
            .exec(&self.db)
            .await?;
        if res.rows_affected == 0 {
            return Err(AppError::NotFound("Link not found".to_string()));
        }
        info!(link_id = %link_id, "Link deleted");
        Ok(())
    }

    /// Revokes every active link pointing at a document. Used when the
    /// document itself is deleted; the link records stay behind so owners
    /// can still see their history.
    pub async fn revoke_links_for_document(&self, document_id: &str) -> Result<u64, AppError> {
        let res = Links::update_many()
            .col_expr(
                links::Column::Status,
                sea_orm::sea_query::Expr::value(LinkStatus::Revoked.as_str()),
            )
            .filter(links::Column::DocumentId.eq(document_id))
            .filter(links::Column::Status.ne(LinkStatus::Revoked.as_str()))
            .exec(&self.db)
            .await?;
        if res.rows_affected > 0 {
            info!(document_id = %document_id, count = res.rows_affected, "Links revoked for deleted document");
        }
        Ok(res.rows_affected)
    }

    pub async fn get_stats(
        &self,
        link_id: &str,
        owner_id: &str,
    ) -> Result<LinkStatsReport, AppError> {
        use sea_orm::PaginatorTrait;

        let link = self.get_link(link_id, owner_id).await?;

        let unique_viewers = LinkViewers::find()
            .filter(link_viewers::Column::LinkId.eq(link_id))
            .count(&self.db)
            .await?;

        let sessions = ViewerSessions::find()
            .filter(viewer_sessions::Column::LinkId.eq(link_id))
            .all(&self.db)
            .await?;
        let now = self.clock.now();
        let active_sessions = sessions.iter().filter(|s| s.deadline > now).count() as u64;

        let recent_log = AccessLogEntries::find()
            .filter(access_log_entries::Column::LinkId.eq(link_id))
            .order_by(access_log_entries::Column::Id, Order::Desc)
            .limit(50)
            .all(&self.db)
            .await?;

        Ok(LinkStatsReport {
            link,
            unique_viewers,
            sessions,
            active_sessions,
            recent_log,
        })
    }
}
