use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::LinkStatus;
use crate::utils::clock::Clock;
use chrono::Duration;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QuerySelect, RelationTrait,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Aggregates shown on the owner dashboard.
///
/// `recent_opens` is computed from the bounded access log, so heavily used
/// links report a floor rather than an exact count.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_links: u64,
    pub active_links: u64,
    pub revoked_links: u64,
    pub expired_links: u64,
    pub total_opens: i64,
    pub unique_viewers: u64,
    pub recent_opens: u64,
}

/// Platform-wide totals for the admin view.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlatformStats {
    pub total_users: u64,
    pub total_documents: u64,
    pub total_links: u64,
    pub active_links: u64,
    pub total_opens: i64,
    pub unique_viewers: u64,
}

pub struct StatsService {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl StatsService {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn owner_dashboard(&self, owner_id: &str) -> Result<DashboardStats, AppError> {
        let total_links = Links::find()
            .filter(links::Column::OwnerId.eq(owner_id))
            .count(&self.db)
            .await?;

        let count_by_status = |status: LinkStatus| {
            Links::find()
                .filter(links::Column::OwnerId.eq(owner_id))
                .filter(links::Column::Status.eq(status.as_str()))
                .count(&self.db)
        };
        let active_links = count_by_status(LinkStatus::Active).await?;
        let revoked_links = count_by_status(LinkStatus::Revoked).await?;
        let expired_links = count_by_status(LinkStatus::Expired).await?;

        let total_opens: Option<i64> = Links::find()
            .select_only()
            .column_as(links::Column::OpenCount.sum(), "total")
            .filter(links::Column::OwnerId.eq(owner_id))
            .into_tuple()
            .one(&self.db)
            .await?
            .flatten();

        let unique_viewers = LinkViewers::find()
            .join(JoinType::InnerJoin, link_viewers::Relation::Links.def())
            .filter(links::Column::OwnerId.eq(owner_id))
            .select_only()
            .column(link_viewers::Column::ViewerIp)
            .distinct()
            .count(&self.db)
            .await?;

        let cutoff = self.clock.now() - Duration::days(7);
        let recent_opens = AccessLogEntries::find()
            .join(
                JoinType::InnerJoin,
                access_log_entries::Relation::Links.def(),
            )
            .filter(links::Column::OwnerId.eq(owner_id))
            .filter(access_log_entries::Column::AccessedAt.gte(cutoff))
            .count(&self.db)
            .await?;

        Ok(DashboardStats {
            total_links,
            active_links,
            revoked_links,
            expired_links,
            total_opens: total_opens.unwrap_or(0),
            unique_viewers,
            recent_opens,
        })
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats, AppError> {
        let total_users = Users::find().count(&self.db).await?;
        let total_documents = Documents::find().count(&self.db).await?;
        let total_links = Links::find().count(&self.db).await?;
        let active_links = Links::find()
            .filter(links::Column::Status.eq(LinkStatus::Active.as_str()))
            .count(&self.db)
            .await?;

        let total_opens: Option<i64> = Links::find()
            .select_only()
            .column_as(links::Column::OpenCount.sum(), "total")
            .into_tuple()
            .one(&self.db)
            .await?
            .flatten();

        // Union across links: the same address behind two links counts once
        let unique_viewers = LinkViewers::find()
            .select_only()
            .column(link_viewers::Column::ViewerIp)
            .distinct()
            .count(&self.db)
            .await?;

        Ok(PlatformStats {
            total_users,
            total_documents,
            total_links,
            active_links,
            total_opens: total_opens.unwrap_or(0),
            unique_viewers,
        })
    }
}
