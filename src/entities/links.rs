use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub document_id: String,
    #[sea_orm(unique)]
    pub token: String,
    pub expiry_mode: String, // "countdown", "fixed" or "manual"
    pub countdown_seconds: Option<i64>,
    pub fixed_deadline: Option<DateTimeUtc>,
    pub status: String, // "active", "expired" or "revoked"
    pub first_opened_at: Option<DateTimeUtc>,
    pub open_count: i64,
    pub custom_expired_redirect: Option<String>,
    pub custom_expired_message: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::documents::Entity",
        from = "Column::DocumentId",
        to = "super::documents::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Documents,
    #[sea_orm(has_many = "super::viewer_sessions::Entity")]
    ViewerSessions,
    #[sea_orm(has_many = "super::access_log_entries::Entity")]
    AccessLogEntries,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::documents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl Related<super::viewer_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ViewerSessions.def()
    }
}

impl Related<super::access_log_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccessLogEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
