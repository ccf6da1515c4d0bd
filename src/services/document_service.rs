use crate::api::error::AppError;
use crate::entities::{documents, prelude::*};
use crate::services::storage::StorageService;
use crate::utils::clock::Clock;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Document registry: metadata rows in the database, bytes behind the
/// storage trait.
pub struct DocumentService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    clock: Arc<dyn Clock>,
}

impl DocumentService {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn StorageService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { db, storage, clock }
    }

    pub async fn upload(
        &self,
        owner_id: &str,
        filename: String,
        mime_type: String,
        data: Vec<u8>,
    ) -> Result<documents::Model, AppError> {
        if filename.trim().is_empty() {
            return Err(AppError::BadRequest("Filename cannot be empty".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let storage_key = format!("{}/{}", owner_id, id);
        let size = data.len() as i64;

        self.storage.save(&storage_key, data).await?;

        let document = documents::ActiveModel {
            id: Set(id),
            owner_id: Set(owner_id.to_string()),
            filename: Set(filename),
            storage_key: Set(storage_key),
            size: Set(size),
            mime_type: Set(mime_type),
            created_at: Set(self.clock.now()),
        };

        let document = document.insert(&self.db).await?;
        info!(document_id = %document.id, owner_id = %owner_id, size = size, "Document uploaded");
        Ok(document)
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<documents::Model>, AppError> {
        Ok(Documents::find()
            .filter(documents::Column::OwnerId.eq(owner_id))
            .order_by(documents::Column::CreatedAt, Order::Desc)
            .all(&self.db)
            .await?)
    }

    pub async fn get(
        &self,
        document_id: &str,
        owner_id: &str,
    ) -> Result<documents::Model, AppError> {
        Documents::find_by_id(document_id)
            .filter(documents::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound("Document not found".to_string()))
    }

    pub async fn read_bytes(&self, document: &documents::Model) -> Result<Vec<u8>, AppError> {
        Ok(self.storage.read(&document.storage_key).await?)
    }

    /// Removes the metadata row and the stored blob. Callers revoke the
    /// document's links first so viewers see "revoked" rather than a
    /// dangling not-found.
    pub async fn delete(&self, document_id: &str, owner_id: &str) -> Result<(), AppError> {
        let document = self.get(document_id, owner_id).await?;
        self.storage.delete(&document.storage_key).await?;
        Documents::delete_by_id(document.id.as_str())
            .exec(&self.db)
            .await?;
        info!(document_id = %document.id, "Document deleted");
        Ok(())
    }
}
