use crate::config::AppConfig;
use crate::services::storage::{LocalStorageService, StorageService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> Arc<dyn StorageService> {
    let root = PathBuf::from(&config.storage_path);
    info!("🗄️  Storage root: {}", root.display());
    Arc::new(LocalStorageService::new(root))
}
