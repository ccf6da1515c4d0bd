pub mod access_service;
pub mod document_service;
pub mod link_service;
pub mod stats_service;
pub mod storage;

pub use access_service::AccessService;
pub use document_service::DocumentService;
pub use link_service::LinkService;
pub use stats_service::StatsService;
pub use storage::{LocalStorageService, StorageService};
