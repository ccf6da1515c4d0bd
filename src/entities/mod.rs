pub mod prelude;

pub mod access_log_entries;
pub mod documents;
pub mod link_viewers;
pub mod links;
pub mod users;
pub mod viewer_sessions;
