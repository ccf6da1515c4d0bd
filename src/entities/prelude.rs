pub use super::access_log_entries::Entity as AccessLogEntries;
pub use super::documents::Entity as Documents;
pub use super::link_viewers::Entity as LinkViewers;
pub use super::links::Entity as Links;
pub use super::users::Entity as Users;
pub use super::viewer_sessions::Entity as ViewerSessions;
