//! Database implementations

pub mod credentials_repository;
pub mod manager;
pub mod meeting_repository;
pub mod sync_log_repository;
pub mod sync_state_repository;

pub use credentials_repository::SqliteCredentialsRepository;
pub use manager::DbManager;
pub use meeting_repository::SqliteMeetingRepository;
pub use sync_log_repository::SqliteSyncLogRepository;
pub use sync_state_repository::SqliteSyncStateRepository;
