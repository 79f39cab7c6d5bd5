//! # Quorum Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The calendar reconciliation engine (extractor, delta fetcher,
//!   reconciler, adaptive polling policy)
//! - Port/adapter interfaces (traits) for storage, provider API,
//!   credentials, and the meeting bot gateway
//!
//! ## Architecture Principles
//! - Only depends on `quorum-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod sync;

// Re-export specific items to avoid ambiguity
pub use sync::delta::DeltaFetcher;
pub use sync::extractor::extract;
pub use sync::policy::{classify_change_frequency, select_interval};
pub use sync::ports::{
    BotGateway, CalendarApi, CredentialProvider, CredentialsRepository, EventPage,
    MeetingRepository, SyncLogRepository, SyncStateRepository, WatchChannel, WindowRange,
};
pub use sync::reconciler::Reconciler;
