//! Sync orchestration

pub mod worker;

pub use worker::SyncWorker;
