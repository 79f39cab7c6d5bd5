//! Calendar provider integrations

pub mod google;

pub use google::GoogleCalendarApi;
