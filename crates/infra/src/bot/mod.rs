//! Meeting bot gateway implementations

pub mod gateway;

pub use gateway::{select_gateway, HttpBotGateway, LocalBotGateway};
