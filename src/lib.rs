pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod extractors;
pub mod geocoding;
pub mod handlers;
pub mod items;
pub mod profiles;
pub mod search;
pub mod store;
