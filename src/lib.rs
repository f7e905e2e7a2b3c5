pub mod config;
pub mod error;
pub mod payload;
pub mod query;
pub mod reports;
pub mod types;
