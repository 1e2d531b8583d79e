pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod policy;
pub mod request_validation;
pub mod schema;
