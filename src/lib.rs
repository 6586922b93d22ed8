//! URL reputation aggregation and caching library.

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod query;
pub mod resilience;
pub mod security;
pub mod sources;
pub mod time;

pub use config::schema::GatewayConfig;
pub use gateway::{CheckError, CheckOutcome, ReputationService};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
