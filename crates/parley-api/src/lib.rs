//! HTTP surface for the product catalog and price negotiations.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod negotiations;
pub mod products;
pub mod router;
pub mod services;
pub mod state;

pub use config::AuthConfig;
pub use error::ApiError;
pub use router::build_router;
pub use state::{AppState, AppStateInner};
