//! Bookshelf
//!
//! A small REST JSON API over an in-memory catalogue of books, with
//! per-request deadlines, access logging, permissive CORS and graceful
//! shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod server;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    /// Canceled when the server gives up draining in-flight requests
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, services: services::Services) -> Self {
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            shutdown: CancellationToken::new(),
        }
    }
}
