//! Shared application state.
//!
//! `AppState` is injected into Axum handlers and middleware via the `State`
//! extractor. The resolved config is read-only after startup; the proxy
//! client wraps a pooled `reqwest::Client`, so cloning either is cheap.

use std::sync::Arc;

use crate::config::DevConfig;
use crate::proxy::{ProxyClient, ProxyError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DevConfig>,
    pub proxy: ProxyClient,
}

impl AppState {
    /// Build state from a resolved config.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy HTTP client cannot be constructed.
    pub fn new(config: DevConfig) -> Result<Self, ProxyError> {
        let proxy = ProxyClient::new(config.proxy.clone())?;
        Ok(Self { config: Arc::new(config), proxy })
    }
}
