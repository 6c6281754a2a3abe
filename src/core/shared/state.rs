use std::sync::Arc;

use crate::auth::AuthClient;
use crate::core::config::AppConfig;
use crate::core::data::DataClient;

/// Shared handles given to every handler. Built once at startup; both
/// clients are trait objects so tests can swap in in-memory versions.
#[derive(Clone)]
pub struct AppState {
    pub data: Arc<dyn DataClient>,
    pub auth: Arc<dyn AuthClient>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(data: Arc<dyn DataClient>, auth: Arc<dyn AuthClient>, config: AppConfig) -> Self {
        Self {
            data,
            auth,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.data.backend_name())
            .field("config", &self.config)
            .finish()
    }
}
