use std::sync::Arc;

use crate::config::Config;
use crate::providers::registry::ServiceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(registry: Arc<ServiceRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }
}
