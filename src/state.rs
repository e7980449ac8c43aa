use std::path::PathBuf;
use std::sync::Arc;

use crate::services::{AdmissionEngine, TicketRegistry};

#[derive(Clone)]
pub struct AppState {
    pub registry: TicketRegistry,
    pub engine: Arc<AdmissionEngine>,
    pub import_path: PathBuf,
}

impl AppState {
    pub fn new(registry: TicketRegistry, import_path: impl Into<PathBuf>) -> Self {
        Self {
            engine: Arc::new(AdmissionEngine::new(registry.clone())),
            registry,
            import_path: import_path.into(),
        }
    }
}
