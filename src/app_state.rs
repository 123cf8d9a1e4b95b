use std::sync::Arc;

use crate::services::{dispatch::Dispatcher, job_store::JobStore};

/// Shared application state passed to all route handlers.
///
/// Handlers share nothing else: every bit of job state lives in the store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { store, dispatcher }
    }
}
