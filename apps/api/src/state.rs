use std::sync::Arc;

use crate::llm_client::ChatBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Chat pipeline. `LlmClient` in production, swapped for scripted backends in tests.
    pub chat: Arc<dyn ChatBackend>,
}
