use std::sync::Arc;

use tokio::sync::Mutex;

use crate::services::{FeedSession, InfiniteCatalog};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The single execution context served by this process
    pub session: Arc<Mutex<FeedSession>>,
    pub catalog: Arc<InfiniteCatalog>,
}

impl AppState {
    /// Wraps a session and its catalog buffer. Runs the once-per-session decay.
    pub fn new(mut session: FeedSession, catalog: InfiniteCatalog) -> Self {
        session.on_session_load();
        Self {
            session: Arc::new(Mutex::new(session)),
            catalog: Arc::new(catalog),
        }
    }
}
