use crate::crawler::JobManager;
use crate::store::ContentStore;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub manager: JobManager,
    /// Project name reported in the index route's `meta`
    pub project: String,
}

impl AppState {
    pub fn new(manager: JobManager) -> Self {
        Self {
            manager,
            project: "WSF Web Scraper".to_string(),
        }
    }

    pub fn store(&self) -> &ContentStore {
        self.manager.store()
    }
}
