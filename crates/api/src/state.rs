use std::sync::Arc;

use roster_core::store::StoreProvider;

use crate::background::import_jobs::ImportJobs;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Source of employee store sessions.
    pub store: Arc<dyn StoreProvider>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Registry of background import runs.
    pub imports: Arc<ImportJobs>,
}
