//! Application state for the web layer.

use std::sync::Arc;

use crate::config::Config;
use crate::gtfs::SharedSnapshot;

/// Shared application state.
///
/// The snapshot handle is the only thing resembling mutable state, and it
/// only ever changes by wholesale replacement.
#[derive(Clone)]
pub struct AppState {
    /// Current GTFS snapshot.
    pub snapshot: SharedSnapshot,

    /// Validated configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(snapshot: SharedSnapshot, config: Config) -> Self {
        Self {
            snapshot,
            config: Arc::new(config),
        }
    }
}
