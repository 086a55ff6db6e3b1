use capping::CappingEngine;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Frequency-capping engine over the shared store.
    pub engine: CappingEngine,
}
