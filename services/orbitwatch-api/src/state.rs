use orbitwatch_engine::Engine;
use std::sync::Arc;

use crate::config::Config;

pub struct AppState {
    pub config: Config,
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        AppState { config, engine }
    }
}
