use std::sync::Arc;
use std::time::Instant;

use crate::faucet::FaucetService;
use crate::launcher::LauncherService;

/// Services enabled for this process. A service is absent when its config section is.
#[derive(Clone)]
pub struct AppState {
    pub faucet: Option<Arc<FaucetService>>,
    pub launcher: Option<Arc<LauncherService>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(faucet: Option<FaucetService>, launcher: Option<LauncherService>) -> Self {
        assert!(
            faucet.is_some() || launcher.is_some(),
            "At least one service must be enabled"
        );
        Self {
            faucet: faucet.map(Arc::new),
            launcher: launcher.map(Arc::new),
            start_time: Instant::now(),
        }
    }
}
