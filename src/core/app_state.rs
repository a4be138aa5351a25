use std::sync::Arc;

use tokio::sync::Mutex;

use super::config::{load_scout_config, ScoutConfig};
use super::status::JobControl;
use crate::scraping::LoginSession;

pub struct AppState {
    /// File-based config loaded from `complaint-scout.json` (env-var fallback for all fields).
    pub config: Arc<ScoutConfig>,
    /// Status and control of the single crawl job the server runs at a time.
    pub control: Arc<JobControl>,
    /// Visible login browser between `/open_login` and `/save_login`.
    pub login: Mutex<Option<LoginSession>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.control.snapshot();
        f.debug_struct("AppState")
            .field("job_running", &status.running)
            .field("login_open", &self.login.try_lock().map(|l| l.is_some()).ok())
            .finish()
    }
}

impl AppState {
    pub fn new(config: ScoutConfig) -> Self {
        Self {
            config: Arc::new(config),
            control: Arc::new(JobControl::new()),
            login: Mutex::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(load_scout_config())
    }
}
