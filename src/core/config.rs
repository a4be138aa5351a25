use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collect::CollectorSettings;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (complaint-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "COMPLAINT_SCOUT_CONFIG";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

const DEFAULT_SITE_ORIGIN: &str = "https://tousu.sina.com.cn";
const DEFAULT_START_URL: &str = "https://tousu.sina.com.cn/";
const DEFAULT_SEARCH_PATH: &str = "/index/search/";
const DEFAULT_DETAIL_MARKER: &str = "tousu.sina.com.cn/complaint/view/";
const DEFAULT_STORAGE_STATE: &str = "data/sina_storage_state.json";
const DEFAULT_OUT_DIR: &str = "data";
const DEFAULT_LOG_PATH: &str = "output/complaint_scout.log";

/// Top-level config loaded from `complaint-scout.json`.
///
/// Every field is optional. Resolution order for each value is
/// JSON field → environment variable → built-in default.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    /// Origin used to resolve relative links, e.g. `https://tousu.sina.com.cn`.
    pub site_origin: Option<String>,
    /// Page opened by the login flow.
    pub start_url: Option<String>,
    pub search_path: Option<String>,
    /// Substring every kept complaint detail link must contain.
    pub detail_link_marker: Option<String>,
    pub storage_state_path: Option<String>,
    pub out_dir: Option<String>,
    pub log_path: Option<String>,
    pub port: Option<u16>,
    pub headless: Option<bool>,
    pub scroll_interval_secs: Option<f64>,
    pub fast_mode: Option<bool>,
    /// Consecutive unchanged snapshot sizes before a session counts as converged.
    pub stagnation_threshold: Option<u32>,
    pub navigation_attempts: Option<u32>,
    pub navigation_backoff_ms: Option<u64>,
    pub navigation_timeout_secs: Option<u64>,
    pub load_more_timeout_ms: Option<u64>,
    /// Default keywords for the one-shot CLI.
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    let v = env_string(key)?.to_ascii_lowercase();
    match v.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl ScoutConfig {
    pub fn resolve_site_origin(&self) -> String {
        non_blank(&self.site_origin)
            .or_else(|| env_string("COMPLAINT_SCOUT_ORIGIN"))
            .unwrap_or_else(|| DEFAULT_SITE_ORIGIN.to_string())
    }

    pub fn resolve_start_url(&self) -> String {
        non_blank(&self.start_url)
            .or_else(|| env_string("COMPLAINT_SCOUT_START_URL"))
            .unwrap_or_else(|| DEFAULT_START_URL.to_string())
    }

    pub fn resolve_search_path(&self) -> String {
        non_blank(&self.search_path).unwrap_or_else(|| DEFAULT_SEARCH_PATH.to_string())
    }

    pub fn resolve_detail_link_marker(&self) -> String {
        non_blank(&self.detail_link_marker).unwrap_or_else(|| DEFAULT_DETAIL_MARKER.to_string())
    }

    pub fn resolve_storage_state_path(&self) -> PathBuf {
        non_blank(&self.storage_state_path)
            .or_else(|| env_string("COMPLAINT_SCOUT_STORAGE_STATE"))
            .unwrap_or_else(|| DEFAULT_STORAGE_STATE.to_string())
            .into()
    }

    pub fn resolve_out_dir(&self) -> PathBuf {
        non_blank(&self.out_dir)
            .or_else(|| env_string("COMPLAINT_SCOUT_OUT_DIR"))
            .unwrap_or_else(|| DEFAULT_OUT_DIR.to_string())
            .into()
    }

    pub fn resolve_log_path(&self) -> PathBuf {
        non_blank(&self.log_path)
            .or_else(|| env_string("COMPLAINT_SCOUT_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string())
            .into()
    }

    /// Port: JSON field → `COMPLAINT_SCOUT_PORT` → `PORT` → 8765.
    pub fn resolve_port(&self) -> u16 {
        self.port
            .or_else(|| env_parse("COMPLAINT_SCOUT_PORT"))
            .or_else(|| env_parse("PORT"))
            .unwrap_or(8765)
    }

    pub fn resolve_headless(&self) -> bool {
        self.headless
            .or_else(|| env_bool("COMPLAINT_SCOUT_HEADLESS"))
            .unwrap_or(true)
    }

    pub fn resolve_scroll_interval(&self) -> Duration {
        self.scroll_interval_secs
            .or_else(|| env_parse("COMPLAINT_SCOUT_SCROLL_INTERVAL"))
            .and_then(|secs: f64| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(Duration::from_millis(2500))
    }

    pub fn resolve_fast_mode(&self) -> bool {
        self.fast_mode
            .or_else(|| env_bool("COMPLAINT_SCOUT_FAST"))
            .unwrap_or(false)
    }

    pub fn resolve_stagnation_threshold(&self) -> u32 {
        self.stagnation_threshold
            .or_else(|| env_parse("COMPLAINT_SCOUT_STAGNATION"))
            .unwrap_or(2)
            .max(1)
    }

    pub fn resolve_navigation_attempts(&self) -> u32 {
        self.navigation_attempts
            .or_else(|| env_parse("COMPLAINT_SCOUT_NAV_ATTEMPTS"))
            .unwrap_or(3)
            .max(1)
    }

    pub fn resolve_navigation_backoff(&self) -> Duration {
        Duration::from_millis(
            self.navigation_backoff_ms
                .or_else(|| env_parse("COMPLAINT_SCOUT_NAV_BACKOFF_MS"))
                .unwrap_or(1500),
        )
    }

    pub fn resolve_navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs.unwrap_or(60))
    }

    pub fn resolve_load_more_timeout(&self) -> Duration {
        Duration::from_millis(self.load_more_timeout_ms.unwrap_or(3000))
    }

    /// Loop settings for one session. Per-request overrides win over the config.
    pub fn collector_settings(
        &self,
        scroll_interval: Option<Duration>,
        fast_mode: Option<bool>,
    ) -> CollectorSettings {
        CollectorSettings {
            site_origin: self.resolve_site_origin(),
            search_path: self.resolve_search_path(),
            scroll_interval: scroll_interval.unwrap_or_else(|| self.resolve_scroll_interval()),
            fast_mode: fast_mode.unwrap_or_else(|| self.resolve_fast_mode()),
            stagnation_threshold: self.resolve_stagnation_threshold(),
            navigation_attempts: self.resolve_navigation_attempts(),
            navigation_backoff: self.resolve_navigation_backoff(),
            load_more_timeout: self.resolve_load_more_timeout(),
        }
    }
}

/// Load `complaint-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `COMPLAINT_SCOUT_CONFIG` env var path
/// 2. `./complaint-scout.json`
/// 3. `./config/complaint-scout.json`
///
/// Missing file → `ScoutConfig::default()`.
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = vec![
        PathBuf::from("complaint-scout.json"),
        PathBuf::from("config/complaint-scout.json"),
    ];
    if let Some(env_path) = env_string(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        if let Some(cfg) = load_from_path(path) {
            return cfg;
        }
    }
    ScoutConfig::default()
}

/// `None` when the file does not exist; defaults when it exists but is malformed.
pub fn load_from_path(path: &Path) -> Option<ScoutConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<ScoutConfig>(&contents) {
        Ok(cfg) => {
            tracing::info!("config loaded from {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            tracing::warn!(
                "config parse error at {}: {} (using defaults)",
                path.display(),
                e
            );
            Some(ScoutConfig::default())
        }
    }
}

/// Optional override for the Chromium-family browser executable.
///
/// Only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = env_string(ENV_CHROME_EXECUTABLE)?;
    if Path::new(&p).exists() {
        Some(p)
    } else {
        None
    }
}
