//! Login cookie persistence.
//!
//! `save_login` writes the browser cookie jar as a JSON array to the
//! configured storage-state path; every later crawl launch injects it into
//! the fresh page before the first navigation.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Whether a saved login exists at `path`.
pub fn has_saved_login(path: &Path) -> bool {
    path.is_file()
}

/// Stored cookies as raw JSON values. `None` when absent, empty or unreadable.
pub fn load_raw(path: &Path) -> Option<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path).ok()?;
    let cookies: Vec<serde_json::Value> = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!(
                "session_store: unreadable storage state {}: {}",
                path.display(),
                e
            );
            return None;
        }
    };
    if cookies.is_empty() {
        return None;
    }
    info!(
        "session_store: loaded {} cookies ({})",
        cookies.len(),
        path.display()
    );
    Some(cookies)
}

/// Write the cookie jar to `path`, creating parent directories.
pub fn save_raw(path: &Path, cookies: &[serde_json::Value]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(cookies)?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    info!(
        "session_store: saved {} cookies to {}",
        cookies.len(),
        path.display()
    );
    Ok(())
}

/// Inject stored cookies into a live CDP page. Call before `goto`.
///
/// Entries that do not deserialize into a `CookieParam` are skipped.
pub async fn inject_into_page(page: &chromiumoxide::Page, raw_cookies: &[serde_json::Value]) {
    use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams};

    let cookie_params: Vec<CookieParam> = raw_cookies
        .iter()
        .filter_map(|v| serde_json::from_value::<CookieParam>(v.clone()).ok())
        .collect();

    if cookie_params.is_empty() {
        warn!("session_store: stored login contained no valid cookies, skipping injection");
        return;
    }

    let count = cookie_params.len();
    match page.execute(SetCookiesParams::new(cookie_params)).await {
        Ok(_) => info!("session_store: injected {} login cookies", count),
        Err(e) => warn!("session_store: failed to inject login cookies: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        assert!(!has_saved_login(&path));

        let cookies = vec![json!({"name": "SUB", "value": "abc", "domain": ".sina.com.cn"})];
        save_raw(&path, &cookies).unwrap();

        assert!(has_saved_login(&path));
        assert_eq!(load_raw(&path), Some(cookies));
    }

    #[test]
    fn test_empty_or_malformed_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        assert!(load_raw(&empty).is_none());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{oops").unwrap();
        assert!(load_raw(&broken).is_none());
    }
}
