//! Browser discovery and launch configuration for `chromiumoxide`.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;

use crate::collect::ProviderError;
use crate::core::config::chrome_executable_override;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan
/// 3. OS-specific well-known install paths
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
            "msedge",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    well_known_paths()
        .iter()
        .find(|c| Path::new(c).exists())
        .map(|c| c.to_string())
}

#[cfg(target_os = "macos")]
fn well_known_paths() -> &'static [&'static str] {
    &[
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ]
}

#[cfg(target_os = "windows")]
fn well_known_paths() -> &'static [&'static str] {
    &[
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    ]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn well_known_paths() -> &'static [&'static str] {
    &[
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/local/bin/chromium",
    ]
}

/// How a crawl or login browser is launched.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Skip image loading.
    pub fast_mode: bool,
    pub navigation_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            fast_mode: false,
            navigation_timeout: Duration::from_secs(60),
        }
    }
}

/// Build a `BrowserConfig` for a collection run.
///
/// `--disable-blink-features=AutomationControlled` hides `navigator.webdriver`.
pub fn build_browser_config(exe: &str, opts: &LaunchOptions) -> Result<BrowserConfig, ProviderError> {
    let (width, height) = (1366, 900);

    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .request_timeout(opts.navigation_timeout)
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--lang=zh-CN")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", USER_AGENT));

    if !opts.headless {
        builder = builder.with_head();
    }
    if opts.fast_mode {
        builder = builder.arg("--blink-settings=imagesEnabled=false");
    }

    builder
        .build()
        .map_err(|e| ProviderError::Browser(format!("failed to build browser config: {e}")))
}
