use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::RawItem;
use crate::scraping::strategies::ExtractionStrategy;

/// Clicks at most one "load more" control. Evaluates to `true` when clicked.
pub const LOAD_MORE_SCRIPT: &str = r#"
(() => {
  const labels = ['加载更多', '加载', '更多'];
  let el = document.querySelector("[data-action='more']");
  if (!el) {
    el = Array.from(document.querySelectorAll('a, button, span, div')).find(
      (e) => e.children.length === 0 && labels.includes((e.innerText || '').trim())
    );
  }
  if (!el) return false;
  el.click();
  return true;
})()
"#;

pub const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight); true";

/// Errors raised by the live page collaborator.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("browser unavailable: {0}")]
    Browser(String),
}

/// A live, continuously-mutating document the loop can poll and poke.
#[async_trait]
pub trait PageSnapshotProvider: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), ProviderError>;

    /// Full current snapshot, produced by the first strategy that yields items.
    async fn query_snapshot(
        &self,
        strategies: &[Box<dyn ExtractionStrategy>],
    ) -> Result<Vec<RawItem>, ProviderError>;

    async fn evaluate_script(&self, script: &str) -> Result<serde_json::Value, ProviderError>;

    /// Lookup failures count as "no challenge".
    async fn detect_challenge_markers(&self) -> bool;
}
