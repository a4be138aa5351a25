use std::time::Duration;

use backoff::backoff::Constant;
use backoff::future::retry;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{CollectError, Deduplicator, ItemSink, PageSnapshotProvider, SessionHooks};
use super::provider::{LOAD_MORE_SCRIPT, SCROLL_SCRIPT};
use crate::core::types::RawItem;
use crate::core::url_norm::keyword_search_url;
use crate::scraping::strategies::{default_listing_strategies, DetailPageStrategy, ExtractionStrategy};

/// What one session collects from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Site search for `keyword`; `search_type` is the site's `t` parameter.
    Keyword { keyword: String, search_type: u32 },
    Url(String),
}

impl Target {
    pub fn url(&self, settings: &CollectorSettings) -> String {
        match self {
            Target::Keyword {
                keyword,
                search_type,
            } => keyword_search_url(
                &settings.site_origin,
                &settings.search_path,
                keyword,
                *search_type,
            ),
            Target::Url(url) => url.trim().to_string(),
        }
    }

    /// Value written into the `keyword` column of persisted rows.
    pub fn label(&self) -> &str {
        match self {
            Target::Keyword { keyword, .. } => keyword,
            Target::Url(url) => url,
        }
    }
}

/// Tunables of the collection loop.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub site_origin: String,
    pub search_path: String,
    pub scroll_interval: Duration,
    pub fast_mode: bool,
    pub stagnation_threshold: u32,
    pub navigation_attempts: u32,
    pub navigation_backoff: Duration,
    pub load_more_timeout: Duration,
}

impl CollectorSettings {
    /// Delay after each scroll.
    pub fn pause(&self) -> Duration {
        let factor = if self.fast_mode { 0.8 } else { 1.2 };
        self.scroll_interval.mul_f64(factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Starting,
    Challenged,
    Polling,
    Advancing,
    Converged,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Converged,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CollectionReport {
    /// Deduplicated items in first-seen order, across the whole session.
    pub items: Vec<RawItem>,
    pub outcome: SessionOutcome,
    pub loop_count: u32,
    /// `true` when `items` came from the final full-document extraction.
    pub used_fallback: bool,
}

/// Listing strategies for polling, detail strategies for the single-URL fallback.
pub struct StrategySet {
    pub listing: Vec<Box<dyn ExtractionStrategy>>,
    pub detail: Vec<Box<dyn ExtractionStrategy>>,
}

impl StrategySet {
    pub fn for_site(origin: &str) -> Self {
        Self {
            listing: default_listing_strategies(origin),
            detail: vec![Box::new(DetailPageStrategy::new())],
        }
    }

    pub fn empty() -> Self {
        Self {
            listing: Vec::new(),
            detail: Vec::new(),
        }
    }
}

/// Navigate with a fixed attempt budget and a constant delay between attempts.
pub async fn navigate_with_retry<P>(
    provider: &P,
    url: &str,
    settings: &CollectorSettings,
) -> Result<(), CollectError>
where
    P: PageSnapshotProvider + ?Sized,
{
    let attempts = settings.navigation_attempts.max(1);
    let mut tried = 0u32;

    retry(Constant::new(settings.navigation_backoff), || {
        tried += 1;
        let attempt = tried;
        async move {
            match provider.navigate(url).await {
                Ok(()) => Ok(()),
                Err(e) if attempt >= attempts => Err(backoff::Error::permanent(e)),
                Err(e) => {
                    warn!("navigation attempt {}/{} failed: {}", attempt, attempts, e);
                    Err(backoff::Error::transient(e))
                }
            }
        }
    })
    .await
    .map_err(|source| CollectError::Navigation {
        url: url.to_string(),
        attempts,
        source,
    })
}

/// Drive one collection session to convergence or cancellation.
///
/// New items are handed to `sink` as soon as they are seen; a sink failure
/// ends the session. When nothing was captured the session makes one final
/// extraction pass (detail strategies for a URL target) before returning.
pub async fn run_session<P>(
    provider: &P,
    target: &Target,
    settings: &CollectorSettings,
    strategies: &StrategySet,
    hooks: SessionHooks<'_>,
    sink: &mut dyn ItemSink,
) -> Result<CollectionReport, CollectError>
where
    P: PageSnapshotProvider + ?Sized,
{
    let url = target.url(settings);
    let label = target.label();

    hooks.progress.phase(SessionPhase::Starting);
    info!("collect start target={} url={}", label, url);
    navigate_with_retry(provider, &url, settings).await?;

    if provider.detect_challenge_markers().await {
        warn!("verification challenge on {}, waiting for resolution", url);
        hooks.progress.phase(SessionPhase::Challenged);
        hooks.gate.wait_for_resolution().await;
        info!("challenge wait released target={}", label);
    }

    let mut tracker = Deduplicator::new(settings.stagnation_threshold, &settings.site_origin);
    let mut collected: Vec<RawItem> = Vec::new();
    let mut loop_count = 0u32;

    let outcome = if hooks.stop.is_stop_requested() {
        SessionOutcome::Cancelled
    } else {
        loop {
            hooks.progress.phase(SessionPhase::Polling);
            let snapshot = match provider.query_snapshot(&strategies.listing).await {
                Ok(items) => items,
                Err(e) => {
                    warn!("snapshot failed, treating as empty: {}", e);
                    Vec::new()
                }
            };
            let observation = tracker.observe(&snapshot);
            hooks
                .progress
                .report(loop_count, observation.new_items.len());
            info!(
                "progress loads={} count={} new={} target={} fast={}",
                loop_count,
                observation.snapshot_len,
                observation.new_items.len(),
                label,
                settings.fast_mode
            );
            if !observation.new_items.is_empty() {
                sink.append(&observation.new_items, label)?;
                collected.extend(observation.new_items);
            }

            hooks.progress.phase(SessionPhase::Advancing);
            advance(provider, settings).await;

            if hooks.stop.is_stop_requested() {
                break SessionOutcome::Cancelled;
            }
            if observation.should_stop {
                break SessionOutcome::Converged;
            }
            loop_count += 1;
        }
    };

    hooks.progress.phase(match outcome {
        SessionOutcome::Converged => SessionPhase::Converged,
        SessionOutcome::Cancelled => SessionPhase::Cancelled,
    });

    if !collected.is_empty() {
        info!(
            "collect done target={} items={} loops={} outcome={:?}",
            label,
            collected.len(),
            loop_count,
            outcome
        );
        return Ok(CollectionReport {
            items: collected,
            outcome,
            loop_count,
            used_fallback: false,
        });
    }

    let fallback_strategies = match target {
        Target::Url(_) => &strategies.detail,
        Target::Keyword { .. } => &strategies.listing,
    };
    let recovered = match provider.query_snapshot(fallback_strategies).await {
        Ok(items) => tracker.observe(&items).new_items,
        Err(e) => {
            debug!("final extraction failed: {}", e);
            Vec::new()
        }
    };
    if !recovered.is_empty() {
        sink.append(&recovered, label)?;
    }
    info!(
        "collect done target={} items={} loops={} outcome={:?} (final extraction)",
        label,
        recovered.len(),
        loop_count,
        outcome
    );

    Ok(CollectionReport {
        items: recovered,
        outcome,
        loop_count,
        used_fallback: true,
    })
}

/// One optional "load more" click, then an unconditional scroll and the pause.
async fn advance<P>(provider: &P, settings: &CollectorSettings)
where
    P: PageSnapshotProvider + ?Sized,
{
    let clicked = match tokio::time::timeout(
        settings.load_more_timeout,
        provider.evaluate_script(LOAD_MORE_SCRIPT),
    )
    .await
    {
        Ok(Ok(value)) => value.as_bool().unwrap_or(false),
        Ok(Err(e)) => {
            debug!("load-more check failed: {}", e);
            false
        }
        Err(_) => {
            debug!("load-more click timed out");
            false
        }
    };
    if clicked {
        tokio::time::sleep(settings.scroll_interval).await;
    }

    if let Err(e) = provider.evaluate_script(SCROLL_SCRIPT).await {
        debug!("scroll failed: {}", e);
    }
    tokio::time::sleep(settings.pause()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(fast: bool) -> CollectorSettings {
        CollectorSettings {
            site_origin: "https://tousu.sina.com.cn".into(),
            search_path: "/index/search/".into(),
            scroll_interval: Duration::from_millis(100),
            fast_mode: fast,
            stagnation_threshold: 2,
            navigation_attempts: 3,
            navigation_backoff: Duration::from_millis(1),
            load_more_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn pause_scales_with_mode() {
        assert_eq!(settings(true).pause(), Duration::from_millis(80));
        assert_eq!(settings(false).pause(), Duration::from_millis(120));
    }

    #[test]
    fn target_urls_and_labels() {
        let s = settings(false);
        let kw = Target::Keyword {
            keyword: "众花".into(),
            search_type: 1,
        };
        assert!(kw.url(&s).starts_with("https://tousu.sina.com.cn/index/search/?keywords="));
        assert_eq!(kw.label(), "众花");

        let url = Target::Url(" https://tousu.sina.com.cn/company/x ".into());
        assert_eq!(url.url(&s), "https://tousu.sina.com.cn/company/x");
    }
}
