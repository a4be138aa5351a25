use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::collect::{
    run_session, CollectionReport, CollectorSettings, SessionHooks, StopSignal, StrategySet,
    Target,
};
use crate::complaints::{filter_invalid, transform_structured};
use crate::core::config::ScoutConfig;
use crate::core::status::JobControl;
use crate::core::types::OutputFormat;
use crate::core::url_norm::url_tag;
use crate::scraping::{BrowserPage, LaunchOptions};
use crate::storage::{save_structured, OutputPaths, StreamSink};

static KEYWORD_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,;，、\s]+").unwrap());

/// Split a keyword field on commas (ASCII or fullwidth), ASCII `;`, `、` and whitespace.
pub fn split_keywords(raw: &str) -> Vec<String> {
    KEYWORD_SPLIT_RE
        .split(raw)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Everything one crawl job needs, resolved up front.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub targets: Vec<Target>,
    pub fmt: OutputFormat,
    pub launch: LaunchOptions,
    pub settings: CollectorSettings,
    pub out_dir: PathBuf,
    pub storage_state: PathBuf,
    pub detail_marker: String,
}

/// Per-request overrides of the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CrawlOverrides {
    pub headless: Option<bool>,
    pub scroll_interval: Option<Duration>,
    pub fast_mode: Option<bool>,
    pub out_dir: Option<PathBuf>,
}

impl CrawlJob {
    pub fn new(
        config: &ScoutConfig,
        targets: Vec<Target>,
        fmt: OutputFormat,
        overrides: CrawlOverrides,
    ) -> Self {
        let settings = config.collector_settings(overrides.scroll_interval, overrides.fast_mode);
        let launch = LaunchOptions {
            headless: overrides
                .headless
                .unwrap_or_else(|| config.resolve_headless()),
            fast_mode: settings.fast_mode,
            navigation_timeout: config.resolve_navigation_timeout(),
        };
        Self {
            targets,
            fmt,
            launch,
            settings,
            out_dir: overrides
                .out_dir
                .unwrap_or_else(|| config.resolve_out_dir()),
            storage_state: config.resolve_storage_state_path(),
            detail_marker: config.resolve_detail_link_marker(),
        }
    }
}

/// Files produced for one target.
#[derive(Debug, Clone, Default)]
pub struct TargetOutput {
    pub tag: String,
    pub items: usize,
    pub raw: OutputPaths,
    pub structured: OutputPaths,
}

impl TargetOutput {
    pub fn json_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.raw.json.iter().chain(self.structured.json.iter())
    }

    pub fn csv_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.raw.csv.iter().chain(self.structured.csv.iter())
    }
}

/// Output tag: the keyword, or the first path segment / host of a URL.
pub fn target_tag(target: &Target) -> String {
    match target {
        Target::Keyword { keyword, .. } => keyword.clone(),
        Target::Url(url) => url_tag(url),
    }
}

/// Collect one target in its own browser and write its outputs.
pub async fn crawl_target(
    job: &CrawlJob,
    target: &Target,
    hooks: SessionHooks<'_>,
) -> Result<TargetOutput> {
    let tag = target_tag(target);
    let mut sink = StreamSink::create(&job.out_dir, &tag, job.fmt)
        .with_context(|| format!("opening output for {tag}"))?;

    let page =
        BrowserPage::launch(job.launch.clone(), Some(job.storage_state.as_path())).await?;
    let strategies = StrategySet::for_site(&job.settings.site_origin);
    let session = run_session(&page, target, &job.settings, &strategies, hooks, &mut sink).await;
    page.close().await;
    let report = session?;

    let raw = sink.finalize()?;
    let structured = structure_report(job, target, &report, &tag)?;
    Ok(TargetOutput {
        tag,
        items: report.items.len(),
        raw,
        structured,
    })
}

fn structure_report(
    job: &CrawlJob,
    target: &Target,
    report: &CollectionReport,
    tag: &str,
) -> Result<OutputPaths> {
    let origin = &job.settings.site_origin;
    let structured = match target {
        Target::Keyword { .. } => {
            let valid = filter_invalid(&report.items, origin, &job.detail_marker);
            info!(
                "kept {} of {} items as complaint details tag={}",
                valid.len(),
                report.items.len(),
                tag
            );
            transform_structured(&valid, origin)
        }
        Target::Url(_) => transform_structured(&report.items, origin),
    };
    Ok(save_structured(&structured, tag, job.fmt, &job.out_dir)?)
}

/// Run every target of `job` in order, publishing progress through `control`.
///
/// A stop request ends the current target (its outputs are still written)
/// and skips the remaining ones.
pub async fn run_job(job: &CrawlJob, control: &JobControl) -> Result<()> {
    for target in &job.targets {
        if control.is_stop_requested() {
            info!("stop requested, skipping remaining targets");
            break;
        }
        control.begin_target(target.label());
        let output = crawl_target(job, target, control.hooks())
            .await
            .with_context(|| format!("crawling {}", target.label()))?;
        control.record_outputs(output.json_paths(), output.csv_paths());
        control.update(|s| s.done += 1);
    }
    Ok(())
}

/// Spawn-friendly wrapper: runs the job and records the final state.
pub async fn supervise_job(job: CrawlJob, control: std::sync::Arc<JobControl>) {
    let result = run_job(&job, &control).await;
    match &result {
        Ok(()) => info!("job finished targets={}", job.targets.len()),
        Err(e) => warn!("job failed: {:#}", e),
    }
    control.finish(result.err().map(|e| format!("{e:#}")));
}

/// Resolve a keyword field into keyword targets.
pub fn keyword_targets(raw: &str, search_type: u32) -> Vec<Target> {
    split_keywords(raw)
        .into_iter()
        .map(|keyword| Target::Keyword {
            keyword,
            search_type,
        })
        .collect()
}

pub fn ensure_out_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_split_on_mixed_delimiters() {
        assert_eq!(
            split_keywords("众花, 分期乐；借呗，花呗、 美团 ;x"),
            vec!["众花", "分期乐；借呗", "花呗", "美团", "x"]
        );
        assert!(split_keywords(" , ").is_empty());
    }

    #[test]
    fn url_targets_tag_by_path() {
        assert_eq!(
            target_tag(&Target::Url("https://tousu.sina.com.cn/company/view/1".into())),
            "company"
        );
        assert_eq!(
            target_tag(&Target::Keyword {
                keyword: "众花".into(),
                search_type: 1
            }),
            "众花"
        );
    }

    #[test]
    fn overrides_win_over_config() {
        let cfg = ScoutConfig::default();
        let job = CrawlJob::new(
            &cfg,
            keyword_targets("a b", 2),
            OutputFormat::Json,
            CrawlOverrides {
                headless: Some(false),
                fast_mode: Some(true),
                out_dir: Some(PathBuf::from("/tmp/out")),
                ..Default::default()
            },
        );
        assert_eq!(job.targets.len(), 2);
        assert!(!job.launch.headless);
        assert!(job.launch.fast_mode);
        assert_eq!(job.out_dir, PathBuf::from("/tmp/out"));
    }
}
