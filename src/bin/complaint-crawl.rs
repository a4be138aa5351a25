//! One-shot crawl from the terminal. A verification challenge pauses the
//! run until Enter is pressed; Ctrl-C stops after the current loop.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use complaint_scout::collect::Target;
use complaint_scout::core::config::{load_from_path, load_scout_config, ScoutConfig};
use complaint_scout::core::logging::init_tracing;
use complaint_scout::core::JobControl;
use complaint_scout::scraping::LoginSession;
use complaint_scout::tools::crawl::ensure_out_dir;
use complaint_scout::tools::{keyword_targets, run_job, CrawlJob, CrawlOverrides};
use complaint_scout::OutputFormat;

#[derive(Default)]
struct Args {
    config: Option<PathBuf>,
    keyword: Option<String>,
    url: Option<String>,
    search_type: u32,
    format: Option<String>,
    headless: Option<bool>,
    fast: Option<bool>,
    scroll_interval: Option<Duration>,
    out_dir: Option<PathBuf>,
    login: bool,
}

fn usage() -> ! {
    eprintln!(
        "Usage: complaint-crawl [--keyword <kw,...> | --url <url>] [--t <n>] [--format json|csv|both]\n\
         \x20                      [--headless] [--fast] [--scroll-interval <secs>] [--out-dir <dir>]\n\
         \x20                      [--config <file>] [--login]\n\n\
         Without --keyword or --url the configured keywords are crawled.\n\
         --login opens a visible browser and saves the login cookies on Enter."
    );
    std::process::exit(2);
}

fn parse_args() -> Args {
    let mut out = Args {
        search_type: 1,
        ..Args::default()
    };

    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        let (name, inline) = match a.split_once('=') {
            Some((n, v)) => (n.to_string(), Some(v.to_string())),
            None => (a.clone(), None),
        };
        let mut value = || inline.clone().or_else(|| args.next()).unwrap_or_else(|| usage());
        match name.as_str() {
            "--config" => out.config = Some(PathBuf::from(value())),
            "--keyword" => out.keyword = Some(value()),
            "--url" => out.url = Some(value()),
            "--t" => out.search_type = value().parse().unwrap_or_else(|_| usage()),
            "--format" => out.format = Some(value()),
            "--headless" => out.headless = Some(true),
            "--headed" => out.headless = Some(false),
            "--fast" => out.fast = Some(true),
            "--scroll-interval" => {
                out.scroll_interval =
                    Some(parse_scroll_interval(&value()).unwrap_or_else(|| usage()));
            }
            "--out-dir" => out.out_dir = Some(PathBuf::from(value())),
            "--login" => out.login = true,
            "-h" | "--help" => usage(),
            other => {
                eprintln!("unknown argument: {other}");
                usage();
            }
        }
    }
    out
}

/// Seconds as a non-negative float that fits a `Duration`.
fn parse_scroll_interval(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

fn resolve_targets(args: &Args, config: &ScoutConfig) -> Vec<Target> {
    if let Some(url) = args.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return vec![Target::Url(url.to_string())];
    }
    match args.keyword.as_deref() {
        Some(kw) => keyword_targets(kw, args.search_type),
        None => keyword_targets(&config.keywords.join(","), args.search_type),
    }
}

/// Enter presses, read on a plain thread so runtime shutdown never waits on stdin.
fn spawn_enter_reader() -> mpsc::UnboundedReceiver<()> {
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
}

fn spawn_line_reader<R: BufRead + Send + 'static>(mut input: R) -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        loop {
            line.clear();
            match input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

async fn capture_login(config: &ScoutConfig) -> Result<()> {
    let storage_state = config.resolve_storage_state_path();
    let session = LoginSession::open(&config.resolve_start_url(), &storage_state).await?;
    eprintln!("Log in in the browser window, then press Enter here to save the session.");
    if spawn_enter_reader().recv().await.is_none() {
        warn!("stdin closed, saving the session now");
    }
    let cookies = session.save(&storage_state).await?;
    println!("{} ({} cookies)", storage_state.display(), cookies);
    Ok(())
}

/// Release challenge pauses from the terminal until the job finishes.
async fn prompt_on_challenge(control: Arc<JobControl>, mut enter: mpsc::UnboundedReceiver<()>) {
    let mut rx = control.subscribe();
    loop {
        let finished = match rx
            .wait_for(|s| s.challenge_pending || s.finished)
            .await
        {
            Ok(s) => s.finished,
            Err(_) => break,
        };
        if finished {
            break;
        }
        // presses from before the challenge do not count
        while enter.try_recv().is_ok() {}
        eprintln!("Verification challenge on screen. Solve it in the browser, then press Enter.");
        if enter.recv().await.is_none() {
            break;
        }
        control.resume();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    let config = match &args.config {
        Some(path) => match load_from_path(path) {
            Some(cfg) => cfg,
            None => bail!("config file not found: {}", path.display()),
        },
        None => load_scout_config(),
    };
    init_tracing(Some(config.resolve_log_path().as_path()))?;

    if args.login {
        return capture_login(&config).await;
    }

    let targets = resolve_targets(&args, &config);
    if targets.is_empty() {
        eprintln!("nothing to crawl: pass --keyword or --url, or configure keywords");
        usage();
    }
    let fmt = match OutputFormat::parse_str(args.format.as_deref().unwrap_or_default()) {
        Some(fmt) => fmt,
        None => bail!("invalid --format, allowed values: json, csv, both"),
    };
    if !config.resolve_storage_state_path().is_file() {
        warn!("no saved login found, run with --login first if the site asks for one");
    }

    let overrides = CrawlOverrides {
        headless: args.headless,
        scroll_interval: args.scroll_interval,
        fast_mode: args.fast,
        out_dir: args.out_dir.clone(),
    };
    let job = CrawlJob::new(&config, targets, fmt, overrides);
    ensure_out_dir(&job.out_dir)?;

    let control = Arc::new(JobControl::new());
    control
        .try_begin(job.targets.len())
        .context("job control already running")?;

    let stopper = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current loop");
            stopper.request_stop();
        }
    });
    let prompt = tokio::spawn(prompt_on_challenge(control.clone(), spawn_enter_reader()));

    let result = run_job(&job, &control).await;
    control.finish(result.as_ref().err().map(|e| format!("{e:#}")));
    prompt.abort();
    result?;

    let status = control.snapshot();
    for path in status.json.iter().chain(status.csv.iter()) {
        println!("{path}");
    }
    Ok(())
}
