use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::collect::Target;
use crate::core::types::{ErrorResponse, OutputFormat};
use crate::core::{AppState, JobStatus};
use crate::scraping::session_store::has_saved_login;
use crate::scraping::LoginSession;
use crate::tools::{keyword_targets, supervise_job, transform_file, CrawlJob, CrawlOverrides};

pub type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult = Result<Json<Value>, ApiError>;

fn api_error(status: StatusCode, err: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(err)))
}

/// `1`/`true`/`yes` and `0`/`false`/`no`; anything else means "not given".
fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_format(raw: Option<&str>) -> Result<OutputFormat, ApiError> {
    OutputFormat::parse_str(raw.unwrap_or_default()).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "invalid fmt, allowed values: json, csv, both",
        )
    })
}

fn parse_interval(raw: Option<&str>) -> Result<Option<Duration>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<f64>().ok().map(Duration::try_from_secs_f64) {
        Some(Ok(interval)) => Ok(Some(interval)),
        _ => Err(api_error(
            StatusCode::BAD_REQUEST,
            "interval must be a non-negative number of seconds",
        )),
    }
}

pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "complaint-scout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn has_login(State(state): State<Arc<AppState>>) -> Json<Value> {
    let path = state.config.resolve_storage_state_path();
    let has = has_saved_login(&path);
    let mut body = json!({ "ok": true, "has": has });
    if has {
        body["path"] = json!(path.display().to_string());
    }
    Json(body)
}

pub async fn open_login(State(state): State<Arc<AppState>>) -> ApiResult {
    let path = state.config.resolve_storage_state_path();
    if has_saved_login(&path) {
        return Ok(Json(
            json!({ "ok": true, "has": true, "path": path.display().to_string() }),
        ));
    }

    let mut login = state.login.lock().await;
    if login.is_none() {
        let start_url = state.config.resolve_start_url();
        let session = LoginSession::open(&start_url, &path)
            .await
            .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e.to_string()))?;
        *login = Some(session);
    }
    Ok(Json(json!({ "ok": true, "has": false })))
}

pub async fn save_login(State(state): State<Arc<AppState>>) -> ApiResult {
    let Some(session) = state.login.lock().await.take() else {
        return Err(api_error(
            StatusCode::CONFLICT,
            "no login browser is open, call /open_login first",
        ));
    };
    let path = state.config.resolve_storage_state_path();
    let cookies = session
        .save(&path)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;
    Ok(Json(json!({
        "ok": true,
        "path": path.display().to_string(),
        "cookies": cookies
    })))
}

#[derive(Debug, Deserialize)]
pub struct CrawlParams {
    pub kw: Option<String>,
    pub t: Option<u32>,
    pub headless: Option<String>,
    pub interval: Option<String>,
    pub fmt: Option<String>,
    pub fast: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CrawlUrlParams {
    pub url: Option<String>,
    pub headless: Option<String>,
    pub interval: Option<String>,
    pub fmt: Option<String>,
    pub fast: Option<String>,
}

fn start_job(
    state: &Arc<AppState>,
    targets: Vec<Target>,
    fmt: OutputFormat,
    overrides: CrawlOverrides,
) -> ApiResult {
    let job = CrawlJob::new(&state.config, targets, fmt, overrides);
    let total = job.targets.len();
    let Some(job_id) = state.control.try_begin(total) else {
        return Err(api_error(
            StatusCode::CONFLICT,
            "a crawl job is already running",
        ));
    };
    info!("crawl job {} accepted targets={}", job_id, total);
    tokio::spawn(supervise_job(job, state.control.clone()));
    Ok(Json(json!({ "ok": true, "job_id": job_id, "total": total })))
}

pub async fn crawl_keywords(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CrawlParams>,
) -> ApiResult {
    let raw = params.kw.as_deref().unwrap_or_default();
    let targets = keyword_targets(raw, params.t.unwrap_or(1));
    if targets.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "missing parameter: kw"));
    }
    let overrides = CrawlOverrides {
        headless: parse_flag(params.headless.as_deref()),
        scroll_interval: parse_interval(params.interval.as_deref())?,
        fast_mode: parse_flag(params.fast.as_deref()),
        out_dir: None,
    };
    start_job(&state, targets, parse_format(params.fmt.as_deref())?, overrides)
}

pub async fn crawl_url(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CrawlUrlParams>,
) -> ApiResult {
    let url = params.url.as_deref().map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "missing parameter: url"));
    }
    if url::Url::parse(url).is_err() {
        return Err(api_error(StatusCode::BAD_REQUEST, "url is not an absolute URL"));
    }
    let overrides = CrawlOverrides {
        headless: parse_flag(params.headless.as_deref()),
        scroll_interval: parse_interval(params.interval.as_deref())?,
        fast_mode: parse_flag(params.fast.as_deref()),
        out_dir: None,
    };
    start_job(
        &state,
        vec![Target::Url(url.to_string())],
        parse_format(params.fmt.as_deref())?,
        overrides,
    )
}

/// Body of `/progress`, shaped for the bundled control page.
pub fn progress_body(s: &JobStatus) -> Value {
    let mut body = Map::new();
    body.insert("running".into(), json!(s.running));
    body.insert("count".into(), json!(s.loop_count));
    body.insert("done".into(), json!(s.done));
    body.insert("collected".into(), json!(s.collected));
    body.insert("challenge".into(), json!(s.challenge_pending));
    if !s.current.is_empty() {
        body.insert("current".into(), json!(s.current));
    }
    if s.total > 0 {
        body.insert("total".into(), json!(s.total));
    }
    if let Some(phase) = s.phase {
        body.insert("phase".into(), json!(phase));
    }
    if s.finished {
        body.insert("ok".into(), json!(s.ok));
        if !s.csv.is_empty() {
            body.insert("csv".into(), json!(s.csv.join("\n")));
        }
        if !s.json.is_empty() {
            body.insert("json".into(), json!(s.json.join("\n")));
        }
        if let Some(err) = &s.error {
            body.insert("err".into(), json!(err));
        }
    }
    Value::Object(body)
}

pub async fn progress(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(progress_body(&state.control.snapshot()))
}

pub async fn stop(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.control.request_stop();
    info!("stop requested");
    Json(json!({ "ok": true }))
}

pub async fn resume(State(state): State<Arc<AppState>>) -> Json<Value> {
    let resumed = state.control.resume();
    if !resumed {
        warn!("resume requested with no pending challenge");
    }
    Json(json!({ "ok": true, "resumed": resumed }))
}

#[derive(Debug, Deserialize)]
pub struct TransformParams {
    pub path: Option<String>,
    pub fmt: Option<String>,
    pub out_dir: Option<String>,
}

pub async fn transform(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransformParams>,
) -> ApiResult {
    let path = params.path.as_deref().map(str::trim).unwrap_or_default();
    if path.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "missing parameter: path"));
    }
    let fmt = parse_format(params.fmt.as_deref())?;
    let path = PathBuf::from(path);
    let out_dir = params
        .out_dir
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.resolve_out_dir());
    let origin = state.config.resolve_site_origin();

    let paths = tokio::task::spawn_blocking(move || transform_file(&path, fmt, &out_dir, &origin))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("{e:#}")))?;

    let show = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
    Ok(Json(json!({
        "ok": true,
        "json": show(&paths.json),
        "csv": show(&paths.csv)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_and_formats() {
        assert_eq!(parse_flag(Some("1")), Some(true));
        assert_eq!(parse_flag(Some("0")), Some(false));
        assert_eq!(parse_flag(Some("maybe")), None);
        assert_eq!(parse_flag(None), None);
        assert_eq!(parse_format(None).unwrap(), OutputFormat::Both);
        assert!(parse_format(Some("xml")).is_err());
    }

    #[test]
    fn interval_validation() {
        assert_eq!(parse_interval(Some("0.5")).unwrap(), Some(Duration::from_millis(500)));
        assert_eq!(parse_interval(Some("")).unwrap(), None);
        assert!(parse_interval(Some("-1")).is_err());
        assert!(parse_interval(Some("abc")).is_err());
        assert!(parse_interval(Some("1e300")).is_err());
        assert!(parse_interval(Some("NaN")).is_err());
    }

    #[test]
    fn progress_body_hides_outputs_until_finished() {
        let mut s = JobStatus {
            running: true,
            current: "众花".into(),
            total: 2,
            loop_count: 4,
            csv: vec!["a.csv".into()],
            ..Default::default()
        };
        let body = progress_body(&s);
        assert_eq!(body["count"], 4);
        assert_eq!(body["current"], "众花");
        assert!(body.get("csv").is_none());
        assert!(body.get("ok").is_none());

        s.running = false;
        s.finished = true;
        s.ok = true;
        s.csv.push("b.csv".into());
        let body = progress_body(&s);
        assert_eq!(body["ok"], true);
        assert_eq!(body["csv"], "a.csv\nb.csv");
    }
}
