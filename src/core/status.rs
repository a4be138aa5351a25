//! Job status shared between the crawl task and the status endpoint.
//!
//! The crawl task is the only writer; readers take a cloned snapshot from
//! the `watch` channel, so a status read never observes a half-written update.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tracing::info;
use uuid::Uuid;

use crate::collect::{ChallengeGate, ProgressSink, SessionHooks, SessionPhase, StopSignal};

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStatus {
    pub job_id: Option<Uuid>,
    pub running: bool,
    pub finished: bool,
    pub ok: bool,
    pub phase: Option<SessionPhase>,
    /// Keyword or URL being collected.
    pub current: String,
    pub loop_count: u32,
    /// New items seen across the whole job.
    pub collected: usize,
    pub done: usize,
    pub total: usize,
    pub challenge_pending: bool,
    pub csv: Vec<String>,
    pub json: Vec<String>,
    pub error: Option<String>,
}

pub struct JobControl {
    status: watch::Sender<JobStatus>,
    stop: AtomicBool,
    resume: Notify,
}

impl Default for JobControl {
    fn default() -> Self {
        Self::new()
    }
}

impl JobControl {
    pub fn new() -> Self {
        let (status, _) = watch::channel(JobStatus::default());
        Self {
            status,
            stop: AtomicBool::new(false),
            resume: Notify::new(),
        }
    }

    pub fn snapshot(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Start a new job unless one is running. Returns the new job id.
    pub fn try_begin(&self, total: usize) -> Option<Uuid> {
        let id = Uuid::new_v4();
        let started = self.status.send_if_modified(|s| {
            if s.running {
                return false;
            }
            *s = JobStatus {
                job_id: Some(id),
                running: true,
                total,
                ..JobStatus::default()
            };
            true
        });
        if !started {
            return None;
        }
        self.stop.store(false, Ordering::SeqCst);
        info!("job {} started total={}", id, total);
        Some(id)
    }

    pub fn update(&self, f: impl FnOnce(&mut JobStatus)) {
        self.status.send_modify(f);
    }

    /// Begin the next target of the running job.
    pub fn begin_target(&self, current: &str) {
        self.update(|s| {
            s.current = current.to_string();
            s.loop_count = 0;
            s.phase = None;
        });
    }

    pub fn record_outputs<'a>(
        &self,
        json: impl IntoIterator<Item = &'a std::path::PathBuf>,
        csv: impl IntoIterator<Item = &'a std::path::PathBuf>,
    ) {
        let json: Vec<String> = json.into_iter().map(|p| p.display().to_string()).collect();
        let csv: Vec<String> = csv.into_iter().map(|p| p.display().to_string()).collect();
        self.update(|s| {
            s.json.extend(json);
            s.csv.extend(csv);
        });
    }

    pub fn finish(&self, error: Option<String>) {
        self.update(|s| {
            s.running = false;
            s.finished = true;
            s.challenge_pending = false;
            s.ok = error.is_none();
            s.error = error;
        });
    }

    /// Ask the running job to stop at its next loop boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.resume.notify_one();
    }

    /// Release a pending challenge wait. `false` when nothing was waiting.
    pub fn resume(&self) -> bool {
        let released = self.status.send_if_modified(|s| {
            if !s.challenge_pending {
                return false;
            }
            s.challenge_pending = false;
            true
        });
        if released {
            self.resume.notify_one();
        }
        released
    }

    pub fn hooks(&self) -> SessionHooks<'_> {
        SessionHooks {
            progress: self,
            stop: self,
            gate: self,
        }
    }
}

impl ProgressSink for JobControl {
    fn report(&self, loop_count: u32, new_items: usize) {
        self.update(|s| {
            s.loop_count = loop_count;
            s.collected += new_items;
        });
    }

    fn phase(&self, phase: SessionPhase) {
        self.update(|s| s.phase = Some(phase));
    }
}

impl StopSignal for JobControl {
    fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChallengeGate for JobControl {
    async fn wait_for_resolution(&self) {
        self.update(|s| s.challenge_pending = true);
        // A stale permit from an earlier stop may wake us once; re-check.
        loop {
            let pending = self.status.borrow().challenge_pending;
            if !pending || self.is_stop_requested() {
                break;
            }
            self.resume.notified().await;
        }
        self.update(|s| s.challenge_pending = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn second_job_is_rejected_while_running() {
        let control = JobControl::new();
        assert!(control.try_begin(2).is_some());
        assert!(control.try_begin(1).is_none());
        control.finish(None);
        assert!(control.try_begin(1).is_some());
    }

    #[test]
    fn progress_reports_accumulate() {
        let control = JobControl::new();
        control.try_begin(1);
        control.report(0, 3);
        control.report(1, 2);
        let s = control.snapshot();
        assert_eq!(s.loop_count, 1);
        assert_eq!(s.collected, 5);
    }

    #[test]
    fn resume_without_pending_challenge_is_a_noop() {
        let control = JobControl::new();
        assert!(!control.resume());
    }

    #[tokio::test]
    async fn resume_releases_challenge_wait() {
        let control = Arc::new(JobControl::new());
        control.try_begin(1);
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_for_resolution().await })
        };

        let mut rx = control.subscribe();
        rx.wait_for(|s| s.challenge_pending).await.unwrap();
        assert!(control.resume());

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait released")
            .unwrap();
        assert!(!control.snapshot().challenge_pending);
    }

    #[tokio::test]
    async fn stop_releases_challenge_wait() {
        let control = Arc::new(JobControl::new());
        control.try_begin(1);
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_for_resolution().await })
        };
        let mut rx = control.subscribe();
        rx.wait_for(|s| s.challenge_pending).await.unwrap();
        control.request_stop();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait released")
            .unwrap();
        assert!(control.is_stop_requested());
    }
}
