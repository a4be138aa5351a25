//! Incremental collection: dedup/stagnation tracking and the scroll loop.
//!
//! The loop only talks to collaborators through the traits declared here,
//! so the same driver runs against a live CDP page or a scripted fake.

pub mod dedup;
pub mod provider;
pub mod session;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::RawItem;
use crate::storage::SinkError;

pub use dedup::{dedup_key, Deduplicator, Observation};
pub use provider::{PageSnapshotProvider, ProviderError, LOAD_MORE_SCRIPT, SCROLL_SCRIPT};
pub use session::{
    navigate_with_retry, run_session, CollectionReport, CollectorSettings, SessionOutcome,
    SessionPhase, StrategySet, Target,
};

/// Fatal session errors. Everything else degrades to partial output.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("navigation to {url} failed after {attempts} attempt(s): {source}")]
    Navigation {
        url: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },
    #[error("persisting collected items failed: {0}")]
    Persistence(#[from] SinkError),
}

/// Side-channel progress notifications. Fire-and-forget.
pub trait ProgressSink: Send + Sync {
    fn report(&self, loop_count: u32, new_items: usize);

    fn phase(&self, _phase: SessionPhase) {}
}

/// Polled once per loop boundary, never pushed.
pub trait StopSignal: Send + Sync {
    fn is_stop_requested(&self) -> bool;
}

/// Suspends a session while a verification challenge is on screen.
#[async_trait]
pub trait ChallengeGate: Send + Sync {
    /// Returns once something outside the session reports the challenge as
    /// resolved (or the job is being stopped).
    async fn wait_for_resolution(&self);
}

/// Durable destination for newly-seen items, appended as they arrive.
pub trait ItemSink: Send {
    fn append(&mut self, items: &[RawItem], keyword: &str) -> Result<(), SinkError>;
}

/// Collaborators a session reports to and is controlled by.
#[derive(Clone, Copy)]
pub struct SessionHooks<'a> {
    pub progress: &'a dyn ProgressSink,
    pub stop: &'a dyn StopSignal,
    pub gate: &'a dyn ChallengeGate,
}

/// Hooks for an unattended run: no progress consumer, never stopped, and a
/// challenge is logged and passed straight through.
#[derive(Debug, Default)]
pub struct Unattended;

impl ProgressSink for Unattended {
    fn report(&self, _loop_count: u32, _new_items: usize) {}
}

impl StopSignal for Unattended {
    fn is_stop_requested(&self) -> bool {
        false
    }
}

#[async_trait]
impl ChallengeGate for Unattended {
    async fn wait_for_resolution(&self) {
        tracing::warn!("challenge detected on an unattended session, continuing without a pause");
    }
}

impl Unattended {
    pub fn hooks(&self) -> SessionHooks<'_> {
        SessionHooks {
            progress: self,
            stop: self,
            gate: self,
        }
    }
}
