//! Cancellation tokens for cooperative job cancellation
//!
//! A job receives a token when it is submitted and checks it at each
//! suspension point (before fetching a page, before and during a paint).
//! Tokens can be linked: a child token reports cancelled as soon as any of
//! its ancestors is cancelled, which lets a document load cancel every page
//! job derived from it in one call.

use crate::JobId;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token for cooperative job cancellation
///
/// Clones share the same underlying flag. A token created with
/// [`CancellationToken::child`] additionally observes every ancestor.
///
/// # Example
///
/// ```
/// use viewer_scheduler::CancellationToken;
///
/// let document = CancellationToken::new();
/// let page = document.child();
///
/// document.cancel();
/// assert!(page.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancellationToken {
    /// Create a new root token in the non-cancelled state
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            ancestors: Vec::new(),
        }
    }

    /// Create a token that is cancelled when either it or `self` is cancelled
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.cancelled.clone());
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            ancestors,
        }
    }

    /// Cancel this token
    ///
    /// All clones and children observe the cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if this token or any of its ancestors has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self
                .ancestors
                .iter()
                .any(|flag| flag.load(Ordering::Acquire))
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Associates job ids with their cancellation tokens
///
/// The scheduler registers a token for every submitted job and drops it once
/// the job completes or is removed from the queue.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: HashMap<JobId, CancellationToken>,
}

impl CancellationRegistry {
    /// Create a new empty cancellation registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job with a token derived from `parent`
    pub fn register_child(&mut self, job_id: JobId, parent: &CancellationToken) -> CancellationToken {
        let token = parent.child();
        self.tokens.insert(job_id, token.clone());
        token
    }

    /// Cancel a job by id. Returns `true` if the job was registered.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.tokens.get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered job, returning how many there were
    pub fn cancel_all(&self) -> usize {
        for token in self.tokens.values() {
            token.cancel();
        }
        self.tokens.len()
    }

    /// Remove a job from the registry. Returns `true` if it was present.
    pub fn unregister(&mut self, job_id: JobId) -> bool {
        self.tokens.remove(&job_id).is_some()
    }

    /// Get the token registered for a job
    pub fn get(&self, job_id: JobId) -> Option<CancellationToken> {
        self.tokens.get(&job_id).cloned()
    }

    /// Drop every token without cancelling it
    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}
