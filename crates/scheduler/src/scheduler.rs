//! Job scheduler implementation
//!
//! Manages job submission, priority ordering, cancellation and statistics
//! for a single cooperative event loop.

use crate::cancel::{CancellationRegistry, CancellationToken};
use crate::priority::{Job, JobId, JobPriority, JobType, PriorityQueue};

/// Job scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total jobs submitted
    pub jobs_submitted: u64,

    /// Total jobs completed
    pub jobs_completed: u64,

    /// Total jobs cancelled (removed from the queue or discarded when popped)
    pub jobs_cancelled: u64,

    /// Current queue size
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Number of jobs neither completed nor cancelled
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted - self.jobs_completed - self.jobs_cancelled
    }
}

/// Job scheduler with priority queue
///
/// Jobs are executed in priority order by whoever drives the event loop.
/// Each job has a cancellation token; cancelling a queued job removes it,
/// and a popped job whose token has since been cancelled should be handed
/// back through [`JobScheduler::discard_job`] instead of being executed.
///
/// # Example
///
/// ```
/// use viewer_scheduler::{CancellationToken, JobPriority, JobScheduler, JobType};
///
/// let mut scheduler = JobScheduler::new();
/// let document = CancellationToken::new();
/// let (job_id, token) =
///     scheduler.submit_child(JobPriority::Document, JobType::LoadDocument { generation: 1 }, &document);
///
/// if let Some(job) = scheduler.next_job() {
///     assert_eq!(job.id, job_id);
///     assert!(!token.is_cancelled());
///     scheduler.complete_job(job.id);
/// }
/// ```
#[derive(Debug, Default)]
pub struct JobScheduler {
    queue: PriorityQueue,
    stats: SchedulerStats,
    cancellation: CancellationRegistry,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a job whose token is a child of `parent`
    pub fn submit_child(
        &mut self,
        priority: JobPriority,
        job_type: JobType,
        parent: &CancellationToken,
    ) -> (JobId, CancellationToken) {
        let job_id = self.queue.push(priority, job_type);
        let token = self.cancellation.register_child(job_id, parent);
        self.stats.jobs_submitted += 1;
        (job_id, token)
    }

    /// Pop the highest priority job
    ///
    /// Its token stays registered until `complete_job` or `discard_job`.
    pub fn next_job(&mut self) -> Option<Job> {
        self.queue.pop()
    }

    /// Mark a popped job as completed
    pub fn complete_job(&mut self, job_id: JobId) {
        self.stats.jobs_completed += 1;
        self.cancellation.unregister(job_id);
    }

    /// Mark a popped job as cancelled without running it
    pub fn discard_job(&mut self, job_id: JobId) {
        self.stats.jobs_cancelled += 1;
        self.cancellation.unregister(job_id);
    }

    /// Cancel a specific job by id
    ///
    /// The token is cancelled whether the job is queued or already popped;
    /// a queued job is also removed. Returns `true` if the job was known.
    pub fn cancel_job(&mut self, job_id: JobId) -> bool {
        let token_cancelled = self.cancellation.cancel(job_id);
        let removed = self.queue.remove_if(|job| job.id == job_id);

        if removed.is_empty() {
            token_cancelled
        } else {
            self.stats.jobs_cancelled += removed.len() as u64;
            self.cancellation.unregister(job_id);
            true
        }
    }

    /// Cancel and remove every queued job that does not belong to `generation`
    ///
    /// Returns how many jobs were dropped.
    pub fn cancel_stale_generations(&mut self, generation: u64) -> usize {
        self.cancel_jobs_if(|job| job.job_type.generation() != generation)
    }

    fn cancel_jobs_if<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Job) -> bool,
    {
        let removed = self.queue.remove_if(predicate);

        for job in &removed {
            self.cancellation.cancel(job.id);
            self.cancellation.unregister(job.id);
        }
        self.stats.jobs_cancelled += removed.len() as u64;

        removed.len()
    }

    pub fn has_pending_jobs(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Cancel every registered token and drop all queued jobs
    pub fn clear(&mut self) {
        let queued = self.queue.len();

        self.cancellation.cancel_all();
        self.queue.clear();
        self.cancellation.clear();

        self.stats.jobs_cancelled += queued as u64;
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queue_size: self.queue.len(),
            ..self.stats.clone()
        }
    }

    pub fn get_cancellation_token(&self, job_id: JobId) -> Option<CancellationToken> {
        self.cancellation.get(job_id)
    }
}
