//! Priority-based job queue
//!
//! Jobs are popped highest priority first, FIFO within a priority level.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Job priority levels
///
/// Higher numeric values have higher priority and are executed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    /// Pages far from the current page
    Background = 0,

    /// Pages within the adjacent radius of the current page
    Adjacent = 1,

    /// Pages that currently intersect the container
    Visible = 2,

    /// Document loads, which every page job depends on
    Document = 3,
}

/// Unique job identifier
pub type JobId = u64;

/// Work the viewer schedules on its event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobType {
    /// Load the document selected for `generation`
    LoadDocument { generation: u64 },

    /// Fetch (if needed) and paint one page of the `generation` document
    RenderPage { generation: u64, page_number: u32 },
}

impl JobType {
    /// Document generation the job belongs to
    pub fn generation(&self) -> u64 {
        match self {
            JobType::LoadDocument { generation } => *generation,
            JobType::RenderPage { generation, .. } => *generation,
        }
    }
}

/// A scheduled job with priority
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,

    /// Job priority level
    pub priority: JobPriority,

    /// Job type and parameters
    pub job_type: JobType,

    /// Insertion order (used for FIFO within same priority)
    insertion_order: u64,
}

impl Job {
    pub fn new(id: JobId, priority: JobPriority, job_type: JobType, insertion_order: u64) -> Self {
        Self {
            id,
            priority,
            job_type,
            insertion_order,
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so earlier insertions must compare greater
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

/// Priority queue for jobs
///
/// Owned by a single event loop; no internal locking.
#[derive(Debug)]
pub struct PriorityQueue {
    heap: BinaryHeap<Job>,
    next_job_id: JobId,
    insertion_counter: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_job_id: 1,
            insertion_counter: 0,
        }
    }

    /// Push a job onto the queue, returning its newly assigned id
    pub fn push(&mut self, priority: JobPriority, job_type: JobType) -> JobId {
        let job_id = self.next_job_id;
        self.next_job_id += 1;

        let insertion_order = self.insertion_counter;
        self.insertion_counter += 1;

        self.heap
            .push(Job::new(job_id, priority, job_type, insertion_order));

        job_id
    }

    /// Pop the highest priority job
    pub fn pop(&mut self) -> Option<Job> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Remove all jobs matching a predicate, returning them
    pub fn remove_if<F>(&mut self, predicate: F) -> Vec<Job>
    where
        F: Fn(&Job) -> bool,
    {
        let (removed, remaining): (Vec<Job>, Vec<Job>) =
            std::mem::take(&mut self.heap).into_iter().partition(|job| predicate(job));
        self.heap = remaining.into_iter().collect();
        removed
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
