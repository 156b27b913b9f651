//! Viewer Scheduler Library
//!
//! Cooperative job queue for the PDF viewer's event loop.
//!
//! Document loads and page paints are submitted as jobs, popped in priority
//! order (document loads, then visible pages, then pages near the current
//! one, then the rest) and executed one at a time by the viewer. Every job
//! carries a cancellation token that the executing code checks at its
//! suspension points.
//!
//! # Example
//!
//! ```
//! use viewer_scheduler::{CancellationToken, JobPriority, JobScheduler, JobType};
//!
//! let mut scheduler = JobScheduler::new();
//! let document = CancellationToken::new();
//!
//! let (_, page_token) = scheduler.submit_child(
//!     JobPriority::Visible,
//!     JobType::RenderPage { generation: 1, page_number: 1 },
//!     &document,
//! );
//!
//! // Switching documents invalidates every page job at once
//! document.cancel();
//! assert!(page_token.is_cancelled());
//! ```

mod cancel;
mod priority;
mod scheduler;
mod viewport;

pub use cancel::{CancellationRegistry, CancellationToken};
pub use priority::{Job, JobId, JobPriority, JobType, PriorityQueue};
pub use scheduler::{JobScheduler, SchedulerStats};
pub use viewport::PriorityCalculator;
