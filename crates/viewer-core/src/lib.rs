//! Incremental PDF viewer core.
//!
//! [`ViewerShell`] loads one document through a [`pdf_engine::PdfEngine`],
//! paints its pages into a vertical column of surfaces sized to the
//! container (or a fixed zoom), tracks which page is current from scroll
//! visibility, and drives "Page N of M" navigation. Work is queued on a
//! [`viewer_scheduler::JobScheduler`] and executed cooperatively by the host.
//!
//! ```no_run
//! use std::time::Instant;
//! use viewer_core::{ViewerConfig, ViewerShell};
//!
//! let mut shell = ViewerShell::new(ViewerConfig::default());
//! shell.resize(800);
//! shell.set_viewport_height(600.0, Instant::now());
//! shell.set_source("deed.pdf");
//! shell.settle(Instant::now());
//!
//! if let Some(indicator) = shell.indicator() {
//!     println!("{indicator}");
//! }
//! ```

mod config;
mod error;
mod layout;
mod loader;
mod page;
mod shell;
mod source;
mod visibility;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, ScalePolicy, ViewerConfig};
pub use error::ViewerError;
pub use layout::{ScrollAnimation, ScrollLayout};
pub use loader::{DocumentLoader, DocumentRef, EngineSlot, LoadState, LoadTicket};
pub use page::{PageRenderer, PageStatus, RenderKey, RenderOutcome, RenderRequest, RenderTask, TargetSize};
pub use shell::{PageIndicator, ShellState, ViewerShell, FRAME, LOADING_TEXT};
pub use source::resolve as resolve_source;
pub use visibility::VisibilityTracker;
