use pdf_engine::PdfEngineError;

/// Failures surfaced by the viewer.
///
/// Cancellation never shows up here: a superseded load or paint is
/// discarded silently.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("no PDF source given")]
    EmptySource,
    #[error("failed to load PDF {location}: {cause}")]
    Load {
        location: String,
        #[source]
        cause: PdfEngineError,
    },
    #[error("failed to fetch page {page}: {cause}")]
    PageFetch {
        page: u32,
        #[source]
        cause: PdfEngineError,
    },
    #[error("failed to paint page {page}: {cause}")]
    Paint {
        page: u32,
        #[source]
        cause: PdfEngineError,
    },
}

impl ViewerError {
    /// 1-based page the error belongs to, if any
    pub fn page(&self) -> Option<u32> {
        match self {
            ViewerError::PageFetch { page, .. } | ViewerError::Paint { page, .. } => Some(*page),
            ViewerError::EmptySource | ViewerError::Load { .. } => None,
        }
    }
}
