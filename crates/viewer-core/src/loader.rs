//! Document loading with generation-based invalidation.
//!
//! Each call to [`DocumentLoader::begin`] bumps the generation. A load that
//! finishes after a newer one started is stale: its result is dropped and
//! never becomes the current document.

use crate::error::ViewerError;
use crate::source;
use pdf_engine::{DocumentHandle, PdfEngine, PdfEngineError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the loader gets its engine from.
#[derive(Clone)]
pub enum EngineSlot {
    /// Process-wide engine, initialized on first use
    Shared,
    Custom(Arc<dyn PdfEngine>),
}

impl EngineSlot {
    pub fn acquire(&self) -> Result<Arc<dyn PdfEngine>, PdfEngineError> {
        match self {
            EngineSlot::Shared => pdf_engine::shared_engine(),
            EngineSlot::Custom(engine) => Ok(Arc::clone(engine)),
        }
    }
}

impl fmt::Debug for EngineSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineSlot::Shared => f.write_str("Shared"),
            EngineSlot::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// The currently loaded document.
///
/// Carries the generation it was loaded under, so two refs to the same
/// source loaded twice never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    handle: DocumentHandle,
    generation: u64,
    page_count: u32,
}

impl DocumentRef {
    pub fn handle(&self) -> DocumentHandle {
        self.handle
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}

/// Proof that a load was started; redeemed by [`DocumentLoader::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct DocumentLoader {
    slot: EngineSlot,
    engine: Option<Arc<dyn PdfEngine>>,
    asset_root: Option<PathBuf>,
    generation: u64,
    source: Option<String>,
    state: LoadState,
    current: Option<DocumentRef>,
}

impl DocumentLoader {
    pub fn new(slot: EngineSlot, asset_root: Option<PathBuf>) -> Self {
        Self {
            slot,
            engine: None,
            asset_root,
            generation: 0,
            source: None,
            state: LoadState::Idle,
            current: None,
        }
    }

    /// Start loading `source`, invalidating anything loaded or loading before.
    ///
    /// The previous document is closed immediately, so the page count reads
    /// 0 until the new load completes.
    pub fn begin(&mut self, source: &str) -> LoadTicket {
        self.release_current();
        self.generation += 1;
        self.source = Some(source.to_owned());
        self.state = LoadState::Loading;

        log::debug!("loading PDF {source} (generation {})", self.generation);
        LoadTicket { generation: self.generation }
    }

    /// Finish the load `ticket` was issued for.
    ///
    /// Returns `Ok(None)` for a stale ticket. Failures are logged, recorded
    /// in [`LoadState::Failed`] and returned.
    pub fn complete(&mut self, ticket: &LoadTicket) -> Result<Option<DocumentRef>, ViewerError> {
        if ticket.generation != self.generation || self.state != LoadState::Loading {
            log::debug!(
                "dropping stale load (generation {}, current {})",
                ticket.generation,
                self.generation
            );
            return Ok(None);
        }

        self.open_current().map(Some)
    }

    /// Load `source` to completion in one step.
    pub fn load(&mut self, source: &str) -> Result<DocumentRef, ViewerError> {
        self.begin(source);
        self.open_current()
    }

    /// Close the current document and forget the source.
    pub fn unload(&mut self) {
        self.release_current();
        self.generation += 1;
        self.source = None;
        self.state = LoadState::Idle;
    }

    /// Whether `document` is still the document this loader holds
    pub fn is_current(&self, document: &DocumentRef) -> bool {
        self.current.as_ref() == Some(document)
    }

    pub fn current(&self) -> Option<DocumentRef> {
        self.current
    }

    pub fn page_count(&self) -> u32 {
        self.current.map_or(0, |doc| doc.page_count)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// The engine, once the first load has acquired it
    pub fn engine(&self) -> Option<&Arc<dyn PdfEngine>> {
        self.engine.as_ref()
    }

    pub fn asset_root(&self) -> Option<&Path> {
        self.asset_root.as_deref()
    }

    fn open_current(&mut self) -> Result<DocumentRef, ViewerError> {
        let location = self.source.clone().unwrap_or_default();

        match self.open(&location) {
            Ok(document) => {
                log::info!("loaded PDF {location} with {} page(s)", document.page_count);
                self.current = Some(document);
                self.state = LoadState::Ready;
                Ok(document)
            }
            Err(err) => {
                log::error!("{err}");
                self.state = LoadState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn open(&mut self, location: &str) -> Result<DocumentRef, ViewerError> {
        let open_source = source::resolve(location, self.asset_root.as_deref())?;
        let load_error = |cause| ViewerError::Load { location: location.to_owned(), cause };

        let engine = match &self.engine {
            Some(engine) => Arc::clone(engine),
            None => {
                let engine = self.slot.acquire().map_err(load_error)?;
                self.engine = Some(Arc::clone(&engine));
                engine
            }
        };

        let handle = engine.load_document(open_source).map_err(load_error)?;
        let page_count = match engine.page_count(handle) {
            Ok(count) => count,
            Err(cause) => {
                if let Err(err) = engine.close(handle) {
                    log::warn!("failed to close document {}: {err}", handle.raw());
                }
                return Err(load_error(cause));
            }
        };

        Ok(DocumentRef { handle, generation: self.generation, page_count })
    }

    fn release_current(&mut self) {
        let (Some(document), Some(engine)) = (self.current.take(), self.engine.as_ref()) else {
            return;
        };

        if let Err(err) = engine.close(document.handle) {
            log::warn!("failed to close document {}: {err}", document.handle.raw());
        }
    }
}

impl fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("slot", &self.slot)
            .field("engine_acquired", &self.engine.is_some())
            .field("asset_root", &self.asset_root)
            .field("generation", &self.generation)
            .field("source", &self.source)
            .field("state", &self.state)
            .field("current", &self.current)
            .finish()
    }
}

impl Drop for DocumentLoader {
    fn drop(&mut self) {
        self.release_current();
    }
}
