//! Engine wrapper for unit tests: counts calls and injects failures.

use pdf_engine::{
    DocumentHandle, LopdfEngine, OpenSource, PageHandle, PageViewport, PdfEngine, PdfEngineError,
    Surface,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct ScriptedEngine {
    inner: LopdfEngine,
    loads: AtomicUsize,
    renders: AtomicUsize,
    fail_loads: AtomicBool,
    fail_page_counts: AtomicBool,
    failing_paints: Mutex<HashSet<u32>>,
    closed: Mutex<Vec<DocumentHandle>>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_page_counts(&self, fail: bool) {
        self.fail_page_counts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_paint_of(&self, page_number: u32) {
        self.failing_paints.lock().unwrap().insert(page_number);
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Paints that ran to completion
    pub(crate) fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> Vec<DocumentHandle> {
        self.closed.lock().unwrap().clone()
    }
}

impl PdfEngine for ScriptedEngine {
    fn load_document(&self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PdfEngineError::Backend("scripted load failure".to_owned()));
        }
        self.inner.load_document(source)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        if self.fail_page_counts.load(Ordering::SeqCst) {
            return Err(PdfEngineError::Backend("scripted page count failure".to_owned()));
        }
        self.inner.page_count(handle)
    }

    fn get_page(&self, handle: DocumentHandle, page_number: u32) -> Result<PageHandle, PdfEngineError> {
        self.inner.get_page(handle, page_number)
    }

    fn render_into(
        &self,
        page: &PageHandle,
        viewport: &PageViewport,
        surface: &mut Surface,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<(), PdfEngineError> {
        if self.failing_paints.lock().unwrap().contains(&page.page_number()) {
            return Err(PdfEngineError::Backend("scripted paint failure".to_owned()));
        }
        self.inner.render_into(page, viewport, surface, is_cancelled)?;
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.closed.lock().unwrap().push(handle);
        self.inner.close(handle)
    }
}
