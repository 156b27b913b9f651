//! Per-page render state.
//!
//! A [`PageRenderer`] owns one page's surface and tracks which
//! (document, page, target size) it was last asked to paint. A new request
//! for an identical key is a no-op; a request for a different key supersedes
//! the in-flight paint. Paints go to a staging surface that only replaces
//! the visible one when the engine finishes, so a cancelled or failed paint
//! leaves the last good picture in place.

use crate::error::ViewerError;
use crate::loader::DocumentRef;
use pdf_engine::{PageHandle, PdfEngine, Surface};
use viewer_scheduler::{CancellationToken, JobId};

/// How wide a page should be painted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSize {
    /// Fit to a container this many pixels wide
    Width(u32),
    /// Fixed zoom factor
    Scale(f32),
}

impl TargetSize {
    /// A zero-width container cannot be painted into yet
    pub fn is_ready(&self) -> bool {
        match *self {
            TargetSize::Width(width) => width > 0,
            TargetSize::Scale(scale) => scale.is_finite() && scale > 0.0,
        }
    }

    fn scale_for(&self, page: &PageHandle) -> f32 {
        match *self {
            TargetSize::Width(width) => width as f32 / page.viewport(1.0).width,
            TargetSize::Scale(scale) => scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderKey {
    pub document: DocumentRef,
    pub page_number: u32,
    pub target: TargetSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Blank,
    Pending,
    Painted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderRequest {
    /// Same key as the last request; nothing to do
    Unchanged,
    /// The target has no size yet
    Deferred,
    Start,
}

/// A paint in flight, tied to the scheduler job that will run it.
#[derive(Debug, Clone)]
pub struct RenderTask {
    pub job_id: JobId,
    pub key: RenderKey,
    pub token: CancellationToken,
}

#[derive(Debug)]
pub enum RenderOutcome {
    Painted { width: u32, height: u32 },
    /// Superseded or torn down; not an error
    Cancelled,
    Failed(ViewerError),
}

#[derive(Debug)]
pub struct PageRenderer {
    page_number: u32,
    surface: Surface,
    page: Option<(DocumentRef, PageHandle)>,
    requested: Option<RenderKey>,
    painted: Option<RenderKey>,
    task: Option<RenderTask>,
    status: PageStatus,
    expected_size: Option<(u32, u32)>,
    last_error: Option<String>,
}

impl PageRenderer {
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            surface: Surface::new(),
            page: None,
            requested: None,
            painted: None,
            task: None,
            status: PageStatus::Blank,
            expected_size: None,
            last_error: None,
        }
    }

    pub fn check(&self, key: &RenderKey) -> RenderRequest {
        if !key.target.is_ready() {
            RenderRequest::Deferred
        } else if self.requested.as_ref() == Some(key) {
            RenderRequest::Unchanged
        } else {
            RenderRequest::Start
        }
    }

    /// Make `task` the active paint, cancelling and returning the one it replaces.
    pub fn start(&mut self, task: RenderTask) -> Option<RenderTask> {
        let previous = self.cancel();

        self.requested = Some(task.key);
        self.status = PageStatus::Pending;
        self.task = Some(task);
        previous
    }

    /// Cancel the active paint, if any
    pub fn cancel(&mut self) -> Option<RenderTask> {
        let task = self.task.take()?;
        task.token.cancel();
        if self.status == PageStatus::Pending {
            self.status = if self.painted.is_some() { PageStatus::Painted } else { PageStatus::Blank };
        }
        Some(task)
    }

    /// Execute the paint scheduled as `job_id`.
    pub fn run(&mut self, engine: &dyn PdfEngine, job_id: JobId) -> RenderOutcome {
        let task = match &self.task {
            Some(task) if task.job_id == job_id => task.clone(),
            _ => {
                log::debug!("render job {job_id} for page {} is stale", self.page_number);
                return RenderOutcome::Cancelled;
            }
        };
        if task.token.is_cancelled() {
            return self.cancelled(&task);
        }
        let key = task.key;

        let page = match self.page_handle(engine, &key) {
            Ok(page) => page,
            Err(cause) => return self.fail(ViewerError::PageFetch { page: key.page_number, cause }),
        };

        if task.token.is_cancelled() {
            return self.cancelled(&task);
        }

        let viewport = page.viewport(key.target.scale_for(&page));
        let (width, height) = viewport.pixel_size();
        let mut staging = match Surface::with_size(width, height) {
            Ok(staging) => staging,
            Err(cause) => return self.fail(ViewerError::Paint { page: key.page_number, cause }),
        };
        self.expected_size = Some((width, height));

        let token = task.token.clone();
        let result = engine.render_into(&page, &viewport, &mut staging, &|| token.is_cancelled());

        match result {
            Ok(()) if !task.token.is_cancelled() => {
                self.surface = staging;
                self.painted = Some(key);
                self.task = None;
                self.status = PageStatus::Painted;
                self.last_error = None;
                log::trace!("painted page {} at {width}x{height}", key.page_number);
                RenderOutcome::Painted { width, height }
            }
            Ok(()) => self.cancelled(&task),
            Err(cause) if cause.is_cancelled() => self.cancelled(&task),
            Err(cause) => self.fail(ViewerError::Paint { page: key.page_number, cause }),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn status(&self) -> PageStatus {
        self.status
    }

    pub fn active_task(&self) -> Option<&RenderTask> {
        self.task.as_ref()
    }

    pub fn requested_key(&self) -> Option<&RenderKey> {
        self.requested.as_ref()
    }

    pub fn painted_key(&self) -> Option<&RenderKey> {
        self.painted.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Height the page occupies in the scroll column
    ///
    /// The painted surface when there is one, otherwise the size of the
    /// paint in progress, otherwise nothing.
    pub fn layout_height(&self) -> f32 {
        if !self.surface.is_blank() {
            self.surface.height() as f32
        } else {
            self.expected_size.map_or(0.0, |(_, height)| height as f32)
        }
    }

    fn page_handle(&mut self, engine: &dyn PdfEngine, key: &RenderKey) -> Result<PageHandle, pdf_engine::PdfEngineError> {
        if let Some((document, page)) = &self.page {
            if *document == key.document {
                return Ok(*page);
            }
        }

        let page = engine.get_page(key.document.handle(), key.page_number)?;
        self.page = Some((key.document, page));
        Ok(page)
    }

    fn cancelled(&mut self, task: &RenderTask) -> RenderOutcome {
        log::debug!("paint of page {} cancelled", self.page_number);
        if self.task.as_ref().map(|active| active.job_id) == Some(task.job_id) {
            self.cancel();
        }
        RenderOutcome::Cancelled
    }

    fn fail(&mut self, err: ViewerError) -> RenderOutcome {
        log::error!("{err}");
        self.task = None;
        self.status = PageStatus::Failed;
        self.last_error = Some(err.to_string());
        RenderOutcome::Failed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{DocumentLoader, EngineSlot};
    use crate::testing::ScriptedEngine;
    use pdf_engine::fixtures;
    use std::sync::Arc;

    struct Harness {
        engine: Arc<ScriptedEngine>,
        loader: DocumentLoader,
        document: DocumentRef,
        dir: tempfile::TempDir,
        next_job: JobId,
    }

    impl Harness {
        fn new(sizes: &[(i64, i64)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("doc.pdf");
            std::fs::write(&path, fixtures::pdf_with_pages(sizes).unwrap()).unwrap();

            let engine = Arc::new(ScriptedEngine::new());
            let mut loader = DocumentLoader::new(EngineSlot::Custom(engine.clone()), None);
            let document = loader.load(path.to_str().unwrap()).unwrap();

            Self { engine, loader, document, dir, next_job: 0 }
        }

        fn key(&self, page_number: u32, target: TargetSize) -> RenderKey {
            RenderKey { document: self.document, page_number, target }
        }

        fn task(&mut self, key: RenderKey) -> RenderTask {
            self.next_job += 1;
            RenderTask { job_id: self.next_job, key, token: CancellationToken::new() }
        }

        fn paint(&mut self, renderer: &mut PageRenderer, key: RenderKey) -> RenderOutcome {
            let task = self.task(key);
            let job_id = task.job_id;
            renderer.start(task);
            renderer.run(self.engine.as_ref(), job_id)
        }
    }

    #[test]
    fn test_fit_width_paints_container_width() {
        let mut harness = Harness::new(&[(612, 792)]);
        let mut renderer = PageRenderer::new(1);
        let key = harness.key(1, TargetSize::Width(306));

        let outcome = harness.paint(&mut renderer, key);
        assert!(matches!(outcome, RenderOutcome::Painted { width: 306, height: 396 }));
        assert_eq!(renderer.surface().dimensions(), (306, 396));
        assert_eq!(renderer.status(), PageStatus::Painted);
        assert_eq!(renderer.layout_height(), 396.0);
    }

    #[test]
    fn test_fixed_scale_ignores_container() {
        let mut harness = Harness::new(&[(200, 100)]);
        let mut renderer = PageRenderer::new(1);

        harness.paint(&mut renderer, harness.key(1, TargetSize::Scale(1.5)));
        assert_eq!(renderer.surface().dimensions(), (300, 150));
    }

    #[test]
    fn test_same_key_is_unchanged_and_deterministic() {
        let mut harness = Harness::new(&[(612, 792)]);
        let key = harness.key(1, TargetSize::Width(500));

        let mut first = PageRenderer::new(1);
        harness.paint(&mut first, key);
        assert_eq!(first.check(&key), RenderRequest::Unchanged);

        let mut second = PageRenderer::new(1);
        harness.paint(&mut second, key);
        assert_eq!(first.surface(), second.surface());
        assert_eq!(harness.engine.renders(), 2);
    }

    #[test]
    fn test_zero_width_is_deferred() {
        let harness = Harness::new(&[(612, 792)]);
        let renderer = PageRenderer::new(1);

        assert_eq!(renderer.check(&harness.key(1, TargetSize::Width(0))), RenderRequest::Deferred);
        assert_eq!(renderer.check(&harness.key(1, TargetSize::Width(10))), RenderRequest::Start);
    }

    #[test]
    fn test_superseded_job_does_not_paint() {
        let mut harness = Harness::new(&[(612, 792)]);
        let mut renderer = PageRenderer::new(1);

        let narrow = harness.task(harness.key(1, TargetSize::Width(300)));
        let narrow_id = narrow.job_id;
        let narrow_token = narrow.token.clone();
        renderer.start(narrow);

        let wide = harness.task(harness.key(1, TargetSize::Width(600)));
        let wide_id = wide.job_id;
        let replaced = renderer.start(wide).expect("narrow paint was in flight");
        assert_eq!(replaced.job_id, narrow_id);
        assert!(narrow_token.is_cancelled());

        assert!(matches!(renderer.run(harness.engine.as_ref(), narrow_id), RenderOutcome::Cancelled));
        assert!(renderer.surface().is_blank());

        assert!(matches!(
            renderer.run(harness.engine.as_ref(), wide_id),
            RenderOutcome::Painted { width: 600, .. }
        ));
        assert_eq!(harness.engine.renders(), 1);
    }

    #[test]
    fn test_cancelled_token_keeps_previous_surface() {
        let mut harness = Harness::new(&[(612, 792)]);
        let mut renderer = PageRenderer::new(1);
        harness.paint(&mut renderer, harness.key(1, TargetSize::Width(300)));
        let before = renderer.surface().clone();

        let task = harness.task(harness.key(1, TargetSize::Width(600)));
        let job_id = task.job_id;
        task.token.cancel();
        renderer.start(task);

        assert!(matches!(renderer.run(harness.engine.as_ref(), job_id), RenderOutcome::Cancelled));
        assert_eq!(renderer.surface(), &before);
        assert_eq!(renderer.status(), PageStatus::Painted);
        assert!(renderer.active_task().is_none());
    }

    #[test]
    fn test_page_beyond_document_fails_cleanly() {
        let mut harness = Harness::new(&[(612, 792), (612, 792)]);
        let mut renderer = PageRenderer::new(3);

        let outcome = harness.paint(&mut renderer, harness.key(3, TargetSize::Width(400)));
        match outcome {
            RenderOutcome::Failed(err) => {
                assert!(matches!(err, ViewerError::PageFetch { page: 3, .. }));
                assert_eq!(err.page(), Some(3));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(renderer.surface().is_blank());
        assert_eq!(renderer.status(), PageStatus::Failed);
        assert!(renderer.last_error().unwrap().contains("page 3"));
    }

    #[test]
    fn test_paint_failure_keeps_last_good_surface() {
        let mut harness = Harness::new(&[(612, 792)]);
        let mut renderer = PageRenderer::new(1);
        harness.paint(&mut renderer, harness.key(1, TargetSize::Width(300)));

        harness.engine.fail_paint_of(1);
        let outcome = harness.paint(&mut renderer, harness.key(1, TargetSize::Width(600)));

        assert!(matches!(outcome, RenderOutcome::Failed(ViewerError::Paint { page: 1, .. })));
        assert_eq!(renderer.surface().width(), 300);
        assert_eq!(renderer.painted_key().unwrap().target, TargetSize::Width(300));
    }

    #[test]
    fn test_oversized_target_fails_without_allocating() {
        let mut harness = Harness::new(&[(612, 792)]);
        let mut renderer = PageRenderer::new(1);
        harness.paint(&mut renderer, harness.key(1, TargetSize::Width(300)));

        let outcome = harness.paint(&mut renderer, harness.key(1, TargetSize::Width(u32::MAX)));

        match outcome {
            RenderOutcome::Failed(ViewerError::Paint { page: 1, cause }) => {
                assert!(matches!(cause, pdf_engine::PdfEngineError::SurfaceTooLarge { .. }));
            }
            other => panic!("expected paint failure, got {other:?}"),
        }
        assert_eq!(renderer.status(), PageStatus::Failed);
        assert_eq!(renderer.surface().width(), 300);
        assert_eq!(renderer.layout_height(), renderer.surface().height() as f32);
        assert_eq!(harness.engine.renders(), 1);
    }

    #[test]
    fn test_new_document_refetches_page() {
        let mut harness = Harness::new(&[(612, 792)]);
        let mut renderer = PageRenderer::new(1);
        harness.paint(&mut renderer, harness.key(1, TargetSize::Scale(1.0)));
        assert_eq!(renderer.surface().dimensions(), (612, 792));

        let path = harness.dir.path().join("landscape.pdf");
        std::fs::write(&path, fixtures::pdf_with_pages(&[(792, 612)]).unwrap()).unwrap();
        let landscape = harness.loader.load(path.to_str().unwrap()).unwrap();

        let key = RenderKey { document: landscape, page_number: 1, target: TargetSize::Scale(1.0) };
        harness.paint(&mut renderer, key);
        assert_eq!(renderer.surface().dimensions(), (792, 612));
    }

    #[test]
    fn test_closed_document_fails_paint() {
        let mut harness = Harness::new(&[(612, 792)]);
        let mut renderer = PageRenderer::new(1);
        harness.paint(&mut renderer, harness.key(1, TargetSize::Width(300)));

        let closed = harness.document;
        harness.loader.unload();
        let outcome = harness.paint(
            &mut renderer,
            RenderKey { document: closed, page_number: 1, target: TargetSize::Width(200) },
        );

        assert!(matches!(outcome, RenderOutcome::Failed(ViewerError::Paint { .. })));
        assert_eq!(renderer.surface().width(), 300);
    }
}
