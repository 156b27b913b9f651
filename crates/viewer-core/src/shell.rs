//! The viewer shell: one document, a column of pages, navigation.
//!
//! The shell owns a [`JobScheduler`] and never blocks. Setting a source,
//! resizing or scrolling only queues work; the host drives it by calling
//! [`ViewerShell::run_pending`] (or [`ViewerShell::run_until_idle`]) and
//! [`ViewerShell::tick`] from its event loop, passing the current time.
//!
//! Every job belongs to a document generation. Switching documents cancels
//! the generation's token, which cancels every page job under it, so nothing
//! from the old document can paint or change the page count afterwards.

use crate::config::{ScalePolicy, ViewerConfig};
use crate::layout::{ScrollAnimation, ScrollLayout};
use crate::loader::{DocumentLoader, DocumentRef, EngineSlot, LoadState, LoadTicket};
use crate::page::{PageRenderer, RenderKey, RenderOutcome, RenderRequest, RenderTask, TargetSize};
use crate::visibility::VisibilityTracker;
use pdf_engine::PdfEngine;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewer_scheduler::{
    CancellationToken, JobId, JobPriority, JobScheduler, JobType, PriorityCalculator, SchedulerStats,
};

/// Text shown in place of the pages while a document loads
pub const LOADING_TEXT: &str = "Loading PDF...";

/// One animation frame at 60 Hz
pub const FRAME: Duration = Duration::from_millis(16);

const MAX_SETTLE_FRAMES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellState {
    Idle,
    Loading,
    Ready,
    Failed { message: String },
}

/// "Page N of M"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIndicator {
    pub current: u32,
    pub total: u32,
}

impl fmt::Display for PageIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {} of {}", self.current, self.total)
    }
}

pub struct ViewerShell {
    config: ViewerConfig,
    loader: DocumentLoader,
    scheduler: JobScheduler,
    document_token: CancellationToken,
    pending_load: Option<(JobId, LoadTicket)>,
    pages: Vec<PageRenderer>,
    tracker: VisibilityTracker,
    layout: ScrollLayout,
    container_width: u32,
    animation: Option<ScrollAnimation>,
    nav_target: Option<u32>,
}

impl ViewerShell {
    /// A shell on the process-wide engine
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_slot(config, EngineSlot::Shared)
    }

    pub fn with_engine(config: ViewerConfig, engine: Arc<dyn PdfEngine>) -> Self {
        Self::with_slot(config, EngineSlot::Custom(engine))
    }

    fn with_slot(config: ViewerConfig, slot: EngineSlot) -> Self {
        let loader = DocumentLoader::new(slot, config.asset_root.clone());
        let tracker = VisibilityTracker::new(config.thresholds.clone(), config.debounce());
        let layout = ScrollLayout { page_spacing_px: config.page_spacing_px, ..ScrollLayout::default() };

        Self {
            config,
            loader,
            scheduler: JobScheduler::new(),
            document_token: CancellationToken::new(),
            pending_load: None,
            pages: Vec::new(),
            tracker,
            layout,
            container_width: 0,
            animation: None,
            nav_target: None,
        }
    }

    /// Show `source`, replacing whatever was shown before.
    ///
    /// Setting the source that is already shown does nothing.
    pub fn set_source(&mut self, source: &str) {
        if self.loader.source() == Some(source) {
            return;
        }

        self.teardown_document();
        let ticket = self.loader.begin(source);
        self.drop_stale_jobs();
        self.document_token = CancellationToken::new();

        let (job_id, _) = self.scheduler.submit_child(
            JobPriority::Document,
            JobType::LoadDocument { generation: ticket.generation() },
            &self.document_token,
        );
        self.pending_load = Some((job_id, ticket));
    }

    /// Tear down the current document and go idle.
    pub fn close(&mut self) {
        self.teardown_document();
        self.loader.unload();
        self.drop_stale_jobs();
    }

    /// The container's content-box width changed.
    pub fn resize(&mut self, width_px: u32) {
        if width_px == self.container_width {
            return;
        }
        log::trace!("container width {} -> {width_px}", self.container_width);
        self.container_width = width_px;

        if self.config.scale == ScalePolicy::FitWidth {
            self.schedule_all_paints();
        }
    }

    pub fn set_viewport_height(&mut self, height_px: f32, now: Instant) {
        self.layout.viewport_height_px = height_px.max(0.0);
        self.layout.scroll_offset_px = self.layout.clamp_offset(self.layout.scroll_offset_px);
        self.refresh_visibility(now);
    }

    /// User scroll to an absolute offset; interrupts any smooth scroll.
    pub fn scroll_to(&mut self, offset_px: f32, now: Instant) {
        self.animation = None;
        self.nav_target = None;
        self.layout.scroll_offset_px = self.layout.clamp_offset(offset_px);
        self.refresh_visibility(now);
    }

    pub fn scroll_by(&mut self, delta_px: f32, now: Instant) {
        self.scroll_to(self.layout.scroll_offset_px + delta_px, now);
    }

    /// Smooth-scroll so `page_number` starts at the top of the viewport.
    ///
    /// Near the end of the document the scroll stops at the bottom of the
    /// content; the page still becomes current if it ends up fully visible.
    pub fn go_to_page(&mut self, page_number: u32, now: Instant) -> bool {
        if page_number == 0 || page_number > self.page_count() {
            return false;
        }

        let target = self.layout.scroll_target(page_number);
        log::debug!("scrolling to page {page_number} (offset {target})");
        self.animation = Some(ScrollAnimation::new(
            self.layout.scroll_offset_px,
            target,
            now,
            self.config.scroll_duration(),
        ));
        self.nav_target = Some(page_number);
        self.tick(now);
        true
    }

    pub fn go_previous(&mut self, now: Instant) -> bool {
        self.can_go_previous() && self.go_to_page(self.current_page() - 1, now)
    }

    pub fn go_next(&mut self, now: Instant) -> bool {
        self.can_go_next() && self.go_to_page(self.current_page() + 1, now)
    }

    pub fn can_go_previous(&self) -> bool {
        self.navigation_enabled() && self.current_page() > 1
    }

    pub fn can_go_next(&self) -> bool {
        self.navigation_enabled() && self.current_page() < self.page_count()
    }

    pub fn indicator(&self) -> Option<PageIndicator> {
        self.navigation_enabled()
            .then(|| PageIndicator { current: self.current_page(), total: self.page_count() })
    }

    /// Advance smooth scrolling and settle the current page.
    ///
    /// Returns the new current page when it changed.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        if let Some(animation) = self.animation {
            self.layout.scroll_offset_px = self.layout.clamp_offset(animation.offset_at(now));
            if animation.is_finished(now) {
                self.animation = None;
            }
            self.refresh_visibility(now);

            if self.animation.is_none() {
                if let Some(page_number) = self.nav_target.take() {
                    if self.layout.is_fully_visible(page_number) {
                        return self.tracker.settle_on(page_number);
                    }
                }
            }
        }

        self.tracker.poll(now)
    }

    /// Execute up to `max_jobs` queued jobs; returns how many were taken off the queue.
    pub fn run_pending(&mut self, max_jobs: usize, now: Instant) -> usize {
        let mut taken = 0;
        while taken < max_jobs && self.run_next(now) {
            taken += 1;
        }
        taken
    }

    pub fn run_until_idle(&mut self, now: Instant) -> usize {
        self.run_pending(usize::MAX, now)
    }

    /// Run jobs and animation frames from `start` until nothing is left to do.
    ///
    /// Returns the time of the last frame.
    pub fn settle(&mut self, start: Instant) -> Instant {
        let mut now = start;
        for _ in 0..MAX_SETTLE_FRAMES {
            self.run_until_idle(now);
            self.tick(now);
            if !self.has_pending_work() {
                break;
            }
            now += FRAME;
        }
        now
    }

    pub fn has_pending_work(&self) -> bool {
        self.scheduler.has_pending_jobs()
            || self.animation.is_some()
            || self.tracker.pending_deadline().is_some()
    }

    pub fn state(&self) -> ShellState {
        match self.loader.state() {
            LoadState::Idle => ShellState::Idle,
            LoadState::Loading => ShellState::Loading,
            LoadState::Ready => ShellState::Ready,
            LoadState::Failed(message) => ShellState::Failed { message: message.clone() },
        }
    }

    /// Text to show instead of pages, if any
    pub fn status_text(&self) -> Option<String> {
        match self.loader.state() {
            LoadState::Loading => Some(LOADING_TEXT.to_owned()),
            LoadState::Failed(message) => Some(message.clone()),
            LoadState::Idle | LoadState::Ready => None,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.tracker.current()
    }

    pub fn page_count(&self) -> u32 {
        self.loader.page_count()
    }

    pub fn document(&self) -> Option<DocumentRef> {
        self.loader.current()
    }

    pub fn source(&self) -> Option<&str> {
        self.loader.source()
    }

    pub fn pages(&self) -> &[PageRenderer] {
        &self.pages
    }

    pub fn page(&self, page_number: u32) -> Option<&PageRenderer> {
        self.pages.get(page_number.checked_sub(1)? as usize)
    }

    pub fn layout(&self) -> &ScrollLayout {
        &self.layout
    }

    pub fn scroll_offset(&self) -> f32 {
        self.layout.scroll_offset_px
    }

    pub fn is_scrolling(&self) -> bool {
        self.animation.is_some()
    }

    pub fn container_width(&self) -> u32 {
        self.container_width
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    fn navigation_enabled(&self) -> bool {
        self.config.show_navigation && self.loader.state() == &LoadState::Ready && self.page_count() > 0
    }

    fn run_next(&mut self, now: Instant) -> bool {
        let Some(job) = self.scheduler.next_job() else {
            return false;
        };

        let cancelled = self
            .scheduler
            .get_cancellation_token(job.id)
            .map_or(true, |token| token.is_cancelled());
        if cancelled {
            log::trace!("discarding cancelled job {} ({:?})", job.id, job.job_type);
            self.scheduler.discard_job(job.id);
            return true;
        }

        match job.job_type {
            JobType::LoadDocument { .. } => self.execute_load(job.id, now),
            JobType::RenderPage { page_number, .. } => self.execute_render(job.id, page_number, now),
        }
        self.scheduler.complete_job(job.id);
        true
    }

    fn execute_load(&mut self, job_id: JobId, now: Instant) {
        let ticket = match self.pending_load.take() {
            Some((pending_id, ticket)) if pending_id == job_id => ticket,
            other => {
                self.pending_load = other;
                return;
            }
        };

        // failures are logged and recorded by the loader
        if let Ok(Some(document)) = self.loader.complete(&ticket) {
            self.on_document_ready(document, now);
        }
    }

    fn on_document_ready(&mut self, document: DocumentRef, now: Instant) {
        let page_count = document.page_count();

        self.pages = (1..=page_count).map(PageRenderer::new).collect();
        self.layout.page_heights_px = vec![0.0; page_count as usize];
        self.layout.scroll_offset_px = 0.0;
        self.tracker.observe(1..=page_count);

        self.schedule_all_paints();
        self.refresh_visibility(now);
    }

    fn execute_render(&mut self, job_id: JobId, page_number: u32, now: Instant) {
        let Some(engine) = self.loader.engine().cloned() else {
            return;
        };
        let Some(renderer) = page_number.checked_sub(1).and_then(|index| self.pages.get_mut(index as usize))
        else {
            return;
        };

        let stale = renderer
            .active_task()
            .map_or(false, |task| !self.loader.is_current(&task.key.document));
        if stale {
            renderer.cancel();
            return;
        }

        // failures are logged by the renderer and stay confined to this page
        if let RenderOutcome::Painted { height, .. } = renderer.run(engine.as_ref(), job_id) {
            self.layout.set_page_height(page_number, height as f32);
            self.refresh_visibility(now);
        }
    }

    fn target_size(&self) -> TargetSize {
        match self.config.scale {
            ScalePolicy::FitWidth => TargetSize::Width(self.container_width),
            ScalePolicy::Fixed { scale } => TargetSize::Scale(scale),
        }
    }

    fn schedule_all_paints(&mut self) {
        for page_number in 1..=self.pages.len() as u32 {
            self.schedule_paint(page_number);
        }
    }

    fn schedule_paint(&mut self, page_number: u32) {
        let Some(document) = self.loader.current() else {
            return;
        };
        let key = RenderKey { document, page_number, target: self.target_size() };
        let priority = PriorityCalculator::new(self.tracker.current())
            .with_adjacent_radius(self.config.adjacent_radius)
            .calculate_page_priority(page_number, self.layout.intersection_ratio(page_number));

        let Some(renderer) = self.pages.get_mut(page_number as usize - 1) else {
            return;
        };
        if renderer.check(&key) != RenderRequest::Start {
            return;
        }

        let (job_id, token) = self.scheduler.submit_child(
            priority,
            JobType::RenderPage { generation: document.generation(), page_number },
            &self.document_token,
        );
        if let Some(previous) = renderer.start(RenderTask { job_id, key, token }) {
            log::trace!("page {page_number}: job {} superseded by {job_id}", previous.job_id);
            self.scheduler.cancel_job(previous.job_id);
        }
    }

    fn refresh_visibility(&mut self, now: Instant) {
        for page_number in 1..=self.pages.len() as u32 {
            let ratio = self.layout.intersection_ratio(page_number);
            self.tracker.report(page_number, ratio, now);
        }
    }

    /// Drop queued jobs of every generation but the loader's current one.
    fn drop_stale_jobs(&mut self) {
        let dropped = self.scheduler.cancel_stale_generations(self.loader.generation());
        if dropped > 0 {
            log::trace!("dropped {dropped} job(s) from earlier documents");
        }
    }

    fn teardown_document(&mut self) {
        self.document_token.cancel();
        self.pending_load = None;
        for renderer in &mut self.pages {
            renderer.cancel();
        }
        self.pages.clear();
        self.tracker.reset();
        self.layout.page_heights_px.clear();
        self.layout.scroll_offset_px = 0.0;
        self.animation = None;
        self.nav_target = None;
    }
}

impl Drop for ViewerShell {
    fn drop(&mut self) {
        self.teardown_document();
        self.scheduler.clear();
    }
}

impl fmt::Debug for ViewerShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerShell")
            .field("state", &self.state())
            .field("source", &self.loader.source())
            .field("page_count", &self.page_count())
            .field("current_page", &self.current_page())
            .field("container_width", &self.container_width)
            .finish()
    }
}
