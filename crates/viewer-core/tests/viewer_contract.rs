use pdf_engine::{fixtures, LopdfEngine, PdfEngine};
use serial_test::serial;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use viewer_core::{
    DocumentLoader, EngineSlot, PageRenderer, PageStatus, RenderKey, RenderOutcome, RenderTask, ScalePolicy,
    ShellState, TargetSize, ViewerConfig, ViewerError, ViewerShell, VisibilityTracker,
};
use viewer_scheduler::CancellationToken;

fn write_pdf(dir: &Path, name: &str, sizes: &[(i64, i64)]) -> String {
    let path = dir.join(name);
    std::fs::write(&path, fixtures::pdf_with_pages(sizes).expect("fixture")).expect("write fixture");
    path.to_string_lossy().into_owned()
}

fn letter_pages(count: usize) -> Vec<(i64, i64)> {
    vec![(612, 792); count]
}

fn lopdf_engine() -> Arc<dyn PdfEngine> {
    Arc::new(LopdfEngine::new())
}

fn task(job_id: u64, key: RenderKey) -> RenderTask {
    RenderTask { job_id, key, token: CancellationToken::new() }
}

#[test]
fn rerendering_same_target_gives_same_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_pdf(dir.path(), "deed.pdf", &letter_pages(1));
    let engine = lopdf_engine();
    let mut loader = DocumentLoader::new(EngineSlot::Custom(engine.clone()), None);
    let document = loader.load(&source).unwrap();
    let key = RenderKey { document, page_number: 1, target: TargetSize::Width(480) };

    let mut dimensions = Vec::new();
    for job_id in 1..=2 {
        let mut renderer = PageRenderer::new(1);
        renderer.start(task(job_id, key));
        renderer.run(engine.as_ref(), job_id);
        dimensions.push(renderer.surface().dimensions());
    }

    assert_eq!(dimensions[0], dimensions[1]);
    assert_eq!(dimensions[0].0, 480);
}

#[test]
fn wider_targets_scale_both_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_pdf(dir.path(), "deed.pdf", &letter_pages(1));
    let engine = lopdf_engine();
    let mut loader = DocumentLoader::new(EngineSlot::Custom(engine.clone()), None);
    let document = loader.load(&source).unwrap();

    let mut renderer = PageRenderer::new(1);
    let mut previous: Option<(u32, u32)> = None;
    for (job_id, width) in [(1, 200), (2, 400), (3, 800), (4, 1600)] {
        let key = RenderKey { document, page_number: 1, target: TargetSize::Width(width) };
        renderer.start(task(job_id, key));
        renderer.run(engine.as_ref(), job_id);

        let (w, h) = renderer.surface().dimensions();
        assert_eq!(w, width);
        assert!((h as f32 / w as f32 - 792.0 / 612.0).abs() < 0.01);
        if let Some((pw, ph)) = previous {
            assert!(w > pw && h > ph);
        }
        previous = Some((w, h));
    }
}

#[test]
fn later_request_supersedes_earlier_one() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_pdf(dir.path(), "deed.pdf", &letter_pages(1));
    let engine = lopdf_engine();
    let mut loader = DocumentLoader::new(EngineSlot::Custom(engine.clone()), None);
    let document = loader.load(&source).unwrap();

    let mut renderer = PageRenderer::new(1);
    let key = |width| RenderKey { document, page_number: 1, target: TargetSize::Width(width) };
    renderer.start(task(1, key(300)));
    renderer.start(task(2, key(900)));

    assert!(matches!(renderer.run(engine.as_ref(), 1), RenderOutcome::Cancelled));
    assert!(matches!(renderer.run(engine.as_ref(), 2), RenderOutcome::Painted { width: 900, .. }));
    assert_eq!(renderer.surface().width(), 900);
    assert_eq!(renderer.status(), PageStatus::Painted);
    assert_eq!(renderer.last_error(), None);
}

#[test]
fn switching_source_resets_count_and_current_page() {
    let dir = tempfile::tempdir().unwrap();
    let short = write_pdf(dir.path(), "short.pdf", &letter_pages(3));
    let long = write_pdf(dir.path(), "long.pdf", &letter_pages(6));
    let mut shell = ViewerShell::with_engine(
        ViewerConfig::default().with_scale(ScalePolicy::Fixed { scale: 1.0 }),
        lopdf_engine(),
    );
    let mut now = Instant::now();

    shell.set_viewport_height(800.0, now);
    shell.set_source(&short);
    now = shell.settle(now);
    shell.scroll_to(shell.layout().scroll_target(3), now);
    now = shell.settle(now);
    assert_eq!(shell.page_count(), 3);
    assert_eq!(shell.current_page(), 3);

    shell.set_source(&long);
    assert_eq!(shell.state(), ShellState::Loading);
    assert_eq!(shell.page_count(), 0);
    assert_eq!(shell.current_page(), 1);
    assert_eq!(shell.scroll_offset(), 0.0);

    shell.settle(now);
    assert_eq!(shell.page_count(), 6);
    assert_eq!(shell.current_page(), 1);
}

#[test]
fn most_visible_page_is_current() {
    let mut tracker = VisibilityTracker::new(vec![0.0, 0.25, 0.5, 0.75, 1.0], Duration::from_millis(100));
    tracker.observe(1..=3);
    let now = Instant::now();

    tracker.report(1, 0.1, now);
    tracker.report(2, 0.9, now);
    tracker.report(3, 0.3, now);

    assert_eq!(tracker.poll(now + Duration::from_millis(100)), Some(2));
    assert_eq!(tracker.current(), 2);
}

#[test]
fn navigation_is_bounded_by_document() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_pdf(dir.path(), "five.pdf", &letter_pages(5));
    let mut shell = ViewerShell::with_engine(
        ViewerConfig::default().with_scale(ScalePolicy::Fixed { scale: 1.0 }),
        lopdf_engine(),
    );
    let mut now = Instant::now();

    shell.resize(640);
    shell.set_viewport_height(800.0, now);
    shell.set_source(&source);
    now = shell.settle(now);

    assert_eq!(shell.current_page(), 1);
    assert!(!shell.can_go_previous());
    assert!(shell.can_go_next());
    assert!(!shell.go_previous(now));
    assert_eq!(shell.indicator().unwrap().to_string(), "Page 1 of 5");

    for expected in 2..=5 {
        assert!(shell.go_next(now));
        now = shell.settle(now);
        assert_eq!(shell.current_page(), expected);
        assert!(shell.can_go_previous());
        assert_eq!(shell.can_go_next(), expected < 5);
    }
    assert!(!shell.go_next(now));
    assert_eq!(shell.indicator().unwrap().to_string(), "Page 5 of 5");

    for expected in (1..=4).rev() {
        assert!(shell.go_previous(now));
        now = shell.settle(now);
        assert_eq!(shell.current_page(), expected);
    }
    assert!(!shell.can_go_previous());
}

#[test]
fn user_scroll_interrupts_smooth_scroll() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_pdf(dir.path(), "five.pdf", &letter_pages(5));
    let mut shell = ViewerShell::with_engine(
        ViewerConfig::default().with_scale(ScalePolicy::Fixed { scale: 1.0 }),
        lopdf_engine(),
    );
    let mut now = Instant::now();

    shell.set_viewport_height(800.0, now);
    shell.set_source(&source);
    now = shell.settle(now);

    assert!(shell.go_to_page(5, now));
    assert!(shell.is_scrolling());
    shell.scroll_to(0.0, now + Duration::from_millis(50));
    assert!(!shell.is_scrolling());

    shell.settle(now + Duration::from_millis(50));
    assert_eq!(shell.scroll_offset(), 0.0);
    assert_eq!(shell.current_page(), 1);
}

#[test]
fn page_beyond_count_fails_without_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_pdf(dir.path(), "two.pdf", &letter_pages(2));
    let engine = lopdf_engine();
    let mut loader = DocumentLoader::new(EngineSlot::Custom(engine.clone()), None);
    let document = loader.load(&source).unwrap();

    let mut renderer = PageRenderer::new(3);
    let key = RenderKey { document, page_number: 3, target: TargetSize::Width(300) };
    renderer.start(task(1, key));

    match renderer.run(engine.as_ref(), 1) {
        RenderOutcome::Failed(ViewerError::PageFetch { page, .. }) => assert_eq!(page, 3),
        other => panic!("expected a page fetch failure, got {other:?}"),
    }
    assert!(renderer.surface().is_blank());
    assert_eq!(renderer.status(), PageStatus::Failed);
}

#[test]
fn missing_file_reports_failure() {
    let mut shell = ViewerShell::with_engine(ViewerConfig::default(), lopdf_engine());

    shell.set_source("/definitely/not/here.pdf");
    shell.run_until_idle(Instant::now());

    match shell.state() {
        ShellState::Failed { message } => assert!(message.contains("/definitely/not/here.pdf")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(shell.page_count(), 0);
    assert!(shell.pages().is_empty());
}

#[test]
#[serial]
fn shells_share_one_engine() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_pdf(dir.path(), "deed.pdf", &letter_pages(2));

    let mut first = ViewerShell::new(ViewerConfig::default());
    let mut second = ViewerShell::new(ViewerConfig::default());
    first.set_source(&source);
    second.set_source(&source);
    first.run_until_idle(Instant::now());
    second.run_until_idle(Instant::now());

    assert_eq!(first.page_count(), 2);
    assert_eq!(second.page_count(), 2);
    assert_eq!(pdf_engine::shared_engine_initializations(), 1);
}
