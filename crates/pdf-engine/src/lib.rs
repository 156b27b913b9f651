use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Page-tree lookups stop after this many `/Parent` hops.
const MAX_TREE_DEPTH: usize = 32;

/// Rows painted between two cancellation checks.
const BAND_ROWS: u32 = 64;

/// Largest surface a page may be painted into (1 GiB of RGBA).
pub const MAX_SURFACE_PIXELS: u64 = 1 << 28;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAGE_EDGE: Rgba<u8> = Rgba([220, 220, 220, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page size in points (1/72 inch), after applying `/Rotate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    pub fn aspect_ratio(&self) -> f32 {
        self.height_pt / self.width_pt
    }
}

/// One page of a loaded document.
///
/// Only meaningful while the owning [`DocumentHandle`] is open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHandle {
    document: DocumentHandle,
    page_number: u32,
    size: PageSize,
}

impl PageHandle {
    pub fn new(document: DocumentHandle, page_number: u32, size: PageSize) -> Self {
        Self { document, page_number, size }
    }

    pub fn document(&self) -> DocumentHandle {
        self.document
    }

    /// 1-based page number
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn size(&self) -> PageSize {
        self.size
    }

    /// Rendering geometry at `scale` (1.0 = one pixel per point)
    pub fn viewport(&self, scale: f32) -> PageViewport {
        PageViewport {
            scale,
            width: self.size.width_pt * scale,
            height: self.size.height_pt * scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageViewport {
    pub scale: f32,
    pub width: f32,
    pub height: f32,
}

impl PageViewport {
    /// Whole-pixel surface size for this viewport, at least 1×1
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

/// Pixel buffer a page is painted into.
///
/// A fresh surface is 0×0, which callers treat as blank.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    pub fn new() -> Self {
        Self { image: RgbaImage::new(0, 0) }
    }

    /// Transparent surface of the given size
    ///
    /// Sizes above [`MAX_SURFACE_PIXELS`] are refused instead of allocated.
    pub fn with_size(width: u32, height: u32) -> Result<Self, PdfEngineError> {
        check_surface_size(width, height)?;
        Ok(Self { image: RgbaImage::new(width, height) })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_blank(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

fn check_surface_size(width: u32, height: u32) -> Result<(), PdfEngineError> {
    let pixels = u64::from(width) * u64::from(height);
    let fits = pixels <= MAX_SURFACE_PIXELS
        && usize::try_from(pixels).ok().and_then(|pixels| pixels.checked_mul(4)).is_some();

    if fits {
        Ok(())
    } else {
        Err(PdfEngineError::SurfaceTooLarge { width, height })
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    /// `http://` or `https://` resource
    Url(String),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("rendering engine failed to initialize: {0}")]
    Initialization(String),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("surface is {actual:?} but viewport needs {expected:?}")]
    SurfaceMismatch { expected: (u32, u32), actual: (u32, u32) },
    #[error("surface {width}x{height} is too large to allocate")]
    SurfaceTooLarge { width: u32, height: u32 },
    #[error("rendering cancelled")]
    Cancelled,
    #[error("backend error: {0}")]
    Backend(String),
}

impl PdfEngineError {
    /// Cancellation is an expected outcome, not a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PdfEngineError::Cancelled)
    }
}

/// The rendering engine the viewer delegates parsing and painting to.
///
/// Page numbers are 1-based. `render_into` paints `page` at `viewport` into
/// `surface`, which must already be sized to `viewport.pixel_size()`. It
/// polls `is_cancelled` between units of work and returns
/// [`PdfEngineError::Cancelled`] without touching the surface once it
/// reports `true`.
pub trait PdfEngine: Send + Sync {
    fn load_document(&self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn get_page(&self, handle: DocumentHandle, page_number: u32) -> Result<PageHandle, PdfEngineError>;
    fn render_into(
        &self,
        page: &PageHandle,
        viewport: &PageViewport,
        surface: &mut Surface,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<(), PdfEngineError>;
    fn close(&self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

/// Read the raw bytes behind a source, fetching URLs over HTTP.
pub fn read_source(source: OpenSource) -> Result<Vec<u8>, PdfEngineError> {
    match source {
        OpenSource::Path(path) => Ok(fs::read(path)?),
        OpenSource::Bytes(bytes) => Ok(bytes),
        OpenSource::Url(url) => fetch_url(&url),
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>, PdfEngineError> {
    let response = ureq::get(url)
        .set("Accept", "application/pdf")
        .call()
        .map_err(|e| PdfEngineError::Fetch { url: url.to_owned(), message: e.to_string() })?;

    let mut bytes = Vec::new();
    response.into_reader().read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
struct EngineState {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl EngineState {
    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Default engine: page geometry from `lopdf`, pages painted as blank paper.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    state: Mutex<EngineState>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, EngineState>, PdfEngineError> {
        self.state
            .lock()
            .map_err(|_| PdfEngineError::Backend("engine state lock poisoned".to_owned()))
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        Ok(doc.get_pages().into_values().map(|page_id| page_size(&doc, page_id)).collect())
    }
}

/// Look up a page attribute, walking up the page tree for inherited values.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return match value.as_reference() {
                Ok(id) => doc.get_object(id).ok(),
                Err(_) => Some(value),
            };
        }

        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let size = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let x0 = array[0].as_float().ok()?;
            let y0 = array[1].as_float().ok()?;
            let x1 = array[2].as_float().ok()?;
            let y1 = array[3].as_float().ok()?;
            Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
        })
        .filter(|size| size.width_pt > 0.0 && size.height_pt > 0.0)
        .unwrap_or(PageSize::LETTER);

    let rotate = inherited(doc, page_id, b"Rotate").and_then(|obj| obj.as_i64().ok()).unwrap_or(0);

    match rotate.rem_euclid(360) {
        90 | 270 => PageSize { width_pt: size.height_pt, height_pt: size.width_pt },
        _ => size,
    }
}

impl PdfEngine for LopdfEngine {
    fn load_document(&self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = read_source(source)?;
        let page_sizes = Self::parse_sizes(&bytes)?;

        let mut state = self.state()?;
        state.next_handle += 1;
        let handle = DocumentHandle(state.next_handle);
        state.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.state()?.record(handle)?.page_sizes.len() as u32)
    }

    fn get_page(&self, handle: DocumentHandle, page_number: u32) -> Result<PageHandle, PdfEngineError> {
        let state = self.state()?;
        let record = state.record(handle)?;
        let page_count = record.page_sizes.len() as u32;

        page_number
            .checked_sub(1)
            .and_then(|index| record.page_sizes.get(index as usize))
            .map(|size| PageHandle::new(handle, page_number, *size))
            .ok_or(PdfEngineError::PageOutOfRange { page: page_number, page_count })
    }

    fn render_into(
        &self,
        page: &PageHandle,
        viewport: &PageViewport,
        surface: &mut Surface,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<(), PdfEngineError> {
        self.state()?.record(page.document())?;

        let (width, height) = viewport.pixel_size();
        if surface.dimensions() != (width, height) {
            return Err(PdfEngineError::SurfaceMismatch {
                expected: (width, height),
                actual: surface.dimensions(),
            });
        }

        let framed = width >= 4 && height >= 4;
        let mut canvas = RgbaImage::new(width, height);

        for band_start in (0..height).step_by(BAND_ROWS as usize) {
            if is_cancelled() {
                return Err(PdfEngineError::Cancelled);
            }

            for y in band_start..(band_start + BAND_ROWS).min(height) {
                let edge_row = framed && (y == 0 || y == height - 1);
                for x in 0..width {
                    let edge = framed && (edge_row || x == 0 || x == width - 1);
                    canvas.put_pixel(x, y, if edge { PAGE_EDGE } else { PAPER });
                }
            }
        }

        if is_cancelled() {
            return Err(PdfEngineError::Cancelled);
        }

        *surface.image_mut() = canvas;
        Ok(())
    }

    fn close(&self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.state()?
            .docs
            .remove(&handle)
            .map(|_| ())
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Rasterises pages with PDFium; geometry still comes from `lopdf`.
    pub struct PdfiumEngine {
        pdfium: Pdfium,
        geometry: LopdfEngine,
        sources: Mutex<HashMap<DocumentHandle, Vec<u8>>>,
    }

    impl PdfiumEngine {
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                PdfEngineError::Initialization(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self {
                pdfium: Pdfium::new(bindings),
                geometry: LopdfEngine::new(),
                sources: Mutex::new(HashMap::new()),
            })
        }

        fn sources(&self) -> Result<MutexGuard<'_, HashMap<DocumentHandle, Vec<u8>>>, PdfEngineError> {
            self.sources
                .lock()
                .map_err(|_| PdfEngineError::Backend("pdfium source lock poisoned".to_owned()))
        }
    }

    impl PdfEngine for PdfiumEngine {
        fn load_document(&self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            let bytes = read_source(source)?;
            let handle = self.geometry.load_document(OpenSource::Bytes(bytes.clone()))?;
            self.sources()?.insert(handle, bytes);
            Ok(handle)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.geometry.page_count(handle)
        }

        fn get_page(
            &self,
            handle: DocumentHandle,
            page_number: u32,
        ) -> Result<PageHandle, PdfEngineError> {
            self.geometry.get_page(handle, page_number)
        }

        fn render_into(
            &self,
            page: &PageHandle,
            viewport: &PageViewport,
            surface: &mut Surface,
            is_cancelled: &dyn Fn() -> bool,
        ) -> Result<(), PdfEngineError> {
            let bytes = self
                .sources()?
                .get(&page.document())
                .cloned()
                .ok_or(PdfEngineError::InvalidHandle(page.document().raw()))?;

            let (width, height) = viewport.pixel_size();
            if surface.dimensions() != (width, height) {
                return Err(PdfEngineError::SurfaceMismatch {
                    expected: (width, height),
                    actual: surface.dimensions(),
                });
            }

            if is_cancelled() {
                return Err(PdfEngineError::Cancelled);
            }

            let document = self
                .pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|e| PdfEngineError::Backend(e.to_string()))?;
            let pdf_page = document
                .pages()
                .get((page.page_number() - 1) as u16)
                .map_err(|e| PdfEngineError::Backend(e.to_string()))?;

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);
            let bitmap = pdf_page
                .render_with_config(&config)
                .map_err(|e| PdfEngineError::Backend(e.to_string()))?;

            if is_cancelled() {
                return Err(PdfEngineError::Cancelled);
            }

            let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes().to_vec())
                .ok_or_else(|| PdfEngineError::Backend("bitmap size mismatch".to_owned()))?;
            *surface.image_mut() = image;
            Ok(())
        }

        fn close(&self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.sources()?.remove(&handle);
            self.geometry.close(handle)
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

static SHARED_ENGINE: OnceLock<Result<Arc<dyn PdfEngine>, String>> = OnceLock::new();
static ENGINE_INITIALIZATIONS: AtomicUsize = AtomicUsize::new(0);

/// The process-wide engine, initialised on first use.
///
/// Every caller gets a clone of the same `Arc`. A failed initialisation is
/// remembered and reported to every later caller as well.
pub fn shared_engine() -> Result<Arc<dyn PdfEngine>, PdfEngineError> {
    SHARED_ENGINE
        .get_or_init(|| {
            ENGINE_INITIALIZATIONS.fetch_add(1, Ordering::SeqCst);
            initialize_engine().map_err(|err| err.to_string())
        })
        .clone()
        .map_err(PdfEngineError::Initialization)
}

/// How many times the shared engine has been initialised (0 or 1)
pub fn shared_engine_initializations() -> usize {
    ENGINE_INITIALIZATIONS.load(Ordering::SeqCst)
}

fn initialize_engine() -> Result<Arc<dyn PdfEngine>, PdfEngineError> {
    #[cfg(feature = "pdfium")]
    {
        match pdfium_backend::PdfiumEngine::from_system_library() {
            Ok(engine) => {
                log::debug!("initialized pdfium rendering engine");
                return Ok(Arc::new(engine));
            }
            Err(err) => log::warn!("{err}; falling back to lopdf engine"),
        }
    }

    log::debug!("initialized lopdf rendering engine");
    Ok(Arc::new(default_engine()))
}
