use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::ImageFormat;
use pdf_engine::{DocumentHandle, OpenSource, PdfEngine};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use viewer_core::{PageStatus, ScalePolicy, ShellState, ViewerConfig, ViewerShell};

#[derive(Debug, Parser)]
#[command(name = "deedview")]
#[command(about = "Headless incremental PDF viewer")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable page geometry.
    Info {
        #[arg(value_name = "SOURCE")]
        source: String,
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Load a PDF into a viewer, paint every page and report the result.
    Render {
        #[arg(value_name = "SOURCE")]
        source: String,
        /// Container width in pixels
        #[arg(long, default_value_t = 800)]
        width: u32,
        /// Fixed zoom factor instead of fitting the container width
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long, default_value_t = 1000.0)]
        viewport_height: f32,
        /// Scroll to this 1-based page before reporting
        #[arg(long)]
        goto: Option<u32>,
        /// Write page-<n>.png for every painted page
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    source: String,
    page_count: u32,
    pages: Vec<PageGeometry>,
}

#[derive(Debug, Serialize)]
struct PageGeometry {
    number: u32,
    width_pt: f32,
    height_pt: f32,
}

#[derive(Debug, Serialize)]
struct RenderOutput {
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    page_count: u32,
    current_page: u32,
    indicator: Option<String>,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    number: u32,
    width: u32,
    height: u32,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { source, config } => run_info(&source, config.as_deref()),
        Commands::Render { source, width, scale, viewport_height, goto, out_dir, config } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(scale) = scale {
                config.scale = ScalePolicy::Fixed { scale };
                config.validate()?;
            }
            let options = RenderOptions { width, viewport_height, goto, out_dir };
            run_render(&source, config, &options)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

struct RenderOptions {
    width: u32,
    viewport_height: f32,
    goto: Option<u32>,
    out_dir: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    let config = match path {
        Some(path) => ViewerConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => ViewerConfig::from_env().context("invalid DEEDVIEW_* environment")?,
    };
    Ok(config)
}

fn run_info(source: &str, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let open_source = viewer_core::resolve_source(source, config.asset_root.as_deref())?;
    ensure_local_source_exists(&open_source)?;

    let engine = pdf_engine::shared_engine()?;
    let payload = read_info(engine.as_ref(), source, open_source)?;
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

/// Open `open_source`, read every page's geometry and close it again.
///
/// The document is closed even when reading a page fails.
fn read_info(engine: &dyn PdfEngine, source: &str, open_source: OpenSource) -> Result<InfoOutput> {
    let handle = engine.load_document(open_source).context("failed to open PDF")?;

    let pages = page_geometry(engine, handle);
    let closed = engine.close(handle);
    let pages = pages?;
    closed?;

    Ok(InfoOutput { source: source.to_owned(), page_count: pages.len() as u32, pages })
}

fn page_geometry(engine: &dyn PdfEngine, handle: DocumentHandle) -> Result<Vec<PageGeometry>> {
    let page_count = engine.page_count(handle)?;

    (1..=page_count)
        .map(|number| {
            let size = engine.get_page(handle, number)?.size();
            Ok(PageGeometry { number, width_pt: size.width_pt, height_pt: size.height_pt })
        })
        .collect()
}

fn run_render(source: &str, config: ViewerConfig, options: &RenderOptions) -> Result<()> {
    let open_source = viewer_core::resolve_source(source, config.asset_root.as_deref())?;
    ensure_local_source_exists(&open_source)?;

    let mut shell = ViewerShell::new(config);
    let mut now = Instant::now();

    shell.resize(options.width);
    shell.set_viewport_height(options.viewport_height, now);
    shell.set_source(source);
    now = shell.settle(now);

    if let ShellState::Failed { message } = shell.state() {
        anyhow::bail!(message);
    }

    if let Some(page) = options.goto {
        if !shell.go_to_page(page, now) {
            anyhow::bail!("--goto {page} is outside 1..={}", shell.page_count());
        }
        shell.settle(now);
    }

    if let Some(dir) = &options.out_dir {
        write_pages(&shell, dir)?;
    }

    let payload = render_output(&shell);
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn write_pages(shell: &ViewerShell, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;

    for page in shell.pages().iter().filter(|page| !page.surface().is_blank()) {
        let output = dir.join(format!("page-{}.png", page.page_number()));
        page.surface()
            .image()
            .save_with_format(&output, ImageFormat::Png)
            .with_context(|| format!("failed to write image to {}", output.display()))?;
        log::debug!("wrote {}", output.display());
    }

    Ok(())
}

fn render_output(shell: &ViewerShell) -> RenderOutput {
    let (state, error) = match shell.state() {
        ShellState::Idle => ("idle", None),
        ShellState::Loading => ("loading", None),
        ShellState::Ready => ("ready", None),
        ShellState::Failed { message } => ("failed", Some(message)),
    };

    let pages = shell
        .pages()
        .iter()
        .map(|page| {
            let (width, height) = page.surface().dimensions();
            PageOutput {
                number: page.page_number(),
                width,
                height,
                status: status_name(page.status()),
                error: page.last_error().map(ToOwned::to_owned),
            }
        })
        .collect();

    RenderOutput {
        state,
        error,
        page_count: shell.page_count(),
        current_page: shell.current_page(),
        indicator: shell.indicator().map(|indicator| indicator.to_string()),
        pages,
    }
}

fn status_name(status: PageStatus) -> &'static str {
    match status {
        PageStatus::Blank => "blank",
        PageStatus::Pending => "pending",
        PageStatus::Painted => "painted",
        PageStatus::Failed => "failed",
    }
}

fn ensure_local_source_exists(source: &OpenSource) -> Result<()> {
    let OpenSource::Path(path) = source else {
        return Ok(());
    };

    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
