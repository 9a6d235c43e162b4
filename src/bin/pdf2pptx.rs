//! CLI binary for edgequake-pdf2pptx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, runs the conversion through a `Bridge` and renders its
//! messages as a progress bar (or JSON lines).

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_pdf2pptx::convert::write_deck;
use edgequake_pdf2pptx::pipeline::input::read_source;
use edgequake_pdf2pptx::source::pdfium::PdfiumBackend;
use edgequake_pdf2pptx::{
    format_bytes, inspect_with, to_pptx_name, Bridge, ConversionConfig, ConversionRequest,
    EngineKind, EngineMessage, EnginePreference, ImageEncoding, MessageSink, RenderMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole-page pictures at 2x, PNG (writes slides.pptx next to the input)
  pdf2pptx slides.pdf

  # Editable text over a light background
  pdf2pptx --mode hybrid slides.pdf -o editable.pptx

  # Smaller decks: JPEG at quality 0.7
  pdf2pptx --format jpeg --quality 0.7 --scale 1.5 photos.pdf

  # Page count and slide size only
  pdf2pptx --inspect-only slides.pdf

  # Machine-readable progress, one JSON message per line
  pdf2pptx --json slides.pdf

RENDER MODES:
  image    every page becomes one picture at --scale (1-3); nothing editable
  hybrid   1.2x background picture + positioned text boxes; text is editable

  Out-of-range --scale / --quality values are clamped, never rejected.

ENVIRONMENT VARIABLES:
  PDF2PPTX_MODE, PDF2PPTX_SCALE, PDF2PPTX_FORMAT, PDF2PPTX_QUALITY
                          Defaults for the matching flags
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Overrides the log filter (e.g. RUST_LOG=debug)

Press Ctrl-C to abort; no partial deck is written.
"#;

/// Convert PDF files to PowerPoint decks, entirely offline.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2pptx",
    version,
    about = "Convert PDF files to PowerPoint (.pptx) decks",
    long_about = "Convert a PDF document into a .pptx slide deck in-process. Each page becomes one \
slide, either as a full-page picture or as a background picture with editable text boxes.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write the deck here instead of `<input name>.pptx` next to the input.
    #[arg(short, long, env = "PDF2PPTX_OUTPUT")]
    output: Option<PathBuf>,

    /// Rendering strategy.
    #[arg(long, env = "PDF2PPTX_MODE", value_enum, default_value = "image")]
    mode: ModeArg,

    /// Raster scale over the page's natural size (clamped to 1-3).
    #[arg(long, env = "PDF2PPTX_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Image encoding of page rasters.
    #[arg(long, env = "PDF2PPTX_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// JPEG quality (clamped to 0.4-1). Ignored for PNG.
    #[arg(long, env = "PDF2PPTX_QUALITY", default_value_t = 0.82)]
    quality: f32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PPTX_PASSWORD")]
    password: Option<String>,

    /// Run on the calling thread instead of a background worker.
    #[arg(long, env = "PDF2PPTX_INLINE")]
    inline: bool,

    /// Path to libpdfium (file or containing directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print engine messages as JSON lines instead of a progress bar.
    #[arg(long, env = "PDF2PPTX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2PPTX_NO_PROGRESS")]
    no_progress: bool,

    /// Print page count and slide size only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PPTX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2PPTX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Image,
    Hybrid,
}

impl From<ModeArg> for RenderMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Image => RenderMode::Image,
            ModeArg::Hybrid => RenderMode::Hybrid,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    #[value(alias = "jpg")]
    Jpeg,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters; library
    // INFO logs would only tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli);

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect_with(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            println!("Pages:        {}", info.page_count);
            println!(
                "Slide size:   {:.0} x {:.0} pt ({:.2} x {:.2} in)",
                info.first_page_width_pts,
                info.first_page_height_pts,
                info.first_page_width_pts / 72.0,
                info.first_page_height_pts / 72.0
            );
            println!("Output name:  {}", info.output_name);
        }
        return Ok(());
    }

    // ── Read input ───────────────────────────────────────────────────────
    let bytes = read_source(&cli.input, config.max_input_bytes)
        .await
        .context("Cannot read input")?;
    let source_name = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input, source_name.as_deref()));
    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("Converting {}", cli.input.display())),
            dim(&format_bytes(bytes.len() as u64)),
        );
    }

    // ── Run through the bridge ───────────────────────────────────────────
    let bridge = Arc::new(Bridge::from_config(&config));
    let engine = bridge.select_engine().context("No usable render engine")?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<EngineMessage>();
    let sink: Arc<dyn MessageSink> = Arc::new(tx);

    {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                bridge.cancel();
            }
        });
    }

    let request = ConversionRequest::from_config(bytes, source_name, &config);
    match engine {
        // The inline engine returns only once the run is over; its messages
        // wait in the channel.
        EngineKind::Inline => tokio::task::block_in_place(|| bridge.start(request, sink))?,
        EngineKind::Worker => bridge.start(request, sink)?,
    };

    let bar = show_progress.then(new_bar);
    let outcome = loop {
        let Some(message) = rx.recv().await else {
            bail!("Conversion engine stopped without a result");
        };
        if cli.json && !matches!(message, EngineMessage::Result(_)) {
            println!("{}", serde_json::to_string(&message)?);
        }
        match message {
            EngineMessage::Progress(event) => {
                if let Some(ref bar) = bar {
                    bar.set_position(event.percent as u64);
                    bar.set_message(event.label);
                }
            }
            EngineMessage::Log { message } => match bar {
                Some(ref bar) => bar.println(format!("  {}", dim(&message))),
                None if !cli.quiet && !cli.json => eprintln!("  {}", dim(&message)),
                None => {}
            },
            EngineMessage::Result(result) => break Ok(result),
            EngineMessage::Error { message, kind } => break Err((message, Some(kind))),
            EngineMessage::Cancelled => break Err(("Conversion aborted".to_string(), None)),
        }
    };
    if let Some(ref bar) = bar {
        bar.finish_and_clear();
    }

    let result = match outcome {
        Ok(result) => result,
        Err((message, kind)) => {
            if !cli.quiet {
                eprintln!("{} {}", red("✘"), red(&message));
            }
            match kind {
                Some(kind) => bail!("Conversion failed ({kind:?})"),
                None => bail!("Conversion aborted"),
            }
        }
    };

    // ── Write output ─────────────────────────────────────────────────────
    let target = output_path.clone();
    let stats = result.stats.clone();
    tokio::task::spawn_blocking(move || write_deck(&target, &result.output_bytes))
        .await
        .context("Write task panicked")??;

    if cli.json {
        let summary = serde_json::json!({
            "type": "result",
            "payload": {
                "output_name": to_pptx_name(cli.input.file_name().and_then(|n| n.to_str())),
                "output_path": output_path,
                "stats": stats,
            }
        });
        println!("{summary}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} slides  {}  {}ms  →  {}",
            green("✔"),
            stats.slides,
            format_bytes(stats.output_size as u64),
            stats.duration_ms,
            bold(&output_path.display().to_string()),
        );
        for degraded in &stats.degraded_pages {
            eprintln!("   {} {}", cyan("⚠"), degraded);
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> ConversionConfig {
    let image_format = match cli.format {
        FormatArg::Png => ImageEncoding::Png,
        FormatArg::Jpeg => ImageEncoding::Jpeg {
            quality: cli.quality,
        },
    };
    let backend = match cli.pdfium_lib {
        Some(ref path) => PdfiumBackend::with_library_path(path.clone()),
        None => PdfiumBackend::new(),
    };

    let mut builder = ConversionConfig::builder()
        .scale(cli.scale)
        .image_format(image_format)
        .mode(cli.mode.into())
        .backend(Arc::new(backend))
        .engine(if cli.inline {
            EnginePreference::Inline
        } else {
            EnginePreference::Auto
        });
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    builder.build()
}

/// `<dir of input>/<to_pptx_name(input)>`.
fn default_output_path(input: &Path, source_name: Option<&str>) -> PathBuf {
    let name = to_pptx_name(source_name);
    match input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Converting");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
