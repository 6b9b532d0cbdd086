//! CLI binary for edgequake-figref.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RenderConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_figref::{
    list_figures, render, render_file, render_to_file, FigrefError, RenderConfig,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

const AFTER_HELP: &str = r#"DIRECTIVES:
  {{ cap("fig_id", "Caption text", center=true, color="gray", inline=true) }}
  {{ ref("fig_id", link=true, check=true) }}
  {{ figure("plot.png", cap("fig_id", "Caption text"), align="center") }}
  {{ figure("plot.png", "Plain caption without number") }}

  Captions are numbered in the order their cap( lines appear in the file,
  so ref() may point forward to a figure declared later.

EXAMPLES:
  # Render a report to stdout
  figref report.md

  # Render to a file, linking images under figures/
  figref report.md -o report.html --base-url figures/

  # Self-contained output: inline every image as base64
  figref report.md -o report.html --embed-images --image-root out/

  # Show the figure table without rendering
  figref --list report.md

  # Draft mode: unresolved references render as "Figure ??"
  figref --no-check-refs draft.md
"#;

/// Number figure captions and resolve cross-references in a report.
#[derive(Parser, Debug)]
#[command(
    name = "figref",
    version,
    about = "Number figure captions and resolve cross-references in a report",
    long_about = "Pre-scans a report source for caption declarations, numbers them in reading \
order, then expands cap(), ref() and figure() directives into HTML anchors, references and \
captioned <figure> blocks.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Report source file.
    input: PathBuf,

    /// Write the rendered document to this file instead of stdout.
    #[arg(short, long, env = "FIGREF_OUTPUT")]
    output: Option<PathBuf>,

    /// Prefix prepended to every figure image path.
    #[arg(long, env = "FIGREF_BASE_URL", default_value = "")]
    base_url: String,

    /// Inline images as base64 data URIs instead of linking them.
    #[arg(long, env = "FIGREF_EMBED_IMAGES", conflicts_with = "base_url")]
    embed_images: bool,

    /// Directory embedded images are read from (default: the input's directory).
    #[arg(long, env = "FIGREF_IMAGE_ROOT", requires = "embed_images")]
    image_root: Option<PathBuf>,

    /// Caption-declaration marker searched for by the pre-scan.
    #[arg(long, env = "FIGREF_MARKER", default_value = "cap(")]
    marker: String,

    /// Word printed before figure numbers.
    #[arg(long, env = "FIGREF_PREFIX", default_value = "Figure")]
    prefix: String,

    /// Render unknown references as "Figure ??" instead of failing.
    #[arg(long, env = "FIGREF_NO_CHECK_REFS")]
    no_check_refs: bool,

    /// Render references as links to the figure anchor by default.
    #[arg(long, env = "FIGREF_LINK_REFS")]
    link_refs: bool,

    /// Print the pre-scanned figure table only, no rendering.
    #[arg(long)]
    list: bool,

    /// Output structured JSON instead of the rendered document.
    #[arg(long, env = "FIGREF_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FIGREF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FIGREF_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── List-only mode ───────────────────────────────────────────────────
    if cli.list {
        let source = render::read_source(&cli.input).context("Failed to read report")?;
        let figures = list_figures(&source, &config).map_err(|e| failure(e, "Pre-scan failed"))?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&figures).context("Failed to serialise figure table")?
            );
        } else {
            for f in &figures {
                println!(
                    "{:>4}  {:<32} {}",
                    format!("{} {}", config.figure_prefix, f.number),
                    f.label,
                    dim(&format!("line {}", f.line))
                );
            }
            if !cli.quiet {
                eprintln!("{} figure label(s)", figures.len());
            }
        }
        return Ok(());
    }

    // ── Render ───────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = render_to_file(&cli.input, output_path, &config)
            .map_err(|e| failure(e, "Render failed"))?;

        if !cli.quiet {
            eprintln!(
                "{}  {} figures, {} references  {}ms  →  {}",
                if stats.late_labels == 0 && stats.unresolved_references == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.captions,
                stats.references,
                stats.duration_ms,
                bold(&output_path.display().to_string()),
            );
            if stats.unresolved_references > 0 {
                eprintln!(
                    "   {} unresolved reference(s)",
                    dim(&stats.unresolved_references.to_string())
                );
            }
        }
    } else {
        let doc = render_file(&cli.input, &config).map_err(|e| failure(e, "Render failed"))?;

        if cli.json {
            let json = serde_json::to_string_pretty(&doc).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(doc.html.as_bytes())
                .context("Failed to write to stdout")?;
            if !doc.html.ends_with('\n') {
                handle
                    .write_all(b"\n")
                    .context("Failed to write to stdout")?;
            }
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "{}",
                dim(&format!(
                    "{} figures, {} references in {}ms",
                    doc.stats.captions, doc.stats.references, doc.stats.duration_ms
                ))
            );
        }
    }

    Ok(())
}

/// Attach `what` to a library error, pointing authoring mistakes at the source file.
fn failure(e: FigrefError, what: &'static str) -> anyhow::Error {
    if e.is_authoring_error() {
        anyhow::Error::new(e).context(format!("{what}: fix the report source and re-run"))
    } else {
        anyhow::Error::new(e).context(what)
    }
}

/// Map CLI args to `RenderConfig`.
fn build_config(cli: &Cli) -> Result<RenderConfig> {
    let mut builder = RenderConfig::builder()
        .marker(cli.marker.as_str())
        .figure_prefix(cli.prefix.as_str())
        .check_refs(!cli.no_check_refs)
        .link_refs(cli.link_refs);

    builder = if cli.embed_images {
        let root = match cli.image_root {
            Some(ref r) => r.clone(),
            None => cli
                .input
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        builder.embed_images(root)
    } else {
        builder.base_url(cli.base_url.as_str())
    };

    builder.build().context("Invalid configuration")
}
