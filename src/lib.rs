//! # edgequake-figref
//!
//! Auto-numbered figure captions and cross-references for literate reports.
//!
//! ## Why this crate?
//!
//! A report that says "see Figure 4" three paragraphs before Figure 4 is
//! declared cannot be numbered in one pass. This crate pre-scans the raw
//! source for caption declarations, numbers them in reading order, and only
//! then renders, so forward references resolve like backward ones. Plot
//! images are wrapped in captioned `<figure>` blocks with a link anchor.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source
//!  │
//!  ├─ 1. Scan     find `cap("label", …)` lines, reject duplicate labels
//!  ├─ 2. Number   label i → Figure i, in source order
//!  ├─ 3. Expand   evaluate {{ cap(…) }}, {{ ref(…) }}, {{ figure(…) }}
//!  └─ 4. Output   rendered HTML + figure table + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use edgequake_figref::{render_str, RenderConfig};
//!
//! let source = "\
//! Institutions cluster in Europe ({{ ref(\"fig_raster\") }}).
//! {{ figure(\"raster.png\", cap(\"fig_raster\", \"Density of institutions\"), align=\"center\") }}
//! ";
//!
//! let config = RenderConfig::builder().base_url("figures/").build().unwrap();
//! let doc = render_str(source, &config).unwrap();
//! assert!(doc.html.contains("Europe (Figure 1)."));
//! assert!(doc.html.contains("<img src=\"figures/raster.png\">"));
//! ```
//!
//! ## Using the registry directly
//!
//! ```rust
//! use edgequake_figref::{CaptionOptions, CaptionRegistry, RefOptions};
//!
//! let mut figs = CaptionRegistry::from_labels(["fig_sources", "fig_raster"]).unwrap();
//! assert_eq!(figs.reference("fig_raster", &RefOptions::default()).unwrap(), "Figure 2");
//! figs.cap("fig_sources", "Records by source", &CaptionOptions::default());
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `figref` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod caption;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use caption::{Caption, CaptionOptions, CaptionParts};
pub use config::{RenderConfig, RenderConfigBuilder};
pub use error::FigrefError;
pub use output::{FigureEntry, ListedFigure, RenderStats, RenderedDocument};
pub use pipeline::figure::{render_figure, Align, CaptionValue, FigureOptions, ImageSource};
pub use pipeline::scan::{extract_labels, LabelScanner, ScannedLabel};
pub use registry::{CaptionRegistry, RefOptions};
pub use render::{list_figures, render_file, render_str, render_to_file};
