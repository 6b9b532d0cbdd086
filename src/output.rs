//! Render results: the expanded document, its figure table and counters.

use serde::{Deserialize, Serialize};

/// The fully rendered document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Source text with every directive expanded.
    pub html: String,
    /// One entry per caption declaration, in declaration order.
    pub figures: Vec<FigureEntry>,
    pub stats: RenderStats,
}

/// A declared figure caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureEntry {
    pub number: usize,
    pub label: String,
    /// Caption body as written by the author, without the `Figure N:` prefix.
    pub caption: String,
    /// Image path when the caption was declared through `figure(...)`.
    pub image: Option<String>,
    /// 1-based source line of the declaration.
    pub line: usize,
}

/// A label found by the pre-scan, with the number it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedFigure {
    pub number: usize,
    pub label: String,
    pub line: usize,
}

/// Counters for one render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Source lines processed.
    pub lines: usize,
    /// `cap(...)` declarations evaluated (including those inside `figure`).
    pub captions: usize,
    /// `ref(...)` directives evaluated.
    pub references: usize,
    /// Unchecked references that did not resolve.
    pub unresolved_references: usize,
    /// `figure(...)` blocks emitted.
    pub figures: usize,
    /// Labels numbered by the pre-scan.
    pub prescanned_labels: usize,
    /// Labels the pre-scan missed and that were numbered on declaration.
    pub late_labels: usize,
    pub duration_ms: u64,
}
