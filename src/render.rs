//! Main document rendering orchestration.
//!
//! [`render_str`] pre-scans the source, then walks it line by line expanding
//! `{{ ... }}` directives against one [`CaptionRegistry`]. Any error aborts
//! the render; nothing partial is returned.
//!
//! | Directive | Parameters |
//! |-----------|------------|
//! | `cap`     | `label, text, center=false, color=, inline=true` |
//! | `ref`     | `label, link=<config>, check=<config>` |
//! | `figure`  | `path, caption=cap(...) \| "text", align="default"` |

use crate::caption::{Caption, CaptionOptions};
use crate::config::RenderConfig;
use crate::error::FigrefError;
use crate::output::{FigureEntry, ListedFigure, RenderStats, RenderedDocument};
use crate::pipeline::directive::{self, Call, Segment, Value};
use crate::pipeline::figure::{self, Align, CaptionValue, FigureOptions};
use crate::pipeline::scan::{self, LabelScanner};
use crate::registry::{CaptionRegistry, RefOptions};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

const CAP_PARAMS: &[&str] = &["label", "text", "center", "color", "inline"];
const REF_PARAMS: &[&str] = &["label", "link", "check"];
const FIGURE_PARAMS: &[&str] = &["path", "caption", "align"];

/// Render a document held in memory.
///
/// # Example
/// ```rust
/// use edgequake_figref::{render_str, RenderConfig};
///
/// let src = "As {{ ref(\"fig_map\") }} shows...\n\
///            {{ figure(\"map.png\", cap(\"fig_map\", \"Institutions\")) }}\n";
/// let doc = render_str(src, &RenderConfig::default()).unwrap();
/// assert!(doc.html.starts_with("As Figure 1 shows"));
/// ```
pub fn render_str(source: &str, config: &RenderConfig) -> Result<RenderedDocument, FigrefError> {
    let start = Instant::now();
    let scanner = LabelScanner::new(&config.marker)?;
    let registry = CaptionRegistry::prescan(source, &scanner)?.with_prefix(&config.figure_prefix);

    let mut renderer = Renderer {
        config,
        registry,
        declared: HashMap::new(),
        figures: Vec::new(),
        stats: RenderStats::default(),
    };

    let mut html = String::with_capacity(source.len() + source.len() / 4);
    for (i, line) in source.lines().enumerate() {
        renderer.render_line(line, i + 1, &mut html)?;
        html.push('\n');
        renderer.stats.lines += 1;
    }
    if !source.ends_with('\n') && html.ends_with('\n') {
        html.pop();
    }

    let Renderer {
        registry,
        figures,
        mut stats,
        ..
    } = renderer;
    stats.prescanned_labels = registry.prescanned();
    stats.late_labels = registry.late();
    stats.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Rendered {} lines: {} captions, {} references, {} figures in {}ms",
        stats.lines, stats.captions, stats.references, stats.figures, stats.duration_ms
    );

    Ok(RenderedDocument {
        html,
        figures,
        stats,
    })
}

/// Read and render a document from disk.
pub fn render_file(
    input: impl AsRef<Path>,
    config: &RenderConfig,
) -> Result<RenderedDocument, FigrefError> {
    let source = read_source(input.as_ref())?;
    render_str(&source, config)
}

/// Render a document and write the result to `output_path`.
///
/// Uses atomic write (temp file in the target directory + rename) so a
/// failed render never leaves a half-written file behind.
pub fn render_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &RenderConfig,
) -> Result<RenderStats, FigrefError> {
    let doc = render_file(input, config)?;
    let path = output_path.as_ref();
    let write_err = |e: std::io::Error| FigrefError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(doc.html.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("wrote {} bytes to {}", doc.html.len(), path.display());
    Ok(doc.stats)
}

/// Pre-scan only: the figure table a render would number, without rendering.
pub fn list_figures(source: &str, config: &RenderConfig) -> Result<Vec<ListedFigure>, FigrefError> {
    let scanner = LabelScanner::new(&config.marker)?;
    let labels = scan::prescan(source, &scanner)?;
    Ok(labels
        .into_iter()
        .enumerate()
        .map(|(i, l)| ListedFigure {
            number: i + 1,
            label: l.label,
            line: l.line,
        })
        .collect())
}

/// Read a document as UTF-8 text, mapping I/O failures to specific errors.
pub fn read_source(path: &Path) -> Result<String, FigrefError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FigrefError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => FigrefError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => FigrefError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

// ── Internal ─────────────────────────────────────────────────────────────

struct Renderer<'c> {
    config: &'c RenderConfig,
    registry: CaptionRegistry,
    /// Label → line of its `cap(...)` in this render.
    declared: HashMap<String, usize>,
    figures: Vec<FigureEntry>,
    stats: RenderStats,
}

impl Renderer<'_> {
    fn render_line(&mut self, line: &str, line_no: usize, out: &mut String) -> Result<(), FigrefError> {
        for segment in directive::split_line(line, line_no)? {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Directive(body) => {
                    let call = directive::parse(body, line_no)?;
                    debug!("line {}: {}()", line_no, call.name);
                    let expanded = self.eval(&call, line_no)?;
                    out.push_str(&expanded);
                }
            }
        }
        Ok(())
    }

    fn eval(&mut self, call: &Call, line: usize) -> Result<String, FigrefError> {
        match call.name.as_str() {
            "cap" => self.cap(call, line, None).map(Caption::into_html),
            "ref" => self.reference(call, line),
            "figure" => self.figure(call, line),
            other => Err(invalid(
                line,
                format!("unknown directive '{}' (expected cap, ref or figure)", other),
            )),
        }
    }

    /// Evaluate `cap(...)`. `force_inline` overrides the call's own `inline`.
    fn cap(&mut self, call: &Call, line: usize, force_inline: Option<bool>) -> Result<Caption, FigrefError> {
        let args = call.bind(CAP_PARAMS).map_err(|d| invalid(line, d))?;
        let label = args.required_str("label").map_err(|d| invalid(line, d))?;
        let text = args.required_str("text").map_err(|d| invalid(line, d))?;

        let mut options = CaptionOptions::default();
        if let Some(v) = args.bool("center").map_err(|d| invalid(line, d))? {
            options.center = v;
        }
        options.color = args
            .str("color")
            .map_err(|d| invalid(line, d))?
            .map(str::to_string);
        if let Some(v) = args.bool("inline").map_err(|d| invalid(line, d))? {
            options.inline = v;
        }
        if let Some(v) = force_inline {
            options.inline = v;
        }

        // The pre-scan sees one label per line, so a repeat on the same line
        // as another caption only shows up here.
        if let Some(&first_line) = self.declared.get(label) {
            return Err(FigrefError::DuplicateLabel {
                label: label.to_string(),
                first_line,
                second_line: line,
            });
        }
        self.declared.insert(label.to_string(), line);

        let caption = self.registry.cap(label, text, &options);
        let number = self.registry.number(label).unwrap_or_default();
        self.stats.captions += 1;
        self.figures.push(FigureEntry {
            number,
            label: label.to_string(),
            caption: text.to_string(),
            image: None,
            line,
        });
        Ok(caption)
    }

    fn reference(&mut self, call: &Call, line: usize) -> Result<String, FigrefError> {
        let args = call.bind(REF_PARAMS).map_err(|d| invalid(line, d))?;
        let label = args.required_str("label").map_err(|d| invalid(line, d))?;

        let mut options: RefOptions = self.config.ref_options();
        if let Some(v) = args.bool("link").map_err(|d| invalid(line, d))? {
            options.link = v;
        }
        if let Some(v) = args.bool("check").map_err(|d| invalid(line, d))? {
            options.check = v;
        }

        let text = self.registry.reference(label, &options)?;
        self.stats.references += 1;
        if !self.registry.contains(label) {
            self.stats.unresolved_references += 1;
        }
        Ok(text)
    }

    fn figure(&mut self, call: &Call, line: usize) -> Result<String, FigrefError> {
        let args = call.bind(FIGURE_PARAMS).map_err(|d| invalid(line, d))?;
        let path = args.required_str("path").map_err(|d| invalid(line, d))?;

        let align = match args.str("align").map_err(|d| invalid(line, d))? {
            None => Align::Default,
            Some(a) => Align::parse(a).ok_or_else(|| {
                invalid(
                    line,
                    format!("figure(): unknown align '{}' (left, center, right, default)", a),
                )
            })?,
        };

        let caption = match args.get("caption") {
            None => None,
            Some(Value::Str(s)) => Some(CaptionValue::Raw(s.clone())),
            Some(Value::Call(inner)) if inner.name == "cap" => match self.cap(inner, line, Some(false))? {
                Caption::Parts(p) => {
                    if let Some(entry) = self.figures.last_mut() {
                        entry.image = Some(path.to_string());
                    }
                    Some(CaptionValue::Parts(p))
                }
                Caption::Inline(s) => Some(CaptionValue::Raw(s)),
            },
            Some(_) => {
                return Err(invalid(
                    line,
                    "figure(): 'caption' must be a cap(...) call or a string".into(),
                ))
            }
        };

        let html = figure::render_figure(path, &FigureOptions { align, caption }, &self.config.image_source)?;
        self.stats.figures += 1;
        Ok(html)
    }
}

fn invalid(line: usize, detail: String) -> FigrefError {
    FigrefError::InvalidDirective { line, detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(src: &str) -> Result<RenderedDocument, FigrefError> {
        render_str(src, &RenderConfig::default())
    }

    const REPORT: &str = "\
# Institutions

Most records come from GBIF ({{ ref(\"fig_sources\") }}); their density is
mapped in {{ ref(\"fig_raster\", link=true) }}.

{{ figure(\"sources.png\", cap(\"fig_sources\", \"Records by source\", inline=true)) }}
{{ figure(\"raster.png\", caption=cap(\"fig_raster\", \"Density\"), align=\"center\") }}
";

    #[test]
    fn test_forward_references_resolve() {
        let doc = render(REPORT).unwrap();
        assert!(doc.html.contains("GBIF (Figure 1);"), "got: {}", doc.html);
        assert!(doc.html.contains("<a href=\"#fig_raster\">Figure 2</a>"));
    }

    #[test]
    fn test_figure_blocks_use_parts() {
        let doc = render(REPORT).unwrap();
        assert!(doc.html.contains(
            "<figure>\n<a name=\"fig_sources\"></a>\n<img src=\"sources.png\">\n\
             <figcaption><span>Figure 1: Records by source</span></figcaption>\n</figure>"
        ));
        assert!(doc.html.contains("<figure style=\"text-align: center;\">\n<a name=\"fig_raster\"></a>"));
    }

    #[test]
    fn test_figure_table_and_stats() {
        let doc = render(REPORT).unwrap();
        assert_eq!(
            doc.figures,
            vec![
                FigureEntry {
                    number: 1,
                    label: "fig_sources".into(),
                    caption: "Records by source".into(),
                    image: Some("sources.png".into()),
                    line: 6,
                },
                FigureEntry {
                    number: 2,
                    label: "fig_raster".into(),
                    caption: "Density".into(),
                    image: Some("raster.png".into()),
                    line: 7,
                },
            ]
        );
        assert_eq!(doc.stats.captions, 2);
        assert_eq!(doc.stats.references, 2);
        assert_eq!(doc.stats.figures, 2);
        assert_eq!(doc.stats.prescanned_labels, 2);
        assert_eq!(doc.stats.late_labels, 0);
        assert_eq!(doc.stats.lines, 7);
    }

    #[test]
    fn test_text_passes_through() {
        let src = "no directives here\nsecond line";
        assert_eq!(render(src).unwrap().html, src);
        assert_eq!(render("trailing\n").unwrap().html, "trailing\n");
        assert_eq!(render("").unwrap().html, "");
    }

    #[test]
    fn test_inline_cap_in_prose() {
        let doc = render("{{ cap(\"fig_a\", \"Some text\", color=\"gray\") }}\n{{ ref(\"fig_a\") }}").unwrap();
        assert_eq!(
            doc.html,
            "<a name=\"fig_a\"></a><span style=\"color: gray;\">Figure 1: Some text</span>\nFigure 1"
        );
    }

    #[test]
    fn test_duplicate_aborts_before_output() {
        let err = render("{{ cap(\"a\", \"x\") }}\n{{ cap(\"a\", \"y\") }}").unwrap_err();
        assert!(matches!(
            err,
            FigrefError::DuplicateLabel {
                first_line: 1,
                second_line: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_unresolved_reference_checked_and_unchecked() {
        let err = render("see {{ ref(\"ghost\") }}").unwrap_err();
        assert!(matches!(err, FigrefError::UnresolvedReference { ref label } if label == "ghost"));

        let doc = render("see {{ ref(\"ghost\", check=false) }}").unwrap();
        assert_eq!(doc.html, "see Figure ??");
        assert_eq!(doc.stats.unresolved_references, 1);

        let lenient = RenderConfig::builder().check_refs(false).build().unwrap();
        assert_eq!(render_str("{{ ref(\"ghost\") }}", &lenient).unwrap().html, "Figure ??");
    }

    #[test]
    fn test_second_cap_on_line_is_numbered_late() {
        let src = "{{ cap(\"a\", \"x\") }} {{ cap(\"b\", \"y\") }}\n{{ cap(\"c\", \"z\") }}";
        let doc = render(src).unwrap();
        let numbers: Vec<(String, usize)> = doc.figures.iter().map(|f| (f.label.clone(), f.number)).collect();
        assert_eq!(
            numbers,
            vec![("a".into(), 1), ("b".into(), 3), ("c".into(), 2)]
        );
        assert_eq!(doc.stats.late_labels, 1);
    }

    #[test]
    fn test_duplicate_on_one_line_aborts() {
        let err = render("{{ cap(\"a\", \"x\") }} {{ cap(\"a\", \"y\") }}").unwrap_err();
        assert!(matches!(
            err,
            FigrefError::DuplicateLabel {
                ref label,
                first_line: 1,
                second_line: 1,
            } if label == "a"
        ));

        let src = "{{ cap(\"b\", \"x\") }}\nsee {{ ref(\"b\") }} and {{ cap(\"b\", \"y\") }}";
        assert!(matches!(
            render(src).unwrap_err(),
            FigrefError::DuplicateLabel {
                first_line: 1,
                second_line: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_label_spacing_matches_prescan() {
        let src = "{{ cap(\" fig_a \", \"A\") }}\n{{ cap(\"b\", \"B\") }}\n";
        let doc = render(&format!("See {{{{ ref(\" fig_a \") }}}}.\n{src}")).unwrap();
        assert!(doc.html.starts_with("See Figure 1.\n"), "got: {}", doc.html);

        let numbers: Vec<(&str, usize)> = doc.figures.iter().map(|f| (f.label.as_str(), f.number)).collect();
        assert_eq!(numbers, vec![(" fig_a ", 1), ("b", 2)]);
        assert_eq!(doc.stats.late_labels, 0);
    }

    #[test]
    fn test_escaped_quote_label_resolves_forward() {
        let src = r#"See {{ ref("a\"b") }}.
{{ figure("a.png", cap("a\"b", "Quoted")) }}"#;
        let doc = render(src).unwrap();
        assert!(doc.html.starts_with("See Figure 1."), "got: {}", doc.html);
        assert!(doc.html.contains("<a name=\"a&quot;b\"></a>"), "got: {}", doc.html);
        assert_eq!(doc.stats.late_labels, 0);
    }

    #[test]
    fn test_custom_prefix_and_marker() {
        let config = RenderConfig::builder()
            .figure_prefix("Fig.")
            .marker("cap (")
            .build()
            .unwrap();
        let doc = render_str("{{ ref(\"b\") }}\n{{ cap (\"a\", \"A\") }}\n{{ cap (\"b\", \"B\") }}", &config).unwrap();
        assert!(doc.html.starts_with("Fig. 2\n"), "got: {}", doc.html);
    }

    #[test]
    fn test_base_url_applied() {
        let config = RenderConfig::builder().base_url("figures/").build().unwrap();
        let doc = render_str("{{ figure(\"map.png\", \"Raw caption\") }}", &config).unwrap();
        assert!(doc.html.contains("<img src=\"figures/map.png\">"));
        assert!(doc.html.contains("<figcaption>Raw caption</figcaption>"));
        assert!(doc.figures.is_empty());
    }

    #[test]
    fn test_directive_errors_carry_line() {
        for (src, line) in [
            ("ok\n{{ plot(\"x\") }}", 2),
            ("{{ ref(\"a\", colour=true) }}", 1),
            ("\n\n{{ figure(\"a.png\", align=\"middle\") }}", 3),
            ("{{ figure(\"a.png\", caption=ref(\"x\")) }}", 1),
            ("{{ cap(\"a\") }}", 1),
        ] {
            match render(src) {
                Err(FigrefError::InvalidDirective { line: l, .. }) => assert_eq!(l, line, "src: {src:?}"),
                other => panic!("src {src:?}: expected InvalidDirective, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_list_figures() {
        let listed = list_figures(REPORT, &RenderConfig::default()).unwrap();
        assert_eq!(
            listed,
            vec![
                ListedFigure {
                    number: 1,
                    label: "fig_sources".into(),
                    line: 6
                },
                ListedFigure {
                    number: 2,
                    label: "fig_raster".into(),
                    line: 7
                },
            ]
        );
    }
}
