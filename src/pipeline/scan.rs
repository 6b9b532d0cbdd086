//! Pre-scan: discover every caption label in the raw document text before
//! rendering starts.
//!
//! ## Why scan before rendering?
//!
//! Prose routinely says "see Figure 4" several paragraphs *before* Figure 4
//! is declared. A single rendering pass would not know the number yet. The
//! pre-scan walks the raw lines once, picks out caption declarations, and
//! hands the registry a complete, ordered label list up front.
//!
//! ## The heuristic
//!
//! This is a line scan, not a parse. A line is a declaration when it
//! contains the marker (default `cap(`); the label is the first quoted token
//! after the *first* marker on that line:
//!
//! ```text
//! {{ figure("raster.png", cap("fig_raster", "Density of institutions")) }}
//!                         ^^^^ ^^^^^^^^^^
//!                        marker  label
//! ```
//!
//! Exactly one label per matching line. A second `cap(` on the same line is
//! not seen here and falls through to the registry's late-assignment path.
//!
//! The quoted token is decoded with the directive tokenizer's string rules
//! (escapes, no trimming), so a scanned label is byte-for-byte the label the
//! renderer later sees in the `cap(...)` call.

use crate::error::FigrefError;
use crate::pipeline::directive;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Default caption-declaration marker.
pub const DEFAULT_MARKER: &str = "cap(";

static DEFAULT_SCANNER: Lazy<LabelScanner> = Lazy::new(|| {
    LabelScanner::new(DEFAULT_MARKER).expect("default marker is a valid pattern")
});

/// A caption label found by the pre-scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedLabel {
    /// The label text between the quotes.
    pub label: String,
    /// 1-based source line of the declaration.
    pub line: usize,
}

/// Extracts caption labels from lines containing a declaration marker.
#[derive(Debug, Clone)]
pub struct LabelScanner {
    marker: String,
    pattern: Regex,
}

impl LabelScanner {
    /// Build a scanner for `marker`. The marker is matched literally.
    pub fn new(marker: &str) -> Result<Self, FigrefError> {
        if marker.trim().is_empty() {
            return Err(FigrefError::InvalidConfig(
                "caption marker must not be empty".into(),
            ));
        }
        let pattern = Regex::new(&format!(
            r#"{}\s*["']"#,
            regex::escape(marker)
        ))
        .map_err(|e| FigrefError::InvalidConfig(format!("caption marker '{marker}': {e}")))?;

        Ok(Self {
            marker: marker.to_string(),
            pattern,
        })
    }

    /// The literal marker this scanner looks for.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Extract the label declared on `line`, if any.
    ///
    /// Only the first marker occurrence counts. Returns `None` when the
    /// marker is absent or is not followed by a non-empty quoted token.
    pub fn label_in_line(&self, line: &str) -> Option<String> {
        let start = line.find(&self.marker)?;
        let rest = &line[start..];
        let m = self.pattern.find(rest)?;
        // The match must begin at the first marker, not a later one.
        if m.start() != 0 {
            return None;
        }
        // The match ends just past the opening quote.
        let label = directive::leading_string(&rest[m.end() - 1..])?;
        if label.is_empty() {
            None
        } else {
            Some(label)
        }
    }

    /// Scan every line of `source`, returning labels in source order.
    ///
    /// Lines with the marker but no usable label are skipped with a warning.
    /// No duplicate check happens here; see [`prescan`].
    pub fn extract(&self, source: &str) -> Vec<ScannedLabel> {
        source
            .lines()
            .enumerate()
            .filter(|(_, line)| line.contains(&self.marker))
            .filter_map(|(i, line)| match self.label_in_line(line) {
                Some(label) => {
                    debug!("line {}: caption label '{}'", i + 1, label);
                    Some(ScannedLabel {
                        label,
                        line: i + 1,
                    })
                }
                None => {
                    warn!(
                        "line {}: '{}' found but no quoted label follows it; skipped",
                        i + 1,
                        self.marker
                    );
                    None
                }
            })
            .collect()
    }
}

impl Default for LabelScanner {
    fn default() -> Self {
        DEFAULT_SCANNER.clone()
    }
}

/// Extract labels with the default `cap(` marker.
pub fn extract_labels(source: &str) -> Vec<ScannedLabel> {
    DEFAULT_SCANNER.extract(source)
}

/// Extract labels and reject duplicates.
///
/// Fails on the *second* occurrence of a label with both line numbers, so
/// the author can jump straight to the clash.
pub fn prescan(source: &str, scanner: &LabelScanner) -> Result<Vec<ScannedLabel>, FigrefError> {
    let labels = scanner.extract(source);
    check_unique(&labels)?;
    Ok(labels)
}

/// Reject the first label that appears twice.
pub fn check_unique(labels: &[ScannedLabel]) -> Result<(), FigrefError> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(labels.len());
    for l in labels {
        if let Some(&first_line) = seen.get(l.label.as_str()) {
            return Err(FigrefError::DuplicateLabel {
                label: l.label.clone(),
                first_line,
                second_line: l.line,
            });
        }
        seen.insert(&l.label, l.line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(labels: &[ScannedLabel]) -> Vec<&str> {
        labels.iter().map(|l| l.label.as_str()).collect()
    }

    #[test]
    fn test_extracts_in_source_order() {
        let src = "intro, see {{ ref(\"fig_b\") }}\n\
                   {{ cap(\"fig_a\", \"A\") }}\n\
                   text\n\
                   {{ figure(\"b.png\", cap('fig_b', 'B')) }}\n";
        let labels = extract_labels(src);
        assert_eq!(names(&labels), vec!["fig_a", "fig_b"]);
        assert_eq!(labels[0].line, 2);
        assert_eq!(labels[1].line, 4);
    }

    #[test]
    fn test_one_label_per_line() {
        let src = "{{ cap(\"one\", \"x\") }} and {{ cap(\"two\", \"y\") }}";
        assert_eq!(names(&extract_labels(src)), vec!["one"]);
    }

    #[test]
    fn test_whitespace_between_marker_and_quote() {
        let scanner = LabelScanner::default();
        assert_eq!(
            scanner.label_in_line("cap(   \"spaced\", \"t\")").as_deref(),
            Some("spaced")
        );
    }

    #[test]
    fn test_marker_without_label_skipped() {
        let src = "cap(label_var, \"x\")\ncap(\"\")\ncap(\"ok\")";
        assert_eq!(names(&extract_labels(src)), vec!["ok"]);
    }

    #[test]
    fn test_later_quoted_token_not_taken_when_first_marker_unquoted() {
        // The first marker has no quoted label, so the line yields nothing
        // even though a later marker does.
        let scanner = LabelScanner::default();
        assert_eq!(scanner.label_in_line("cap(x) cap(\"late\")"), None);
    }

    #[test]
    fn test_mixed_quotes_stop_at_matching_quote() {
        let scanner = LabelScanner::default();
        assert_eq!(scanner.label_in_line("cap('it\"s')").as_deref(), Some("it\"s"));
    }

    #[test]
    fn test_label_kept_as_written() {
        let scanner = LabelScanner::default();
        assert_eq!(
            scanner.label_in_line("cap(\" fig_a \", \"A\")").as_deref(),
            Some(" fig_a ")
        );
    }

    #[test]
    fn test_escaped_quote_in_label() {
        let scanner = LabelScanner::default();
        assert_eq!(
            scanner.label_in_line(r#"{{ cap("a\"b", "x") }}"#).as_deref(),
            Some("a\"b")
        );
        // An unterminated label is not a declaration.
        assert_eq!(scanner.label_in_line(r#"cap("a\")"#), None);
    }

    #[test]
    fn test_custom_marker() {
        let scanner = LabelScanner::new("fig_nums(").unwrap();
        let src = "fig.cap = fig_nums(\"fig_sources\", \"Sources\")\ncap(\"ignored\")";
        assert_eq!(names(&scanner.extract(src)), vec!["fig_sources"]);
    }

    #[test]
    fn test_empty_marker_rejected() {
        assert!(matches!(
            LabelScanner::new("  "),
            Err(FigrefError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_duplicate_reports_both_lines() {
        let src = "cap(\"a\")\ncap(\"b\")\ncap(\"a\")";
        let err = prescan(src, &LabelScanner::default()).unwrap_err();
        match err {
            FigrefError::DuplicateLabel {
                label,
                first_line,
                second_line,
            } => {
                assert_eq!(label, "a");
                assert_eq!(first_line, 1);
                assert_eq!(second_line, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_markers_yields_empty() {
        assert!(prescan("plain prose\nno figures", &LabelScanner::default())
            .unwrap()
            .is_empty());
    }
}
