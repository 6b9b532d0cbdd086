//! The caption registry: label → figure number, for one document render.
//!
//! Numbers are handed out in order of first appearance and never change.
//! Normally every label is registered by the pre-scan ([`CaptionRegistry::prescan`])
//! so forward references work; [`CaptionRegistry::cap`] only assigns a number
//! itself for a label the scan could not see.
//!
//! The registry is an ordinary value. Build one per render and pass it
//! by reference to every caption and reference call; nothing is global.

use crate::caption::{self, Caption, CaptionOptions, CaptionParts};
use crate::error::FigrefError;
use crate::pipeline::scan::{self, LabelScanner, ScannedLabel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Default word in front of every figure number.
pub const DEFAULT_PREFIX: &str = "Figure";

/// Rendered text for a reference that could not be resolved and was not checked.
pub const UNRESOLVED_NUMBER: &str = "??";

/// Options for a figure reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefOptions {
    /// Emit `<a href="#label">Figure N</a>` instead of plain text. Default: false.
    pub link: bool,
    /// Fail on unknown labels. Default: true.
    pub check: bool,
}

impl Default for RefOptions {
    fn default() -> Self {
        Self {
            link: false,
            check: true,
        }
    }
}

impl RefOptions {
    pub fn link(mut self, v: bool) -> Self {
        self.link = v;
        self
    }

    pub fn check(mut self, v: bool) -> Self {
        self.check = v;
        self
    }
}

/// Maps caption labels to sequential figure numbers.
#[derive(Debug, Clone)]
pub struct CaptionRegistry {
    /// Labels in numbering order; `labels[i]` is figure `i + 1`.
    labels: Vec<String>,
    numbers: HashMap<String, usize>,
    prefix: String,
    /// How many labels came from the pre-scan; the rest were assigned late.
    prescanned: usize,
}

impl Default for CaptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptionRegistry {
    /// An empty registry using the `Figure` prefix.
    pub fn new() -> Self {
        Self {
            labels: Vec::new(),
            numbers: HashMap::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            prescanned: 0,
        }
    }

    /// Replace the word printed before figure numbers (e.g. `"Fig."`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Build a registry from an ordered label list; label `i` gets number `i + 1`.
    ///
    /// Fails with [`FigrefError::DuplicateLabel`] without building anything
    /// if a label repeats.
    pub fn from_scanned(labels: &[ScannedLabel]) -> Result<Self, FigrefError> {
        scan::check_unique(labels)?;
        let mut reg = Self::new();
        for l in labels {
            reg.assign(&l.label);
        }
        reg.prescanned = reg.labels.len();
        Ok(reg)
    }

    /// Build a registry from bare labels, treating list position as line number.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, FigrefError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scanned: Vec<ScannedLabel> = labels
            .into_iter()
            .enumerate()
            .map(|(i, l)| ScannedLabel {
                label: l.into(),
                line: i + 1,
            })
            .collect();
        Self::from_scanned(&scanned)
    }

    /// Pre-scan `source` and register every label found, in source order.
    pub fn prescan(source: &str, scanner: &LabelScanner) -> Result<Self, FigrefError> {
        let labels = scan::prescan(source, scanner)?;
        debug!("pre-scan registered {} caption labels", labels.len());
        Self::from_scanned(&labels)
    }

    /// Declare a caption.
    ///
    /// Uses the pre-scanned number for `label`, or assigns the next one if
    /// the pre-scan never saw it. Declaring the same label again returns the
    /// same number.
    pub fn cap(&mut self, label: &str, text: &str, options: &CaptionOptions) -> Caption {
        let number = match self.number(label) {
            Some(n) => n,
            None => {
                let n = self.assign(label);
                warn!(
                    "caption '{}' was not found by the pre-scan; assigned {} {}",
                    label, self.prefix, n
                );
                n
            }
        };

        let anchor = caption::anchor(label);
        let text = caption::caption_span(&self.prefix, number, text, &options.style());

        if options.inline {
            Caption::Inline(format!("{}{}", anchor, text))
        } else {
            Caption::Parts(CaptionParts { anchor, text })
        }
    }

    /// Resolve a reference to `label` as `"Figure N"` or a link to its anchor.
    ///
    /// With `check` set, an unknown label is an
    /// [`FigrefError::UnresolvedReference`]. Without it the number renders
    /// as `??`.
    pub fn reference(&self, label: &str, options: &RefOptions) -> Result<String, FigrefError> {
        let text = match self.number(label) {
            Some(n) => format!("{} {}", self.prefix, n),
            None if options.check => {
                return Err(FigrefError::UnresolvedReference {
                    label: label.to_string(),
                })
            }
            None => {
                warn!("unresolved figure reference '{}' (unchecked)", label);
                format!("{} {}", self.prefix, UNRESOLVED_NUMBER)
            }
        };

        if options.link {
            Ok(format!(
                "<a href=\"#{}\">{}</a>",
                caption::escape_attr(label),
                text
            ))
        } else {
            Ok(text)
        }
    }

    /// The number assigned to `label`, if any.
    pub fn number(&self, label: &str) -> Option<usize> {
        self.numbers.get(label).copied()
    }

    /// `true` when `label` has a number.
    pub fn contains(&self, label: &str) -> bool {
        self.numbers.contains_key(label)
    }

    /// Labels with their numbers, in numbering order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, l)| (i + 1, l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Labels registered by the pre-scan.
    pub fn prescanned(&self) -> usize {
        self.prescanned
    }

    /// Labels assigned during rendering because the pre-scan missed them.
    pub fn late(&self) -> usize {
        self.labels.len() - self.prescanned
    }

    fn assign(&mut self, label: &str) -> usize {
        let n = self.labels.len() + 1;
        self.labels.push(label.to_string());
        self.numbers.insert(label.to_string(), n);
        n
    }
}
