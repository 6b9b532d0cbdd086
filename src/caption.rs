//! Caption markup: anchors, styled caption spans and the two output shapes
//! returned by [`crate::registry::CaptionRegistry::cap`].
//!
//! A caption is always two pieces of HTML:
//!
//! ```text
//! <a name="fig_raster"></a>                      ← anchor (link target)
//! <span style="color: gray;">Figure 2: …</span>  ← caption text
//! ```
//!
//! Inline prose wants them glued together; the figure hook in
//! [`crate::pipeline::figure`] wants them apart so the anchor lands inside `<figure>`
//! and the text inside `<figcaption>`.

use serde::{Deserialize, Serialize};

/// Rendering options for a caption declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionOptions {
    /// Center the caption text. Default: false.
    pub center: bool,
    /// CSS colour for the caption text, e.g. `"gray"`. Default: none.
    pub color: Option<String>,
    /// Return anchor + text as one string instead of separate parts. Default: true.
    pub inline: bool,
}

impl Default for CaptionOptions {
    fn default() -> Self {
        Self {
            center: false,
            color: None,
            inline: true,
        }
    }
}

impl CaptionOptions {
    pub fn center(mut self, v: bool) -> Self {
        self.center = v;
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn inline(mut self, v: bool) -> Self {
        self.inline = v;
        self
    }

    /// The inline CSS for the caption span; empty when no styling applies.
    pub fn style(&self) -> String {
        let mut rules = Vec::with_capacity(2);
        if self.center {
            rules.push("text-align: center;".to_string());
        }
        if let Some(ref c) = self.color {
            rules.push(format!("color: {};", c));
        }
        rules.join(" ")
    }
}

/// Anchor and caption text kept apart, for the figure hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionParts {
    /// `<a name="label"></a>`
    pub anchor: String,
    /// `<span>Figure N: text</span>`
    pub text: String,
}

/// Output of a caption declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Caption {
    /// Anchor immediately followed by the caption text.
    Inline(String),
    /// Anchor and caption text as separate fields.
    Parts(CaptionParts),
}

impl Caption {
    /// Flatten into a single HTML string (anchor first).
    pub fn into_html(self) -> String {
        match self {
            Caption::Inline(s) => s,
            Caption::Parts(p) => format!("{}{}", p.anchor, p.text),
        }
    }
}

/// Build the link-target anchor for a label.
pub fn anchor(label: &str) -> String {
    format!("<a name=\"{}\"></a>", escape_attr(label))
}

/// Build the caption span. `style` may be empty, in which case no
/// `style` attribute is written.
pub fn caption_span(prefix: &str, number: usize, text: &str, style: &str) -> String {
    if style.is_empty() {
        format!("<span>{} {}: {}</span>", prefix, number, text)
    } else {
        format!(
            "<span style=\"{}\">{} {}: {}</span>",
            escape_attr(style),
            prefix,
            number,
            text
        )
    }
}

/// Escape a value for use inside a double-quoted HTML attribute.
pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
