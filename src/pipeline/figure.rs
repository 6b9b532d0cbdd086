//! Rendering hook: wrap a generated plot image in a captioned `<figure>`.
//!
//! ```html
//! <figure style="text-align: center;">
//! <a name="fig_raster"></a>
//! <img src="figures/raster.png">
//! <figcaption><span>Figure 2: Density of institutions</span></figcaption>
//! </figure>
//! ```
//!
//! Images are either linked (`base_url` + path) or embedded as base64
//! `data:` URIs so the rendered report is a single self-contained file.

use crate::caption::{escape_attr, CaptionParts};
use crate::error::FigrefError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Horizontal alignment of a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Align {
    /// No alignment rule; the surrounding stylesheet decides. (default)
    #[default]
    Default,
    Left,
    Center,
    Right,
}

impl Align {
    /// The inline CSS for this alignment; empty for [`Align::Default`].
    pub fn style(&self) -> &'static str {
        match self {
            Align::Default => "",
            Align::Left => "text-align: left;",
            Align::Center => "text-align: center;",
            Align::Right => "text-align: right;",
        }
    }

    /// Parse `default`, `left`, `center`/`centre`, `right`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "default" => Some(Align::Default),
            "left" => Some(Align::Left),
            "center" | "centre" => Some(Align::Center),
            "right" => Some(Align::Right),
            _ => None,
        }
    }
}

/// The caption attached to a figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptionValue {
    /// Anchor + text from a caption declaration.
    Parts(CaptionParts),
    /// Free text with no anchor.
    Raw(String),
}

/// Per-image rendering options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureOptions {
    pub align: Align,
    pub caption: Option<CaptionValue>,
}

/// Where `<img src>` points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// `src` is `base_url` followed by the image path.
    Linked { base_url: String },
    /// The file at `root/path` is inlined as a base64 `data:` URI.
    Embedded { root: PathBuf },
}

impl Default for ImageSource {
    fn default() -> Self {
        ImageSource::Linked {
            base_url: String::new(),
        }
    }
}

impl ImageSource {
    /// Resolve the `src` attribute value for `image`.
    pub fn src(&self, image: &str) -> Result<String, FigrefError> {
        match self {
            ImageSource::Linked { base_url } => Ok(format!("{}{}", base_url, image)),
            ImageSource::Embedded { root } => {
                let path = root.join(image);
                let bytes = std::fs::read(&path)
                    .map_err(|e| FigrefError::ImageReadFailed { path: path.clone(), source: e })?;
                debug!("embedding {} ({} bytes)", path.display(), bytes.len());
                Ok(format!("data:{};base64,{}", mime_for(&path), STANDARD.encode(bytes)))
            }
        }
    }
}

/// Guess an image mime type from the file extension.
fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Wrap `image` in a `<figure>` block.
///
/// The anchor line is left out when there is no anchor, and the `style`
/// attribute when alignment is [`Align::Default`]. Caption text goes into
/// `<figcaption>` verbatim.
pub fn render_figure(
    image: &str,
    options: &FigureOptions,
    source: &ImageSource,
) -> Result<String, FigrefError> {
    let style = options.align.style();
    let (anchor, text) = match options.caption {
        Some(CaptionValue::Parts(ref p)) => (p.anchor.as_str(), p.text.as_str()),
        Some(CaptionValue::Raw(ref s)) => ("", s.as_str()),
        None => ("", ""),
    };
    let src = source.src(image)?;

    let mut html = String::with_capacity(src.len() + text.len() + 96);
    if style.is_empty() {
        html.push_str("<figure>\n");
    } else {
        html.push_str(&format!("<figure style=\"{}\">\n", style));
    }
    if !anchor.is_empty() {
        html.push_str(anchor);
        html.push('\n');
    }
    html.push_str(&format!("<img src=\"{}\">\n", escape_attr(&src)));
    html.push_str(&format!("<figcaption>{}</figcaption>\n", text));
    html.push_str("</figure>");
    Ok(html)
}
