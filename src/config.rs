//! Configuration for a document render.
//!
//! All render behaviour is controlled through [`RenderConfig`], built via
//! [`RenderConfigBuilder`]. Callers set only what they care about and rely
//! on the documented defaults for the rest.

use crate::error::FigrefError;
use crate::pipeline::figure::ImageSource;
use crate::pipeline::scan::DEFAULT_MARKER;
use crate::registry::{RefOptions, DEFAULT_PREFIX};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for rendering one document.
///
/// # Example
/// ```rust
/// use edgequake_figref::RenderConfig;
///
/// let config = RenderConfig::builder()
///     .base_url("figures/")
///     .link_refs(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.figure_prefix, "Figure");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Caption-declaration marker the pre-scan looks for. Default: `cap(`.
    ///
    /// Only lines containing this literal text are inspected, and the label
    /// is the first quoted token right after it.
    pub marker: String,

    /// Word printed before every figure number. Default: `Figure`.
    pub figure_prefix: String,

    /// Fail on references to unknown labels. Default: true.
    ///
    /// Turning this off is useful while drafting: unresolved references
    /// render as `Figure ??` and are logged instead of aborting the render.
    pub check_refs: bool,

    /// Render references as links to the figure anchor. Default: false.
    pub link_refs: bool,

    /// Where figure images are loaded from. Default: linked with an empty base URL.
    pub image_source: ImageSource,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            figure_prefix: DEFAULT_PREFIX.to_string(),
            check_refs: true,
            link_refs: false,
            image_source: ImageSource::default(),
        }
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reference options implied by this config, before per-call overrides.
    pub fn ref_options(&self) -> RefOptions {
        RefOptions {
            link: self.link_refs,
            check: self.check_refs,
        }
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.config.marker = marker.into();
        self
    }

    pub fn figure_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.figure_prefix = prefix.into();
        self
    }

    pub fn check_refs(mut self, v: bool) -> Self {
        self.config.check_refs = v;
        self
    }

    pub fn link_refs(mut self, v: bool) -> Self {
        self.config.link_refs = v;
        self
    }

    /// Link images under `base_url` (a plain string prefix, e.g. `"figures/"`).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.image_source = ImageSource::Linked {
            base_url: base_url.into(),
        };
        self
    }

    /// Embed images as `data:` URIs, reading them relative to `root`.
    pub fn embed_images(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.image_source = ImageSource::Embedded { root: root.into() };
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, FigrefError> {
        let c = &self.config;
        if c.marker.trim().is_empty() {
            return Err(FigrefError::InvalidConfig(
                "caption marker must not be empty".into(),
            ));
        }
        if c.figure_prefix.trim().is_empty() {
            return Err(FigrefError::InvalidConfig(
                "figure prefix must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = RenderConfig::default();
        assert_eq!(c.marker, "cap(");
        assert!(c.check_refs);
        assert!(!c.link_refs);
        assert_eq!(
            c.image_source,
            ImageSource::Linked {
                base_url: String::new()
            }
        );
    }

    #[test]
    fn test_builder_rejects_empty_marker() {
        assert!(matches!(
            RenderConfig::builder().marker("").build(),
            Err(FigrefError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_builder_rejects_blank_prefix() {
        assert!(RenderConfig::builder().figure_prefix("  ").build().is_err());
    }

    #[test]
    fn test_last_image_source_wins() {
        let c = RenderConfig::builder()
            .base_url("figs/")
            .embed_images("out")
            .build()
            .unwrap();
        assert_eq!(c.image_source, ImageSource::Embedded { root: "out".into() });
    }

    #[test]
    fn test_ref_options_follow_config() {
        let c = RenderConfig::builder().check_refs(false).link_refs(true).build().unwrap();
        assert_eq!(c.ref_options(), RefOptions { link: true, check: false });
    }

    #[test]
    fn test_serialises_to_json() {
        let json = serde_json::to_string(&RenderConfig::default()).unwrap();
        assert!(json.contains("\"marker\":\"cap(\""), "got: {json}");
    }
}
