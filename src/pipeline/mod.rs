//! Pipeline stages for rendering a report document.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ scan ──▶ directive ──▶ (registry) ──▶ figure
//! (text)    (labels)  (parse {{ }})  (numbers)     (<figure> HTML)
//! ```
//!
//! 1. [`scan`]     : line-level pre-scan for caption labels; rejects duplicates
//! 2. [`directive`]: split lines into text / `{{ ... }}` segments and parse calls
//! 3. [`figure`]   : wrap an image and its caption in a `<figure>` block
//!
//! Numbering itself lives in [`crate::registry`]; the orchestration that
//! strings the stages together lives in [`crate::render`].

pub mod directive;
pub mod figure;
pub mod scan;
