//! An in-memory static-site build pipeline.
//!
//! The pipeline transforms a [`FileTree`] (path → file record) in place
//! through three stages:
//!
//! 1. Path normalization ([`paths::normalize_paths`])
//! 2. Metadata-sidecar merging ([`metafiles::apply_metafiles`])
//! 3. Template rendering ([`render::render_all`]), which dispatches every
//!    file to a type-selected template, pipes markdown through an
//!    annotating syntax highlighter, and replaces the tree with the
//!    rendered output tree.
//!
//! The crate owns no I/O: an embedding orchestrator reads sources into the
//! tree beforehand and writes the output tree afterwards. Warnings are
//! emitted on the `tracing` channel and never abort a build; the only
//! fatal condition is a metadata sidecar without a base file.

pub mod highlight;
pub mod markdown;
pub mod metafiles;
pub mod paths;
pub mod render;
pub mod template;
pub mod tree;

pub use markdown::{MarkdownOptions, MarkdownRenderer};
pub use metafiles::{MetafileError, apply_metafiles};
pub use paths::normalize_paths;
pub use render::{RenderConfig, render_all, render_scoped};
pub use template::{TemplateEngine, TemplateError};
pub use tree::{File, FileTree, FileType, Metadata};

/// Run the three pipeline stages in canonical order.
pub fn build(
    files: &mut FileTree,
    metadata: &Metadata,
    config: &RenderConfig,
) -> Result<(), MetafileError> {
    paths::normalize_paths(files);
    metafiles::apply_metafiles(files)?;
    render::render_all(files, metadata, config);
    Ok(())
}
