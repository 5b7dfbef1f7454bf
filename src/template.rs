//! The template environment: tera with in-memory template sources.
//!
//! Template identifiers are path keys into a snapshot of the file tree,
//! resolved lazily on first use. Output is deliberately not auto-escaped:
//! templates routinely emit pre-rendered HTML (notably from the `markdown`
//! filter) that must not be escaped a second time.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tera::Tera;

use crate::markdown::MarkdownRenderer;
use crate::tree::{FileTree, Metadata};

#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    #[error("template not found: {0} is not a file in the tree")]
    NotFound(String),

    #[error("template error: {0}")]
    Render(#[from] tera::Error),
}

/// A templating environment over one snapshot of the file tree.
///
/// Exposes two bindings to every template:
/// - the `site` global, holding the full file tree snapshot and the build
///   metadata, so templates can cross-reference other files;
/// - the `markdown` filter, piping a string through [`MarkdownRenderer`].
pub struct TemplateEngine {
    tera: Tera,
    files: Arc<FileTree>,
    site: Value,
}

impl TemplateEngine {
    /// Create an engine resolving templates against `files`.
    pub fn new(files: Arc<FileTree>, metadata: &Metadata, markdown: MarkdownRenderer) -> Self {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.register_filter(
            "markdown",
            move |value: &Value, _args: &HashMap<String, Value>| {
                let source = value
                    .as_str()
                    .ok_or_else(|| tera::Error::msg("markdown filter expects a string"))?;
                Ok(Value::String(markdown.render(source)))
            },
        );

        let site = serde_json::json!({
            "files": files.as_ref(),
            "metadata": metadata,
        });

        Self { tera, files, site }
    }

    /// Render the template at path `template` with the given context
    /// object. The `site` global is injected on top of the context.
    pub fn render(&mut self, template: &str, context: Value) -> Result<String, TemplateError> {
        if !self.tera.templates.contains_key(template) {
            let source = self
                .files
                .get(template)
                .ok_or_else(|| TemplateError::NotFound(template.to_string()))?;
            self.tera.add_raw_template(template, &source.contents)?;
        }

        let mut context = tera::Context::from_value(context)?;
        context.insert("site", &self.site);
        Ok(self.tera.render(template, &context)?)
    }
}
