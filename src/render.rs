//! The render stage: per-file template dispatch into an output tree.
//!
//! Every file is processed exactly once, in path order, against a snapshot
//! of the input tree taken before rendering begins (so no file observes
//! another file's output, only the pre-render tree via the `site` global).
//! The finished output tree wholesale-replaces the input tree.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::markdown::{MarkdownOptions, MarkdownRenderer};
use crate::template::TemplateEngine;
use crate::tree::{File, FileTree, Metadata};

/// Render stage configuration.
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Feature switches for the `markdown` template filter.
    pub markdown: MarkdownOptions,
}

/// Render every file in the tree, replacing it with the output tree.
///
/// This stage never fails: per-file template errors degrade to empty page
/// output with a warning, and output-path collisions warn and overwrite
/// (deterministically, since files are processed in path order).
pub fn render_all(files: &mut FileTree, metadata: &Metadata, config: &RenderConfig) {
    render_tree(files, metadata, config, None);
}

/// Like [`render_all`], but only files under one of the given bundle
/// prefixes are rendered; everything else is dropped from the output.
pub fn render_scoped(
    files: &mut FileTree,
    metadata: &Metadata,
    config: &RenderConfig,
    bundles: &[String],
) {
    render_tree(files, metadata, config, Some(bundles));
}

fn render_tree(
    files: &mut FileTree,
    metadata: &Metadata,
    config: &RenderConfig,
    scope: Option<&[String]>,
) {
    let snapshot = Arc::new(files.clone());
    let markdown = MarkdownRenderer::new(&config.markdown);
    let mut engine = TemplateEngine::new(snapshot.clone(), metadata, markdown);
    let mut output = OutputTree::default();

    for (path, file) in snapshot.iter() {
        if let Some(bundles) = scope
            && !bundles.iter().any(|bundle| in_bundle(path, bundle))
        {
            continue;
        }
        render_file(path, file, &mut engine, &mut output);
    }

    files.clear();
    files.extend(output.files);
}

fn in_bundle(path: &str, bundle: &str) -> bool {
    path.strip_prefix(bundle)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn render_file(path: &str, file: &File, engine: &mut TemplateEngine, output: &mut OutputTree) {
    let Some(kind) = file.kind() else {
        // Passthrough: copy the record verbatim unless suppressed.
        if file.no_output {
            debug!("{path}: noOutput set, dropping");
        } else if let Some(dest) = &file.content_output_path {
            output.write(path, dest, file.clone());
        } else {
            warn!("{path} has no contentOutputPath, dropping");
        }
        return;
    };

    let template = if file.no_external_template {
        path.to_string()
    } else if let Some(template) = &file.template {
        template.clone()
    } else {
        kind.default_template().to_string()
    };
    debug!("{path}: rendering with template '{template}'");

    let contents = match engine.render(&template, page_context(path, file)) {
        Ok(html) => html,
        Err(e) => {
            warn!("failed to render {path} with template '{template}': {e}");
            String::new()
        }
    };

    match &file.page_output_path {
        Some(dest) => output.write(path, dest, File::with_contents(contents)),
        None => warn!("{path} has no pageOutputPath, skipping page output"),
    }

    // Media files also write the raw asset next to the page wrapper.
    if kind.is_media() {
        match &file.content_output_path {
            Some(dest) => output.write(path, dest, file.clone()),
            None => warn!("{path} has no contentOutputPath, skipping content output"),
        }
    }
}

/// The template's view of a file: its own fields plus `contentPath`.
fn page_context(path: &str, file: &File) -> Value {
    let mut context = match serde_json::to_value(file) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    context.insert("contentPath".to_string(), Value::String(path.to_string()));
    Value::Object(context)
}

/// The output tree under construction, tracking which source wrote each
/// destination so collisions can name both parties.
#[derive(Default)]
struct OutputTree {
    files: FileTree,
    writers: HashMap<String, String>,
}

impl OutputTree {
    fn write(&mut self, source: &str, dest: &str, file: File) {
        if let Some(previous) = self.writers.get(dest) {
            warn!(
                "{source} writes to {dest}, but {previous} already wrote there; overwriting"
            );
        }
        self.writers.insert(dest.to_string(), source.to_string());
        self.files.insert(dest.to_string(), file);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn typed_file(kind: &str, contents: &str, page_out: &str) -> File {
        let mut file = File::with_contents(contents);
        file.file_type = Some(kind.to_string());
        file.page_output_path = Some(page_out.to_string());
        file
    }

    fn render(mut files: FileTree) -> FileTree {
        render_all(&mut files, &Metadata::default(), &RenderConfig::default());
        files
    }

    #[test]
    fn test_page_uses_type_default_template() {
        let mut files = FileTree::new();
        files.insert(
            "core/page".to_string(),
            File::with_contents("[{{ title }}|{{ contents }}|{{ contentPath }}]"),
        );
        let mut page = typed_file("page", "body", "out/p.html");
        page.extra.insert("title".to_string(), json!("Hi"));
        files.insert("p.md".to_string(), page);

        let output = render(files);
        assert_eq!(output["out/p.html"].contents, "[Hi|body|p.md]");
        // Templates themselves are untyped without output paths: dropped.
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_explicit_template_field_wins_over_default() {
        let mut files = FileTree::new();
        files.insert("core/page".to_string(), File::with_contents("default"));
        files.insert("custom/tpl".to_string(), File::with_contents("custom"));
        let mut page = typed_file("page", "", "p.html");
        page.template = Some("custom/tpl".to_string());
        files.insert("p.md".to_string(), page);

        let output = render(files);
        assert_eq!(output["p.html"].contents, "custom");
    }

    #[test]
    fn test_no_external_template_renders_own_contents() {
        let mut files = FileTree::new();
        let mut page = typed_file("page", "self:{{ contentPath }}", "p.html");
        page.no_external_template = true;
        files.insert("p.md".to_string(), page);

        let output = render(files);
        assert_eq!(output["p.html"].contents, "self:p.md");
    }

    #[test]
    fn test_image_writes_page_and_raw_asset() {
        let mut files = FileTree::new();
        files.insert(
            "core/image".to_string(),
            File::with_contents("<img src=\"{{ contentOutputPath }}\">"),
        );
        let mut image = typed_file("image", "rawbytes", "gallery/a.html");
        image.content_output_path = Some("gallery/a.png".to_string());
        files.insert("a.png".to_string(), image);

        let output = render(files);
        assert_eq!(
            output["gallery/a.html"].contents,
            "<img src=\"gallery/a.png\">"
        );
        // The raw asset entry is the original record, verbatim.
        assert_eq!(output["gallery/a.png"].contents, "rawbytes");
        assert_eq!(output["gallery/a.png"].file_type.as_deref(), Some("image"));
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn test_untyped_file_passes_through() {
        let mut files = FileTree::new();
        let mut asset = File::with_contents("css body");
        asset.content_output_path = Some("style.css".to_string());
        files.insert("src/style.css".to_string(), asset);

        let output = render(files);
        assert_eq!(output["style.css"].contents, "css body");
    }

    #[test]
    fn test_untyped_no_output_file_is_dropped() {
        let mut files = FileTree::new();
        let mut hidden = File::with_contents("internal");
        hidden.no_output = true;
        hidden.content_output_path = Some("leak.txt".to_string());
        files.insert("internal.txt".to_string(), hidden);

        let output = render(files);
        assert!(output.is_empty());
    }

    #[test]
    fn test_missing_template_degrades_to_empty_output() {
        let mut files = FileTree::new();
        files.insert("p.md".to_string(), typed_file("page", "body", "p.html"));
        files.insert("core/document".to_string(), File::with_contents("doc"));
        files.insert("d.md".to_string(), typed_file("document", "x", "d.html"));

        let output = render(files);
        // "core/page" is missing: the page still produces (empty) output
        // and the rest of the build continues.
        assert_eq!(output["p.html"].contents, "");
        assert_eq!(output["d.html"].contents, "doc");
    }

    #[test]
    fn test_template_evaluation_error_degrades_to_empty_output() {
        let mut files = FileTree::new();
        files.insert(
            "core/page".to_string(),
            File::with_contents("{{ nope | upper }}"),
        );
        files.insert("p.md".to_string(), typed_file("page", "", "p.html"));

        let output = render(files);
        assert_eq!(output["p.html"].contents, "");
    }

    #[test]
    fn test_collisions_overwrite_in_path_order() {
        let mut files = FileTree::new();
        for (path, contents) in [("a.txt", "A"), ("b.txt", "B")] {
            let mut file = File::with_contents(contents);
            file.content_output_path = Some("same.txt".to_string());
            files.insert(path.to_string(), file);
        }

        let output = render(files);
        // Path order is stable, so the later source wins deterministically.
        assert_eq!(output["same.txt"].contents, "B");
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_templates_see_pre_render_snapshot() {
        let mut files = FileTree::new();
        files.insert(
            "core/page".to_string(),
            File::with_contents("{{ site.files['z.txt'].contents }}"),
        );
        files.insert("p.md".to_string(), typed_file("page", "", "p.html"));
        let mut other = File::with_contents("snapshot");
        other.content_output_path = Some("z.out".to_string());
        files.insert("z.txt".to_string(), other);

        let output = render(files);
        assert_eq!(output["p.html"].contents, "snapshot");
    }

    #[test]
    fn test_scoped_render_only_touches_bundle_files() {
        let mut files = FileTree::new();
        for (path, out) in [("blog/a.txt", "a.out"), ("docs/b.txt", "b.out")] {
            let mut file = File::with_contents("x");
            file.content_output_path = Some(out.to_string());
            files.insert(path.to_string(), file);
        }

        render_scoped(
            &mut files,
            &Metadata::default(),
            &RenderConfig::default(),
            &["blog".to_string()],
        );
        assert!(files.contains_key("a.out"));
        assert!(!files.contains_key("b.out"));
    }

    #[test]
    fn test_bundle_prefix_matches_whole_segment() {
        assert!(in_bundle("blog/a.txt", "blog"));
        assert!(!in_bundle("blogging/a.txt", "blog"));
        assert!(!in_bundle("blog", "blog"));
    }

    #[test]
    fn test_markdown_filter_in_page_template() {
        let mut files = FileTree::new();
        files.insert(
            "core/document".to_string(),
            File::with_contents("<article>{{ contents | markdown }}</article>"),
        );
        files.insert(
            "d.md".to_string(),
            typed_file("document", "# Title\n\ntext", "d.html"),
        );

        let output = render(files);
        let html = &output["d.html"].contents;
        assert!(html.contains("<article>"));
        assert!(html.contains("<h1>Title</h1>"));
    }
}
