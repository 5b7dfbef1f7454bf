//! Markdown rendering with annotated syntax highlighting.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};

use crate::highlight;

/// Markdown feature switches, passed explicitly instead of configured
/// through process-wide state.
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// GitHub-flavored markdown extensions.
    pub gfm: bool,
    /// Table support.
    pub tables: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            gfm: true,
            tables: true,
        }
    }
}

/// Renders markdown to HTML, delegating fenced code blocks (with their
/// full fence info string) to [`highlight::highlight`].
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    /// Create a renderer with the given feature switches.
    pub fn new(config: &MarkdownOptions) -> Self {
        let mut options = Options::empty();
        if config.gfm {
            options.insert(Options::ENABLE_GFM);
        }
        if config.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        Self { options }
    }

    /// Render markdown source to an HTML fragment.
    pub fn render(&self, source: &str) -> String {
        let parser = Parser::new_ext(source, self.options);

        // Intercept code blocks, buffering their text until the end tag.
        let mut in_code_block = false;
        let mut code_tag = String::new();
        let mut code_content = String::new();

        let events: Vec<Event> = parser
            .flat_map(|event| match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_tag = match kind {
                        CodeBlockKind::Fenced(tag) => tag.to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_content.clear();
                    vec![]
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let highlighted = highlight::highlight(&code_content, &code_tag);
                    vec![Event::Html(highlighted.into())]
                }
                Event::Text(text) if in_code_block => {
                    code_content.push_str(&text);
                    vec![]
                }
                _ => vec![event],
            })
            .collect();

        let mut output = String::new();
        html::push_html(&mut output, events.into_iter());
        output
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(&MarkdownOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::default();
        let html = renderer.render("# Hello\n\nWorld");
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<p>World</p>"));
    }

    #[test]
    fn test_fenced_block_goes_through_highlighter() {
        let renderer = MarkdownRenderer::default();
        let html = renderer.render("```text\nplain code\n```");
        assert!(html.contains("<div class=\"highlight\">"));
        assert!(html.contains("plain code"));
    }

    #[test]
    fn test_fence_tag_suffixes_reach_highlighter() {
        let renderer = MarkdownRenderer::default();
        let html = renderer.render("```#3\na\nb\n```");
        assert!(html.contains("<div class=\"line-numbers\">"));
        assert!(html.contains("3\n4"));
    }

    #[test]
    fn test_tables_enabled() {
        let renderer = MarkdownRenderer::default();
        let html = renderer.render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_tables_disabled() {
        let renderer = MarkdownRenderer::new(&MarkdownOptions {
            gfm: false,
            tables: false,
        });
        let html = renderer.render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn test_indented_block_uses_empty_tag() {
        let renderer = MarkdownRenderer::default();
        let html = renderer.render("    let x = 1;\n");
        assert!(html.contains("<div class=\"highlight\">"));
        assert!(html.contains("let x = 1;"));
    }
}
