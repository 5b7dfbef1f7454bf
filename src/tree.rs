//! The in-memory file tree and its record types.
//!
//! Every pipeline stage operates on a [`FileTree`]: a mapping from
//! forward-slash path to [`File`] record, mutated in place stage to stage.
//! The B-tree keying gives stages a stable, path-ordered iteration order,
//! which makes output collisions deterministic (last writer in path order
//! wins).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// The file tree driving a build. Keys are forward-slash separated paths.
pub type FileTree = BTreeMap<String, File>;

/// A single file record: contents plus reserved and arbitrary metadata.
///
/// Reserved fields keep their wire names (`pageOutputPath`, `noOutput`, ...)
/// so records round-trip cleanly into template contexts and the `site`
/// global. Everything a metadata sidecar sets that isn't reserved lands in
/// `extra` and is flattened back to the top level on serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct File {
    /// The file payload. Templates read this; passthrough copies it verbatim.
    pub contents: String,

    /// The declared file type tag, if any. See [`FileType::parse`].
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    /// Where the templated page for this file is written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_output_path: Option<String>,

    /// Where the raw contents are written (media and passthrough files).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_output_path: Option<String>,

    /// Suppresses passthrough output for untyped files.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_output: bool,

    /// Render the file through itself instead of an external template.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_external_template: bool,

    /// Explicit template path, overriding the type default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Arbitrary metadata fields, typically merged in from a sidecar.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl File {
    /// Create a record holding just contents, the common starting point
    /// before sidecar metadata is merged in.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            ..Self::default()
        }
    }

    /// Fold a parsed sidecar mapping into this record.
    ///
    /// Reserved keys are routed to their typed fields; anything else goes
    /// into `extra`. A reserved key carrying the wrong kind of value is
    /// skipped with a warning rather than shadowing the typed field.
    pub fn merge(&mut self, values: BTreeMap<String, Value>) {
        for (key, value) in values {
            match key.as_str() {
                "contents" => match value {
                    Value::String(s) => self.contents = s,
                    other => warn_bad_value("contents", &other),
                },
                "type" => match value {
                    Value::String(s) => self.file_type = Some(s),
                    other => warn_bad_value("type", &other),
                },
                "pageOutputPath" => match value {
                    Value::String(s) => self.page_output_path = Some(s),
                    other => warn_bad_value("pageOutputPath", &other),
                },
                "contentOutputPath" => match value {
                    Value::String(s) => self.content_output_path = Some(s),
                    other => warn_bad_value("contentOutputPath", &other),
                },
                "template" => match value {
                    Value::String(s) => self.template = Some(s),
                    other => warn_bad_value("template", &other),
                },
                "noOutput" => match value {
                    Value::Bool(b) => self.no_output = b,
                    other => warn_bad_value("noOutput", &other),
                },
                "noExternalTemplate" => match value {
                    Value::Bool(b) => self.no_external_template = b,
                    other => warn_bad_value("noExternalTemplate", &other),
                },
                _ => {
                    self.extra.insert(key, value);
                }
            }
        }
    }

    /// The parsed file type, if the tag names a recognized type.
    pub fn kind(&self) -> Option<FileType> {
        self.file_type.as_deref().and_then(FileType::parse)
    }
}

fn warn_bad_value(key: &str, value: &Value) {
    warn!("ignoring reserved metadata key '{key}' with unexpected value {value}");
}

/// The recognized file types. Anything else is a passthrough file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Page,
    Index,
    Document,
    Term,
    Image,
    Video,
}

impl FileType {
    /// Parse a type tag. Unknown tags yield `None` (passthrough).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "page" => Some(Self::Page),
            "index" => Some(Self::Index),
            "document" => Some(Self::Document),
            "term" => Some(Self::Term),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// The default template identifier for this type.
    pub fn default_template(self) -> &'static str {
        match self {
            Self::Page => "core/page",
            Self::Index => "core/index",
            Self::Document => "core/document",
            Self::Term => "core/term",
            Self::Image => "core/image",
            Self::Video => "core/video",
        }
    }

    /// Media types write their raw contents alongside the templated page.
    pub fn is_media(self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }
}

/// Build-wide context supplied by the orchestrator, read-only during
/// rendering. Exposed to templates as `site.metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Base URL the site is served from.
    #[serde(rename = "baseURL", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Bundle identifiers, for orchestrators that render bundle by bundle.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bundles: Vec<String>,

    /// Any further orchestrator-supplied context.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
