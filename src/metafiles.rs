//! The metadata-sidecar merge stage.
//!
//! A sidecar `foo.md.meta.yml` holds YAML metadata for `foo.md`. This
//! stage merges every sidecar into its base record and removes the
//! sidecar entry from the tree. Once no sidecars remain, the stage is a
//! no-op, so running it twice is safe.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::tree::FileTree;

/// The naming convention marking a file as a metadata sidecar.
pub const METAFILE_SUFFIX: &str = ".meta.yml";

#[derive(thiserror::Error, Debug)]
pub enum MetafileError {
    #[error("no corresponding file for the metafile {0}")]
    MissingBase(String),

    #[error("invalid metafile {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Merge every metadata sidecar into its base file.
///
/// Fails fatally when a sidecar has no base file or does not parse as a
/// YAML mapping; everything else in the pipeline degrades, but a sidecar
/// pointing at nothing is a build misconfiguration.
pub fn apply_metafiles(files: &mut FileTree) -> Result<(), MetafileError> {
    let meta_paths: Vec<String> = files
        .keys()
        .filter(|path| path.ends_with(METAFILE_SUFFIX))
        .cloned()
        .collect();

    for meta_path in meta_paths {
        let base_path = meta_path
            .split(METAFILE_SUFFIX)
            .next()
            .unwrap_or(&meta_path)
            .to_string();
        debug!("applying metafile {meta_path} to {base_path}");

        if !files.contains_key(&base_path) {
            return Err(MetafileError::MissingBase(meta_path));
        }
        let Some(metafile) = files.remove(&meta_path) else {
            continue;
        };
        let values: BTreeMap<String, Value> =
            serde_yaml::from_str(&metafile.contents).map_err(|source| MetafileError::Parse {
                path: meta_path,
                source,
            })?;

        if let Some(base) = files.get_mut(&base_path) {
            base.merge(values);
        }
    }

    Ok(())
}
