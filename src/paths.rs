//! The path-normalization stage.
//!
//! Re-keys entries whose path uses an OS-style backslash separator.
//! Only the first backslash is replaced (single substitution, not
//! global); deeper paths are left partially normalized.

use tracing::debug;

use crate::tree::FileTree;

/// Rewrite backslash-separated keys to forward-slash form.
pub fn normalize_paths(files: &mut FileTree) {
    let paths: Vec<String> = files
        .keys()
        .filter(|path| path.contains('\\'))
        .cloned()
        .collect();

    for path in paths {
        let normalized = path.replacen('\\', "/", 1);
        debug!("normalizing path {path} -> {normalized}");
        if let Some(file) = files.remove(&path) {
            files.insert(normalized, file);
        }
    }
}
