//! Path → category.

use crate::categories::ExtensionIndex;
use std::path::Path;

/// Extension of the final path component, lower-cased, with its leading
/// dot. Empty when the name has none (`README`, `.bashrc`, `report.`).
pub fn extension_of(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        // non-UTF-8 extensions cannot match a configured one
        _ => String::new(),
    }
}

impl ExtensionIndex {
    /// Category the file at `path` belongs to.
    pub fn category_for(&self, path: &Path) -> &str {
        self.classify(&extension_of(path))
    }
}
