//! Names the watcher never touches (in-progress browser downloads etc.).

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::path::Path;

pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "*.crdownload",
    "*.part",
    "*.partial",
    "*.download",
    "*.opdownload",
];

const MATCH_OPTS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Glob patterns matched against the file *name* only.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    patterns: Vec<Pattern>,
}

impl IgnoreList {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| {
                    Error::Config(format!("invalid ignore pattern `{}`: {e}", p.as_ref()))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.patterns
            .iter()
            .any(|p| p.matches_with(name, MATCH_OPTS))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Pattern::as_str)
    }
}
