//! Category table and the extension index derived from it.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path};

/// Name used when no configured category claims an extension.
pub const DEFAULT_CATCH_ALL: &str = "Other";

const DEFAULT_TABLE: &[(&str, &[&str])] = &[
    (
        "Documents",
        &[
            ".pdf", ".docx", ".txt", ".xlsx", ".csv", ".pptx", ".odt", ".rtf", ".html", ".xml",
        ],
    ),
    ("Videos", &[".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm"]),
    ("Audio", &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma"]),
    (
        "Images",
        &[".png", ".jpeg", ".jpg", ".gif", ".bmp", ".svg", ".tiff", ".webp"],
    ),
];

/// Category name → set of extensions (lower-case, leading dot).
///
/// The table itself accepts anything; uniqueness of extensions across
/// categories is checked when the [`ExtensionIndex`] is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: BTreeMap<String, BTreeSet<String>>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (name, exts) in DEFAULT_TABLE {
            table.insert(*name, exts.iter().copied());
        }
        table
    }
}

impl CategoryTable {
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    /// Add (or extend) a category. Extensions are normalised on the way in.
    pub fn insert<I, S>(&mut self, category: &str, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.categories.entry(category.to_string()).or_default();
        for ext in extensions {
            entry.insert(normalize_extension(ext.as_ref()));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, Vec<S>)> for CategoryTable {
    fn from_iter<T: IntoIterator<Item = (S, Vec<S>)>>(iter: T) -> Self {
        let mut table = Self::empty();
        for (name, exts) in iter {
            table.insert(name.as_ref(), exts);
        }
        table
    }
}

/// Lower-case and make sure there is exactly one leading dot.
/// `"PDF"`, `".pdf"` and `".PDF"` all become `".pdf"`; `""` stays empty.
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return String::new();
    }
    format!(".{}", trimmed.to_lowercase())
}

/// A category name becomes a directory under the watched root, so it has to
/// be exactly one normal path component.
fn validate_category_name(name: &str) -> Result<()> {
    let mut comps = Path::new(name).components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(c)), None) if c == name && !name.trim().is_empty() => Ok(()),
        _ => Err(Error::Config(format!(
            "category name `{name}` must be a single directory name"
        ))),
    }
}

/// Read-only extension → category lookup, built once at startup.
#[derive(Debug, Clone)]
pub struct ExtensionIndex {
    by_extension: HashMap<String, String>,
    catch_all: String,
}

impl ExtensionIndex {
    /// Invert `table`. Fails if any extension belongs to two categories, if
    /// an extension is empty, or if a category name is not a plain name.
    pub fn build(table: &CategoryTable, catch_all: &str) -> Result<Self> {
        validate_category_name(catch_all)?;

        let mut by_extension: HashMap<String, String> = HashMap::new();
        for (category, exts) in table.iter() {
            validate_category_name(category)?;
            for ext in exts {
                if ext.is_empty() {
                    return Err(Error::Config(format!(
                        "category `{category}` lists an empty extension"
                    )));
                }
                if let Some(prev) = by_extension.insert(ext.clone(), category.to_string()) {
                    return Err(Error::Config(format!(
                        "extension `{ext}` is mapped to both `{prev}` and `{category}`"
                    )));
                }
            }
        }

        Ok(Self {
            by_extension,
            catch_all: catch_all.to_string(),
        })
    }

    /// Category for an extension (`".PDF"`, `"pdf"`, ...). Unknown or empty
    /// extensions land in the catch-all category.
    pub fn classify(&self, extension: &str) -> &str {
        let key = normalize_extension(extension);
        self.by_extension
            .get(&key)
            .map(String::as_str)
            .unwrap_or(&self.catch_all)
    }

    pub fn catch_all(&self) -> &str {
        &self.catch_all
    }

    /// Every category a file could end up in, catch-all included.
    pub fn category_names(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.by_extension.values().map(String::as_str).collect();
        names.insert(&self.catch_all);
        names
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}
