use crate::categories::{CategoryTable, ExtensionIndex, DEFAULT_CATCH_ALL};
use crate::debounce::MAX_QUIESCENCE;
use crate::error::Error;
use crate::ignore::{IgnoreList, DEFAULT_IGNORE_PATTERNS};
use crate::utils::{canonicalize_lossy, expand_path};
use crate::watcher::WatcherConfig;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "FILESORT_CONFIG";
pub const DEFAULT_DEBOUNCE_SECONDS: f64 = 2.0;

/// Configuration as written by the user (JSON), before validation.
///
/// Every field is optional in the file; missing ones take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory to organize; `~` is expanded. Defaults to the user's
    /// download directory.
    pub watched_directory: Option<PathBuf>,
    pub debounce_seconds: f64,
    pub categories: BTreeMap<String, Vec<String>>,
    pub catch_all_category: String,
    pub ignore_patterns: Vec<String>,
    pub workers: usize,
    pub max_settle_checks: u32,
}

impl Default for Config {
    fn default() -> Self {
        let categories = CategoryTable::default()
            .iter()
            .map(|(name, exts)| (name.to_string(), exts.iter().cloned().collect()))
            .collect();
        let watcher = WatcherConfig::default();
        Self {
            watched_directory: None,
            debounce_seconds: DEFAULT_DEBOUNCE_SECONDS,
            categories,
            catch_all_category: DEFAULT_CATCH_ALL.to_string(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            workers: watcher.workers,
            max_settle_checks: watcher.max_settle_checks,
        }
    }
}

/// Validated runtime settings. Building one is the startup check: if this
/// succeeds the watcher can be started.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub index: ExtensionIndex,
    pub table: CategoryTable,
    pub ignore: IgnoreList,
    pub watcher: WatcherConfig,
}

impl Config {
    /// Resolve configuration.
    ///
    /// Priority:
    /// 1. `FILESORT_CONFIG` env-var (explicit config file, must exist)
    /// 2. `config.json` in the per-user config dir
    ///    (`~/.config/filesort/config.json` on Linux), if present
    /// 3. Built-in defaults
    pub fn load() -> Result<Self> {
        if let Some(val) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&val));
        }

        if let Some(path) = Self::user_config_path() {
            if path.is_file() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn user_config_path() -> Option<PathBuf> {
        // without HOME / XDG vars ProjectDirs cannot resolve anything useful
        if std::env::var_os("HOME").is_none() && std::env::var_os("XDG_CONFIG_HOME").is_none() {
            return None;
        }
        ProjectDirs::from("io", "Filesort", "filesort").map(|d| d.config_dir().join("config.json"))
    }

    /// `~/Downloads` (or the platform equivalent) when nothing is configured.
    fn default_watched_directory() -> Option<PathBuf> {
        directories::UserDirs::new().and_then(|u| u.download_dir().map(Path::to_path_buf))
    }

    pub fn category_table(&self) -> CategoryTable {
        let mut table = CategoryTable::empty();
        for (name, exts) in &self.categories {
            table.insert(name, exts);
        }
        table
    }

    /// Turn the raw configuration into [`Settings`]. Every failure is an
    /// [`Error::Config`].
    pub fn validate(&self) -> std::result::Result<Settings, Error> {
        let dir = match &self.watched_directory {
            Some(p) => expand_path(p),
            None => Self::default_watched_directory().ok_or_else(|| {
                Error::Config("no watched directory configured and no download dir found".into())
            })?,
        };
        if !dir.exists() {
            return Err(Error::Config(format!(
                "watched directory {} does not exist",
                dir.display()
            )));
        }
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "watched path {} is not a directory",
                dir.display()
            )));
        }

        let debounce = Duration::try_from_secs_f64(self.debounce_seconds)
            .ok()
            .filter(|d| *d <= MAX_QUIESCENCE)
            .ok_or_else(|| {
                Error::Config(format!(
                    "debounce_seconds must be between 0 and {}, got {}",
                    MAX_QUIESCENCE.as_secs(),
                    self.debounce_seconds
                ))
            })?;

        let table = self.category_table();
        let index = ExtensionIndex::build(&table, &self.catch_all_category)?;
        let ignore = IgnoreList::new(self.ignore_patterns.as_slice())?;

        Ok(Settings {
            root: canonicalize_lossy(&dir),
            index,
            table,
            ignore,
            watcher: WatcherConfig {
                debounce,
                workers: self.workers.max(1),
                max_settle_checks: self.max_settle_checks,
            },
        })
    }
}
