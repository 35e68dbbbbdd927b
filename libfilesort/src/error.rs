//! Error types for filesort
//!
//! Startup problems (`Config`, `Attach`) are fatal and stop the process.
//! Everything that can go wrong while handling a single file (`Transient`,
//! `Move`) is reported through an `OrganizeResult` and never stops the
//! watch loop.

use std::fmt;
use std::io;

/// Result type for filesort - convenience wrapper around Result<T, Error>
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// An IO error that has not been classified further
    Io(io::Error),

    /// Invalid configuration (duplicate extension, missing root, ...)
    Config(String),

    /// The event source could not be attached to the watched directory
    Attach(String),

    /// Per-file problem expected to go away on its own (vanished file,
    /// destination race, file still locked)
    Transient(String),

    /// Per-file move failure; the source file is left where it was
    Move(String),

    /// Invalid state for the requested operation
    InvalidState(String),
}

impl Error {
    /// Only configuration and attach errors terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Attach(_))
    }

    /// Short machine-friendly label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Config(_) => "configuration",
            Self::Attach(_) => "attach",
            Self::Transient(_) => "transient",
            Self::Move(_) => "move",
            Self::InvalidState(_) => "invalid_state",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Attach(msg) => write!(f, "Attach error: {}", msg),
            Self::Transient(msg) => write!(f, "Transient file error: {}", msg),
            Self::Move(msg) => write!(f, "Move error: {}", msg),
            Self::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Self::Attach(err.to_string())
    }
}
