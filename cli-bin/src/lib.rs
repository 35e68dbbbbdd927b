//! filesort CLI – argument definitions and sub-command runners.
//!
//! Exposed as a library so integration tests can drive the runners
//! directly.

pub mod cli;
