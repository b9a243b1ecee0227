//! Result type alias shared across the workspace.
//!
//! This module defines a convenient alias that defaults the error type to the
//! common `SnapshotError`, so functions can simply return `Result<T>`.
use crate::error::SnapshotError;

/// Workspace-wide `Result` alias with `SnapshotError` as the default error.
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;
