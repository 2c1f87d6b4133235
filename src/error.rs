//! Error types shared by the store, timer, and application layers.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Bad input to create/update. Rejected before any mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Type a task description first")]
    EmptyText,

    #[error("Invalid date '{0}'. Use YYYY-MM-DD (e.g., 2025-10-15)")]
    InvalidDate(String),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No task with id {0}")]
    NotFound(String),

    #[error("Id prefix '{0}' matches more than one task")]
    AmbiguousId(String),

    #[error("Already running; stop '{0}' first")]
    AlreadyRunning(String),

    #[error("No running timer to stop for '{0}'")]
    NotRunning(String),

    #[error("Could not read {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("Could not save to {}: {message}", .path.display())]
    Save { path: PathBuf, message: String },

    #[error("Could not parse timestamp '{0}'")]
    ClockParse(String),
}

impl TrackerError {
    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound(id.to_string())
    }

    pub fn load(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::Load {
            path: path.into(),
            message: format!("{:#}", err),
        }
    }

    pub fn save(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::Save {
            path: path.into(),
            message: format!("{:#}", err),
        }
    }

    /// Persistence failures leave the in-memory state authoritative.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Save { .. })
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
