//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use quest_core::model::{CatalogError, RegistrationError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while reading the task catalog from disk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogLoadError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid catalog {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: CatalogError,
    },
}

/// Errors emitted by `TaskService` and `ProgressRecorder`.
///
/// Locked and missing tasks are outcomes, not errors; only persistence
/// failures end up here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LevelService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LevelServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),
}
