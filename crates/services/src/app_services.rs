use std::path::Path;
use std::sync::Arc;

use quest_core::model::Catalog;
use storage::repository::Storage;

use crate::Clock;
use crate::catalog_loader::load_catalog;
use crate::error::AppServicesError;
use crate::level_service::LevelService;
use crate::progress_recorder::ProgressRecorder;
use crate::task_service::TaskService;
use crate::user_service::UserService;

/// Assembles app-facing services around one shared catalog.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<Catalog>,
    levels: Arc<LevelService>,
    tasks: Arc<TaskService>,
    users: Arc<UserService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the catalog cannot be loaded or storage
    /// initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        catalog_path: &Path,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let catalog = load_catalog(catalog_path)?;
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_parts(catalog, &storage, clock))
    }

    /// Wire services over an existing catalog and storage.
    #[must_use]
    pub fn from_parts(catalog: Arc<Catalog>, storage: &Storage, clock: Clock) -> Self {
        let recorder = ProgressRecorder::new(clock, Arc::clone(&storage.progress));
        let tasks = Arc::new(TaskService::new(
            Arc::clone(&catalog),
            Arc::clone(&storage.progress),
            recorder,
        ));
        let levels = Arc::new(LevelService::new(
            Arc::clone(&catalog),
            Arc::clone(&storage.progress),
        ));
        let users = Arc::new(UserService::new(clock, Arc::clone(&storage.users)));

        Self {
            catalog,
            levels,
            tasks,
            users,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn levels(&self) -> Arc<LevelService> {
        Arc::clone(&self.levels)
    }

    #[must_use]
    pub fn tasks(&self) -> Arc<TaskService> {
        Arc::clone(&self.tasks)
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }
}
