use std::sync::Arc;

use quest_core::model::{Catalog, UserId};
use quest_core::unlock::{LevelSummary, summarize_levels};
use storage::repository::ProgressRepository;

use crate::error::LevelServiceError;

/// Builds the level menu from stored progress.
#[derive(Clone)]
pub struct LevelService {
    catalog: Arc<Catalog>,
    progress: Arc<dyn ProgressRepository>,
}

impl LevelService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { catalog, progress }
    }

    /// Completion counts and unlock flags for every level.
    ///
    /// Recomputed from the store on each call.
    ///
    /// # Errors
    ///
    /// Returns `LevelServiceError::Storage` if progress cannot be read.
    pub async fn list_levels(&self, user_id: UserId) -> Result<Vec<LevelSummary>, LevelServiceError> {
        let progress = self.progress.progress_for_user(user_id).await?;
        Ok(summarize_levels(&self.catalog, &progress))
    }
}
