use std::path::Path;
use std::sync::Arc;

use quest_core::model::Catalog;

use crate::error::CatalogLoadError;

/// Read and validate the task catalog once at startup.
///
/// # Errors
///
/// Returns `CatalogLoadError::Io` if the file cannot be read and
/// `CatalogLoadError::Invalid` if it fails validation.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Arc<Catalog>, CatalogLoadError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| CatalogLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog = Catalog::from_json_str(&source).map_err(|source| CatalogLoadError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        path = %path.display(),
        levels = catalog.len(),
        tasks = catalog.total_tasks(),
        "loaded task catalog"
    );
    Ok(Arc::new(catalog))
}
