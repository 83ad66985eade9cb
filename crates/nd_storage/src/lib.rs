use std::path::Path;
use std::sync::Arc;

use nd_core::{ArticleStore, Error, Result};

pub mod backends;

pub use backends::*;

/// Build a store by backend name. `db_path` only matters for file-backed
/// backends.
pub async fn create_store(backend: &str, db_path: &Path) -> Result<Arc<dyn ArticleStore>> {
    match backend {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let store = sqlite::SqliteStore::connect(db_path).await?;
            Ok(Arc::new(store))
        }
        other => Err(Error::Storage(format!(
            "Unknown storage backend: {}",
            other
        ))),
    }
}
