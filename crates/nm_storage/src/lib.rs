use std::sync::Arc;

use nm_core::{Error, Result, Storage};

pub mod backends;

pub use backends::memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use backends::sqlite::SqliteStorage;

/// Build a storage backend by name. `path` is only meaningful for backends
/// with a location on disk.
pub async fn create_storage(kind: &str, path: Option<&str>) -> Result<Arc<dyn Storage>> {
    match kind {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = std::path::PathBuf::from(path.unwrap_or("agents.db"));
            Ok(Arc::new(SqliteStorage::new_with_path(&path).await?))
        }
        other => Err(Error::Storage(format!(
            "unknown storage backend: {}",
            other
        ))),
    }
}
