use kn_core::{ArchiveStorage, Error, Result};
use std::path::Path;
use std::sync::Arc;

pub mod backends;

pub use backends::*;

/// Builds the archive backend named `kind` (`file` or `memory`).
pub fn create_storage(kind: &str, dir: &Path) -> Result<Arc<dyn ArchiveStorage>> {
    match kind {
        "file" => Ok(Arc::new(FileArchive::new(dir))),
        "memory" => Ok(Arc::new(MemoryArchive::new())),
        other => Err(Error::Configuration(format!("Unknown archive backend: {}", other))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::create_storage;
    pub use kn_core::ArchiveStorage;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_storage() {
        let dir = Path::new("archives");
        assert!(create_storage("file", dir).is_ok());
        assert!(create_storage("memory", dir).is_ok());
        assert!(matches!(create_storage("qdrant", dir), Err(Error::Configuration(_))));
    }
}
