pub mod error;
pub mod files;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use files::FileStore;
pub use memory::SearchCache;
pub use sqlite::SqliteStore;
pub use store::{ArtifactStore, NullStore};
