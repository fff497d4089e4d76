/// In-memory storage backend.
pub mod memory;
/// Database model definitions.
pub mod models;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
/// Party Directory boundary.
pub mod party_directory;
/// Game-post store contract and conditional-update primitives.
pub mod post_store;
/// Storage abstraction layer for database operations.
pub mod storage;
