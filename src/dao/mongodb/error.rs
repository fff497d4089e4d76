use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures talking to MongoDB, annotated with the operation that failed.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("missing required environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert game post `{id}`")]
    InsertPost {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load game post `{id}`")]
    LoadPost {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update game post `{id}`")]
    UpdatePost {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete game post `{id}`")]
    DeletePost {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list game posts")]
    ListPosts {
        #[source]
        source: MongoError,
    },
    #[error("failed to expire stale game posts")]
    ExpirePosts {
        #[source]
        source: MongoError,
    },
    #[error("failed to load party `{id}`")]
    LoadParty {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list parties")]
    ListParties {
        #[source]
        source: MongoError,
    },
}
