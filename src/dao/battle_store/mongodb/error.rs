use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failure raised by the MongoDB store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Rejected connection string.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The client could not be built.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings attempted.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A content insert failed.
    #[error("failed to save content `{id}`")]
    SaveContent {
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A content read failed.
    #[error("failed to load content `{id}`")]
    LoadContent {
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A content query failed.
    #[error("failed to query contents")]
    QueryContents {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A battle read failed.
    #[error("failed to load battle `{id}`")]
    LoadBattle {
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A battle write failed.
    #[error("failed to save battle `{id}`")]
    SaveBattle {
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A battle query failed.
    #[error("failed to query battles")]
    QueryBattles {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The pair commit transaction failed.
    #[error("pair commit transaction for battle `{id}` failed")]
    PairTransaction {
        /// Document id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
