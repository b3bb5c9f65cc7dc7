mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoBattleStore;

use crate::dao::storage::{StorageError, TxError};

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

impl From<MongoDaoError> for TxError {
    fn from(err: MongoDaoError) -> Self {
        TxError::Storage(err.into())
    }
}
