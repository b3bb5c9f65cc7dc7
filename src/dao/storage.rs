use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result alias for atomic read-modify-write operations.
pub type TxResult<T> = Result<T, TxError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What the backend was doing.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A conditional write kept losing against concurrent writers.
    #[error("write contention on `{id}` after {attempts} attempts")]
    Contention {
        /// Document that kept changing.
        id: Uuid,
        /// Writes attempted before giving up.
        attempts: u32,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Precondition failure raised inside a transaction. Nothing is written when a
/// transaction aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Abort {
    /// No battle with this id.
    #[error("battle `{0}` not found")]
    BattleNotFound(Uuid),
    /// No content with this id.
    #[error("content `{0}` not found")]
    ContentNotFound(Uuid),
    /// The content is deleted or already paired.
    #[error("content `{0}` is no longer available")]
    ContentUnavailable(Uuid),
    /// The content is locked by an ongoing battle.
    #[error("content `{0}` is part of an active battle")]
    ContentInBattle(Uuid),
    /// The caller does not own the content.
    #[error("content `{0}` is not owned by the caller")]
    NotOwner(Uuid),
    /// The battle no longer accepts votes.
    #[error("battle `{0}` has already ended")]
    BattleEnded(Uuid),
    /// The user already took part in the battle.
    #[error("user `{user_id}` already voted on battle `{battle_id}`")]
    AlreadyVoted {
        /// Battle voted on.
        battle_id: Uuid,
        /// Voter.
        user_id: String,
    },
}

/// Outcome of a failed transaction: either a precondition aborted it or the
/// backend could not complete it.
#[derive(Debug, Error)]
pub enum TxError {
    /// A precondition failed.
    #[error(transparent)]
    Aborted(Abort),
    /// The backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<Abort> for TxError {
    fn from(abort: Abort) -> Self {
        TxError::Aborted(abort)
    }
}
