use thiserror::Error;
use warp::reject;

use crate::friends::Desync;
use crate::profile::Uid;
use crate::store::Collection;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum MeetlyError {
    /// Represents a coordinate, radius or other argument outside its
    /// permitted range. Raised before any I/O.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Represents a call made without an identity.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Represents a transient failure of the store or the location
    /// provider. The caller may retry.
    #[error("Unavailable: {reason}")]
    Unavailable { reason: String },

    /// Represents a missing document.
    #[error("No document {id} in {collection}")]
    NotFound { collection: Collection, id: String },

    /// Represents a precondition that no longer holds.
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// Represents an action on a document the caller does not own.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Represents a mirrored write where only the acting side landed.
    #[error("Partial write: {actor} was updated but {counterpart} was not")]
    PartialWrite {
        actor: Uid,
        counterpart: Uid,
        source: Box<MeetlyError>,
    },

    /// Represents two profiles that disagree about their relationship.
    #[error("Relationship between {} and {} is desynced", .0.first.uid, .0.second.uid)]
    Desynced(Desync),

    /// Represents a stored document that does not decode.
    #[error("Malformed document")]
    Malformed { source: serde_json::Error },

    /// Represents an error from the database driver.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },
}

impl MeetlyError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        MeetlyError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        MeetlyError::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        MeetlyError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        MeetlyError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        MeetlyError::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// Whether the caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MeetlyError::Unavailable { .. } | MeetlyError::Sqlx { .. })
    }
}

impl From<serde_json::Error> for MeetlyError {
    fn from(source: serde_json::Error) -> Self {
        MeetlyError::Malformed { source }
    }
}

impl reject::Reject for MeetlyError {}
