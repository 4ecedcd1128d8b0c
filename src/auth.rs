use crate::errors::MeetlyError;
use crate::profile::Uid;

/// The principal on whose behalf an operation runs. Authentication
/// itself happens upstream; the core only needs to know whether there is
/// an identity and what it is.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Caller {
    Anonymous,
    Authenticated(Uid),
}

impl Caller {
    pub fn authenticated(uid: impl Into<Uid>) -> Self {
        Caller::Authenticated(uid.into())
    }

    /// Builds a caller from an optional header value. Blank values count
    /// as anonymous.
    pub fn from_header(uid: Option<String>) -> Self {
        match uid {
            Some(uid) if !uid.trim().is_empty() => Caller::Authenticated(uid.trim().to_owned()),
            _ => Caller::Anonymous,
        }
    }

    /// The caller's uid, or `Unauthenticated`.
    pub fn uid(&self) -> Result<&str, MeetlyError> {
        match self {
            Caller::Authenticated(uid) => Ok(uid),
            Caller::Anonymous => Err(MeetlyError::Unauthenticated),
        }
    }
}
