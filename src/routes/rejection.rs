use serde::Serialize;
use warp::reject;

use crate::errors::MeetlyError;
use crate::friends::Desync;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: MeetlyError,
}

impl Rejection {
    pub fn new(context: Context, error: MeetlyError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        let desync = match &self.error {
            MeetlyError::Desynced(desync) => Some(desync.clone()),
            _ => None,
        };

        FlattenedRejection {
            context: self.context.clone(),
            message: format!("{}", self.error),
            retryable: self.error.is_retryable(),
            desync,
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
    pub(crate) retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) desync: Option<Desync>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    Meeting { meeting: Option<String> },
    Profile { uid: Option<String> },
    Relationship { other: String, action: String },
    Search { operation: &'static str },
}

impl Context {
    pub fn distance() -> Context {
        Context::Search {
            operation: "distance",
        }
    }

    pub fn meeting(id: Option<String>) -> Context {
        Context::Meeting { meeting: id }
    }

    pub fn nearby() -> Context {
        Context::Search { operation: "nearby" }
    }

    pub fn profile(uid: Option<String>) -> Context {
        Context::Profile { uid }
    }

    pub fn relationship(other: String, action: impl Into<String>) -> Context {
        Context::Relationship {
            other,
            action: action.into(),
        }
    }
}
