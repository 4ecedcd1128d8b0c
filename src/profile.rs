use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::errors::MeetlyError;
use crate::geo::Coordinate;
use crate::normalization;
use crate::store::{self, Document, StoredDocument};

/// Opaque user identifier; the key of a profile document.
pub type Uid = String;

/// Field holding mutual friends.
pub const FRIENDS: &str = "friends";

/// Field holding uids that sent this profile a request.
pub const INCOMING_REQUESTS: &str = "incomingRequests";

/// Field holding uids this profile sent a request to.
pub const OUTGOING_REQUESTS: &str = "outgoingRequests";

/// Field holding the stored location.
pub const LOCATION: &str = "location";

/// Field holding the normalized login.
pub const LOGIN: &str = "login";

/// A user profile as stored in the `users` collection.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// The document id. Not stored inside the document.
    #[serde(skip)]
    pub uid: Uid,

    pub name: String,

    pub surname: String,

    /// Unique after normalization.
    pub login: String,

    /// Free-form "about me" text.
    #[serde(default)]
    pub bio: String,

    #[serde(with = "time::serde::timestamp")]
    pub date_of_birth: OffsetDateTime,

    pub location: Coordinate,

    #[serde(default)]
    pub friends: BTreeSet<Uid>,

    #[serde(default)]
    pub incoming_requests: BTreeSet<Uid>,

    #[serde(default)]
    pub outgoing_requests: BTreeSet<Uid>,
}

impl Profile {
    pub fn from_document(document: StoredDocument) -> Result<Self, MeetlyError> {
        let mut profile: Profile = store::from_document(document.fields)?;
        profile.uid = document.id;

        Ok(profile)
    }

    pub fn to_document(&self) -> Result<Document, MeetlyError> {
        store::to_document(self)
    }

    /// Whole years lived as of `today`.
    pub fn age_on(&self, today: Date) -> i32 {
        age_on(self.date_of_birth.date(), today)
    }

    pub fn is_friend(&self, uid: &str) -> bool {
        self.friends.contains(uid)
    }
}

/// Whole calendar years between `born` and `today`; one less if this
/// year's birthday has not come yet.
pub fn age_on(born: Date, today: Date) -> i32 {
    let mut age = today.year() - born.year();

    if (u8::from(today.month()), today.day()) < (u8::from(born.month()), born.day()) {
        age -= 1;
    }

    age
}

/// The details a user supplies when registering.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub name: String,

    pub surname: String,

    #[serde(deserialize_with = "normalization::deserialize")]
    pub login: String,

    #[serde(default)]
    pub bio: String,

    #[serde(with = "time::serde::timestamp")]
    pub date_of_birth: OffsetDateTime,

    pub location: Coordinate,
}

impl NewProfile {
    /// Builds the stored profile with empty relationship sets.
    pub fn into_profile(self, uid: Uid) -> Profile {
        Profile {
            uid,
            name: normalization::trim_name(&self.name),
            surname: normalization::trim_name(&self.surname),
            login: normalization::normalize_login(&self.login),
            bio: self.bio,
            date_of_birth: self.date_of_birth,
            location: self.location,
            friends: BTreeSet::new(),
            incoming_requests: BTreeSet::new(),
            outgoing_requests: BTreeSet::new(),
        }
    }
}
