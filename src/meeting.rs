use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::category::Category;
use crate::errors::MeetlyError;
use crate::geo::Coordinate;
use crate::profile::{Profile, Uid};
use crate::store::{self, Document, FieldOp, StoredDocument};

/// Field holding the uids registered for a meeting.
pub const PARTICIPANTS: &str = "participants";

/// Field holding the category tags.
pub const CATEGORIES: &str = "categories";

/// Who may see a meeting.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Public,
    /// The creator's friends.
    Friends,
    /// Invite only: the creator and current participants.
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Private
    }
}

/// An inclusive age bracket; either end may be open.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AgeRange {
    pub from: Option<i32>,
    pub to: Option<i32>,
}

impl AgeRange {
    pub fn admits(&self, age: i32) -> bool {
        self.from.map_or(true, |from| age >= from) && self.to.map_or(true, |to| age <= to)
    }
}

/// A meeting as stored in the `posts` collection.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    /// The store-assigned document id. Not stored inside the document.
    #[serde(skip)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    pub creator: Uid,

    #[serde(default)]
    pub description: String,

    #[serde(with = "time::serde::timestamp")]
    pub date: OffsetDateTime,

    pub location: Coordinate,

    #[serde(default = "unknown_address")]
    pub address: String,

    #[serde(default)]
    pub categories: BTreeSet<Category>,

    #[serde(default)]
    pub participants: BTreeSet<Uid>,

    /// Zero means unlimited.
    #[serde(default)]
    pub max_participants: u32,

    #[serde(default)]
    pub age_range: Option<AgeRange>,

    #[serde(default)]
    pub visibility: Visibility,
}

fn unknown_address() -> String {
    "Unknown location".to_owned()
}

impl Meeting {
    pub fn from_document(document: StoredDocument) -> Result<Self, MeetlyError> {
        let mut meeting: Meeting = store::from_document(document.fields)?;
        meeting.id = document.id;

        Ok(meeting)
    }

    pub fn to_document(&self) -> Result<Document, MeetlyError> {
        store::to_document(self)
    }

    pub fn is_full(&self) -> bool {
        self.max_participants > 0 && self.participants.len() >= self.max_participants as usize
    }

    /// Whether the participant count exceeds the capacity.
    pub fn is_over_capacity(&self) -> bool {
        self.max_participants > 0 && self.participants.len() > self.max_participants as usize
    }

    /// Whether any category is restricted to adults.
    pub fn adult_only(&self) -> bool {
        self.categories.iter().any(|c| c.adult_only())
    }

    /// Whether any category is in `wanted`. An empty `wanted` matches
    /// everything.
    pub fn matches_categories(&self, wanted: &BTreeSet<Category>) -> bool {
        wanted.is_empty() || !self.categories.is_disjoint(wanted)
    }

    /// Whether `viewer` may see this meeting. `viewer` is `None` for a
    /// caller without a profile.
    pub fn is_visible_to(&self, uid: &str, viewer: Option<&Profile>) -> bool {
        if self.creator == uid || self.participants.contains(uid) {
            return true;
        }

        match self.visibility {
            Visibility::Public => true,
            Visibility::Friends => viewer.map_or(false, |p| p.is_friend(&self.creator)),
            Visibility::Private => false,
        }
    }
}

/// The editable details of a meeting.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeeting {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(with = "time::serde::timestamp")]
    pub date: OffsetDateTime,

    pub location: Coordinate,

    #[serde(default = "unknown_address")]
    pub address: String,

    #[serde(default)]
    pub categories: BTreeSet<Category>,

    #[serde(default)]
    pub max_participants: u32,

    #[serde(default)]
    pub age_range: Option<AgeRange>,

    #[serde(default)]
    pub visibility: Visibility,
}

impl NewMeeting {
    pub fn validate(&self) -> Result<(), MeetlyError> {
        self.location.validate()?;

        if let Some(AgeRange {
            from: Some(from),
            to: Some(to),
        }) = self.age_range
        {
            if from > to {
                return Err(MeetlyError::invalid(format!(
                    "age range {}..={} is empty",
                    from, to
                )));
            }
        }

        Ok(())
    }

    /// Builds a meeting owned by `creator` with no participants.
    pub fn into_meeting(self, creator: Uid) -> Meeting {
        Meeting {
            id: String::new(),
            title: self.title,
            creator,
            description: self.description,
            date: self.date,
            location: self.location,
            address: self.address,
            categories: self.categories,
            participants: BTreeSet::new(),
            max_participants: self.max_participants,
            age_range: self.age_range,
            visibility: self.visibility,
        }
    }

    /// Field operations replacing every editable field, leaving creator
    /// and participants untouched.
    pub fn to_field_ops(&self) -> Result<Vec<FieldOp>, MeetlyError> {
        Ok(store::to_document(self)?
            .into_iter()
            .map(|(field, value)| FieldOp::Set { field, value })
            .collect())
    }
}
