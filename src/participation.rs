use log::{debug, info, warn};
use time::Date;

use crate::auth::Caller;
use crate::environment::Environment;
use crate::errors::MeetlyError;
use crate::meeting::{Meeting, NewMeeting, Visibility, PARTICIPANTS};
use crate::profile::Profile;
use crate::store::{Collection, FieldOp};

/// Creates a meeting owned by the caller and returns it with its
/// store-assigned id.
pub async fn create_meeting(
    environment: &Environment,
    caller: &Caller,
    details: NewMeeting,
) -> Result<Meeting, MeetlyError> {
    let uid = caller.uid()?;
    details.validate()?;

    let mut meeting = details.into_meeting(uid.to_owned());
    meeting.id = environment
        .store
        .add(Collection::Posts, meeting.to_document()?)
        .await?;

    info!(environment.logger, "Created meeting"; "uid" => uid, "id" => &meeting.id);

    Ok(meeting)
}

/// Replaces the editable details of a meeting the caller created.
pub async fn edit_meeting(
    environment: &Environment,
    caller: &Caller,
    id: &str,
    details: NewMeeting,
) -> Result<Meeting, MeetlyError> {
    let uid = caller.uid()?;
    details.validate()?;

    let meeting = read_meeting(environment, id).await?;
    check_creator(&meeting, uid)?;

    if details.max_participants > 0 && meeting.participants.len() > details.max_participants as usize {
        return Err(MeetlyError::conflict(format!(
            "{} participants already joined; capacity cannot drop to {}",
            meeting.participants.len(),
            details.max_participants
        )));
    }

    environment
        .store
        .update(Collection::Posts, id, details.to_field_ops()?)
        .await?;

    debug!(environment.logger, "Edited meeting"; "uid" => uid, "id" => id);

    read_meeting(environment, id).await
}

/// Deletes a meeting the caller created.
pub async fn delete_meeting(
    environment: &Environment,
    caller: &Caller,
    id: &str,
) -> Result<(), MeetlyError> {
    let uid = caller.uid()?;

    let meeting = read_meeting(environment, id).await?;
    check_creator(&meeting, uid)?;

    environment.store.delete(Collection::Posts, id).await?;

    info!(environment.logger, "Deleted meeting"; "uid" => uid, "id" => id);

    Ok(())
}

/// Adds the caller to a meeting's participants.
///
/// Joining twice is a no-op. Capacity is checked before the write and
/// again after it; if the meeting overflowed because of a concurrent
/// join, the caller is removed again and the call fails with
/// `Conflict`.
pub async fn join_meeting(
    environment: &Environment,
    caller: &Caller,
    id: &str,
    today: Date,
) -> Result<Meeting, MeetlyError> {
    let uid = caller.uid()?;
    let meeting = read_meeting(environment, id).await?;

    if meeting.participants.contains(uid) {
        return Ok(meeting);
    }

    if meeting.creator == uid {
        return Err(MeetlyError::conflict("the creator cannot join their own meeting"));
    }

    let profile = environment
        .store
        .get(Collection::Users, uid)
        .await?
        .ok_or_else(|| MeetlyError::not_found(Collection::Users, uid))
        .and_then(Profile::from_document)?;

    match meeting.visibility {
        Visibility::Public => {}
        Visibility::Friends if profile.is_friend(&meeting.creator) => {}
        Visibility::Friends => {
            return Err(MeetlyError::forbidden("only the creator's friends may join"));
        }
        Visibility::Private => {
            return Err(MeetlyError::forbidden("the meeting is invite only"));
        }
    }

    let age = profile.age_on(today);

    if meeting.adult_only() && age < environment.config.adult_age {
        return Err(MeetlyError::conflict(format!(
            "must be at least {} years old",
            environment.config.adult_age
        )));
    }

    if let Some(range) = meeting.age_range {
        if !range.admits(age) {
            return Err(MeetlyError::conflict("outside the meeting's age range"));
        }
    }

    if meeting.is_full() {
        return Err(MeetlyError::conflict("the meeting is full"));
    }

    let store = &environment.store;

    store
        .update(Collection::Posts, id, vec![FieldOp::union(PARTICIPANTS, uid)])
        .await?;

    let joined = read_meeting(environment, id).await?;

    if joined.is_over_capacity() {
        warn!(environment.logger, "Meeting overflowed; backing out"; "uid" => uid, "id" => id);

        store
            .update(Collection::Posts, id, vec![FieldOp::remove(PARTICIPANTS, uid)])
            .await?;

        return Err(MeetlyError::conflict("the meeting is full"));
    }

    debug!(environment.logger, "Joined meeting"; "uid" => uid, "id" => id);

    Ok(joined)
}

/// Removes the caller from a meeting's participants. Leaving a meeting
/// the caller never joined is a no-op.
pub async fn leave_meeting(
    environment: &Environment,
    caller: &Caller,
    id: &str,
) -> Result<(), MeetlyError> {
    let uid = caller.uid()?;

    environment
        .store
        .update(Collection::Posts, id, vec![FieldOp::remove(PARTICIPANTS, uid)])
        .await?;

    debug!(environment.logger, "Left meeting"; "uid" => uid, "id" => id);

    Ok(())
}

/// Reads a meeting by id.
pub async fn read_meeting(environment: &Environment, id: &str) -> Result<Meeting, MeetlyError> {
    let document = environment
        .store
        .get(Collection::Posts, id)
        .await?
        .ok_or_else(|| MeetlyError::not_found(Collection::Posts, id))?;

    Meeting::from_document(document)
}

fn check_creator(meeting: &Meeting, uid: &str) -> Result<(), MeetlyError> {
    if meeting.creator == uid {
        Ok(())
    } else {
        Err(MeetlyError::forbidden(format!(
            "only the creator may change meeting {}",
            meeting.id
        )))
    }
}
