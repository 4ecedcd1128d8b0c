//! The relationship state machine.
//!
//! A relationship between two profiles is stored twice, once in each
//! profile's `friends`, `incomingRequests` and `outgoingRequests` sets,
//! and the two copies must mirror each other. The store offers no
//! cross-document transaction, so every transition is two single
//! document updates: the acting profile first, then the counterpart.
//! Transitions on a pair are serialized through `PairLocks` and re-read
//! both documents before writing.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn, Logger};
use serde::{Deserialize, Serialize};

use crate::auth::Caller;
use crate::environment::Environment;
use crate::errors::MeetlyError;
use crate::locks::PairGuard;
use crate::profile::{Profile, Uid, FRIENDS, INCOMING_REQUESTS, OUTGOING_REQUESTS};
use crate::store::{Collection, FieldOp};

/// The relationship from one profile's point of view.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationState {
    None,
    /// This profile requested the other.
    Outgoing,
    /// The other profile requested this one.
    Incoming,
    Friends,
}

impl RelationState {
    /// The state the other side must hold.
    pub fn mirror(self) -> Self {
        match self {
            RelationState::Outgoing => RelationState::Incoming,
            RelationState::Incoming => RelationState::Outgoing,
            state => state,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RelationState::None => "NONE",
            RelationState::Outgoing => "OUTGOING",
            RelationState::Incoming => "INCOMING",
            RelationState::Friends => "FRIENDS",
        }
    }

    fn field(self) -> Option<&'static str> {
        match self {
            RelationState::None => None,
            RelationState::Outgoing => Some(OUTGOING_REQUESTS),
            RelationState::Incoming => Some(INCOMING_REQUESTS),
            RelationState::Friends => Some(FRIENDS),
        }
    }
}

impl fmt::Display for RelationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one profile's sets say about another uid.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// The profile making the claim.
    pub uid: Uid,
    /// The profile the claim is about.
    pub about: Uid,
    pub friends: bool,
    pub incoming: bool,
    pub outgoing: bool,
}

impl Claim {
    pub fn of(profile: &Profile, other: &str) -> Self {
        Claim {
            uid: profile.uid.clone(),
            about: other.to_owned(),
            friends: profile.friends.contains(other),
            incoming: profile.incoming_requests.contains(other),
            outgoing: profile.outgoing_requests.contains(other),
        }
    }

    /// The single state this claim amounts to, or `None` when the uid
    /// sits in more than one set.
    pub fn state(&self) -> Option<RelationState> {
        match (self.friends, self.incoming, self.outgoing) {
            (false, false, false) => Some(RelationState::None),
            (true, false, false) => Some(RelationState::Friends),
            (false, true, false) => Some(RelationState::Incoming),
            (false, false, true) => Some(RelationState::Outgoing),
            _ => None,
        }
    }
}

/// Two claims that do not mirror each other.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Desync {
    pub first: Claim,
    pub second: Claim,
}

/// The observed relationship between two profiles.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Relationship {
    /// Both sides agree; the state is from the first profile's view.
    Settled(RelationState),
    Desynced(Desync),
}

/// Compares what `first` says about `second` with the reverse.
pub fn observe(first: &Profile, second: &Profile) -> Relationship {
    let a = Claim::of(first, &second.uid);
    let b = Claim::of(second, &first.uid);

    match (a.state(), b.state()) {
        (Some(x), Some(y)) if y == x.mirror() => Relationship::Settled(x),
        _ => Relationship::Desynced(Desync {
            first: a,
            second: b,
        }),
    }
}

/// A requested change, named from the acting profile's side.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Send a friend request.
    Request,
    /// Withdraw a sent request.
    Cancel,
    /// Accept a received request.
    Accept,
    /// Turn down a received request.
    Decline,
    Unfriend,
}

impl Action {
    /// The actor's state required before the action.
    pub fn from(self) -> RelationState {
        match self {
            Action::Request => RelationState::None,
            Action::Cancel => RelationState::Outgoing,
            Action::Accept | Action::Decline => RelationState::Incoming,
            Action::Unfriend => RelationState::Friends,
        }
    }

    /// The actor's state after the action.
    pub fn to(self) -> RelationState {
        match self {
            Action::Request => RelationState::Outgoing,
            Action::Accept => RelationState::Friends,
            Action::Cancel | Action::Decline | Action::Unfriend => RelationState::None,
        }
    }

    /// Whether a half-written instance of this action can be recognized
    /// from the documents alone. An interrupted decline by one side leaves
    /// the same shape as an interrupted request by the other, so a decline
    /// is never resumed.
    pub fn resumable(self) -> bool {
        self != Action::Decline
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Request => "request",
            Action::Cancel => "cancel",
            Action::Accept => "accept",
            Action::Decline => "decline",
            Action::Unfriend => "unfriend",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = MeetlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(Action::Request),
            "cancel" => Ok(Action::Cancel),
            "accept" => Ok(Action::Accept),
            "decline" => Ok(Action::Decline),
            "unfriend" => Ok(Action::Unfriend),
            other => Err(MeetlyError::invalid(format!("unknown action {:?}", other))),
        }
    }
}

/// The result of a transition or repair.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct TransitionOutcome {
    /// The caller's state afterwards.
    pub state: RelationState,
    /// Whether anything was written.
    pub changed: bool,
}

/// Which documents still need writing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Writes {
    Both,
    /// The actor's document already holds the target; a previous attempt
    /// stopped after its first write.
    CounterpartOnly,
}

/// Reads the relationship between the caller and `other`.
pub async fn relationship_state(
    environment: &Environment,
    caller: &Caller,
    other: &str,
) -> Result<Relationship, MeetlyError> {
    let uid = caller.uid()?;
    check_pair(uid, other)?;

    let (first, second) = read_pair(environment, uid, other).await?;
    let relationship = observe(&first, &second);

    if let Relationship::Desynced(desync) = &relationship {
        warn!(environment.logger, "Relationship is desynced"; "uid" => uid, "other" => other, "desync" => ?desync);
    }

    Ok(relationship)
}

/// Applies `action` by the caller towards `other`.
///
/// Re-issuing an action whose target state already holds returns
/// `changed: false`. When the observed state is neither the source nor
/// the target of the action, the call fails with `Conflict`. If the
/// counterpart's document could not be written after the caller's was,
/// the call fails with `PartialWrite`; issuing the same action again
/// completes it, except for `Decline`, which leaves the pair `Desynced`
/// until repaired.
pub async fn transition(
    environment: &Environment,
    caller: &Caller,
    other: &str,
    action: Action,
) -> Result<TransitionOutcome, MeetlyError> {
    let uid = caller.uid()?;
    check_pair(uid, other)?;

    let logger = &environment.logger;
    let (from, to) = (action.from(), action.to());

    debug!(logger, "Relationship transition"; "uid" => uid, "other" => other, "action" => %action);

    let guard = environment.locks.lock(uid, other).await;
    let (actor, counterpart) = read_pair(environment, uid, other).await?;

    let writes = match observe(&actor, &counterpart) {
        Relationship::Settled(state) if state == to => {
            debug!(logger, "Transition already applied"; "uid" => uid, "other" => other, "action" => %action);

            return Ok(TransitionOutcome {
                state,
                changed: false,
            });
        }
        Relationship::Settled(state) if state == from => Writes::Both,
        Relationship::Settled(state) => {
            return Err(MeetlyError::conflict(format!(
                "cannot {} while the relationship is {}",
                action, state
            )));
        }
        Relationship::Desynced(desync)
            if action.resumable()
                && desync.first.state() == Some(to)
                && desync.second.state() == Some(from.mirror()) =>
        {
            info!(logger, "Resuming interrupted transition"; "uid" => uid, "other" => other, "action" => %action);
            Writes::CounterpartOnly
        }
        Relationship::Desynced(desync) => {
            warn!(logger, "Relationship is desynced"; "uid" => uid, "other" => other, "desync" => ?desync);
            return Err(MeetlyError::Desynced(desync));
        }
    };

    write_pair(environment, guard, uid, other, to, writes).await?;

    info!(logger, "Relationship changed"; "uid" => uid, "other" => other, "action" => %action, "state" => %to);

    Ok(TransitionOutcome {
        state: to,
        changed: true,
    })
}

pub async fn request_friend(
    environment: &Environment,
    caller: &Caller,
    other: &str,
) -> Result<TransitionOutcome, MeetlyError> {
    transition(environment, caller, other, Action::Request).await
}

pub async fn cancel_request(
    environment: &Environment,
    caller: &Caller,
    other: &str,
) -> Result<TransitionOutcome, MeetlyError> {
    transition(environment, caller, other, Action::Cancel).await
}

pub async fn accept_request(
    environment: &Environment,
    caller: &Caller,
    other: &str,
) -> Result<TransitionOutcome, MeetlyError> {
    transition(environment, caller, other, Action::Accept).await
}

pub async fn decline_request(
    environment: &Environment,
    caller: &Caller,
    other: &str,
) -> Result<TransitionOutcome, MeetlyError> {
    transition(environment, caller, other, Action::Decline).await
}

pub async fn unfriend(
    environment: &Environment,
    caller: &Caller,
    other: &str,
) -> Result<TransitionOutcome, MeetlyError> {
    transition(environment, caller, other, Action::Unfriend).await
}

/// Forces the caller's view of `other` to `target` and the other side to
/// its mirror, whatever the documents currently hold.
pub async fn repair(
    environment: &Environment,
    caller: &Caller,
    other: &str,
    target: RelationState,
) -> Result<TransitionOutcome, MeetlyError> {
    let uid = caller.uid()?;
    check_pair(uid, other)?;

    let guard = environment.locks.lock(uid, other).await;
    let (actor, counterpart) = read_pair(environment, uid, other).await?;
    let before = observe(&actor, &counterpart);

    if before == Relationship::Settled(target) {
        return Ok(TransitionOutcome {
            state: target,
            changed: false,
        });
    }

    warn!(environment.logger, "Repairing relationship"; "uid" => uid, "other" => other, "before" => ?before, "target" => %target);

    write_pair(environment, guard, uid, other, target, Writes::Both).await?;

    Ok(TransitionOutcome {
        state: target,
        changed: true,
    })
}

fn check_pair(uid: &str, other: &str) -> Result<(), MeetlyError> {
    if uid == other {
        Err(MeetlyError::invalid("a profile has no relationship with itself"))
    } else if other.is_empty() {
        Err(MeetlyError::invalid("missing counterpart uid"))
    } else {
        Ok(())
    }
}

async fn read_pair(
    environment: &Environment,
    first: &str,
    second: &str,
) -> Result<(Profile, Profile), MeetlyError> {
    Ok((
        read_profile(environment, first).await?,
        read_profile(environment, second).await?,
    ))
}

async fn read_profile(environment: &Environment, uid: &str) -> Result<Profile, MeetlyError> {
    let document = environment
        .store
        .get(Collection::Users, uid)
        .await?
        .ok_or_else(|| MeetlyError::not_found(Collection::Users, uid))?;

    Profile::from_document(document)
}

/// Moves `other` into the set matching `state` and out of the other two.
fn placement(other: &str, state: RelationState) -> Vec<FieldOp> {
    [FRIENDS, INCOMING_REQUESTS, OUTGOING_REQUESTS]
        .iter()
        .map(|&field| {
            if state.field() == Some(field) {
                FieldOp::union(field, other)
            } else {
                FieldOp::remove(field, other)
            }
        })
        .collect()
}

/// Writes the actor's side (unless already done) and then the
/// counterpart's. The writes run on their own task holding the pair
/// lock, so dropping the caller's future cannot stop between them.
async fn write_pair(
    environment: &Environment,
    guard: PairGuard,
    actor: &str,
    counterpart: &str,
    state: RelationState,
    writes: Writes,
) -> Result<(), MeetlyError> {
    let store = environment.store.clone();
    let logger: Logger = (*environment.logger).clone();
    let actor = actor.to_owned();
    let counterpart = counterpart.to_owned();

    let task = tokio::spawn(async move {
        let _guard = guard;

        if writes == Writes::Both {
            store
                .update(Collection::Users, &actor, placement(&counterpart, state))
                .await?;
        }

        if let Err(source) = store
            .update(Collection::Users, &counterpart, placement(&actor, state.mirror()))
            .await
        {
            warn!(logger, "Counterpart write failed"; "actor" => &actor, "counterpart" => &counterpart, "error" => %source);

            return Err(MeetlyError::PartialWrite {
                actor,
                counterpart,
                source: Box::new(source),
            });
        }

        Ok(())
    });

    task.await
        .map_err(|e| MeetlyError::unavailable(format!("relationship write task failed: {}", e)))?
}
