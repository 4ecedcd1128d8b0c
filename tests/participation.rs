mod common;

use serde_json::json;
use time::macros::date;

use meetly::auth::Caller;
use meetly::category::Category;
use meetly::errors::MeetlyError;
use meetly::meeting::{AgeRange, NewMeeting, Visibility};
use meetly::participation::{
    create_meeting, delete_meeting, edit_meeting, join_meeting, leave_meeting, read_meeting,
};
use meetly::store::Collection;

use common::*;

fn details() -> NewMeeting {
    serde_json::from_value(json!({
        "title": "Board game night",
        "date": 1_720_000_000,
        "location": {"latitude": 45.07, "longitude": 7.69},
        "categories": ["BOARD_GAMES"],
        "maxParticipants": 2,
        "visibility": "PUBLIC",
    }))
    .unwrap()
}

#[tokio::test]
async fn creates_with_the_caller_as_creator() {
    let (environment, store) = memory_environment();

    let meeting = create_meeting(&environment, &caller("carol"), details())
        .await
        .unwrap();

    assert!(!meeting.id.is_empty());
    assert_eq!(meeting.creator, "carol");
    assert!(meeting.participants.is_empty());
    assert_eq!(meeting.address, "Unknown location");

    let stored = read_meeting(&environment, &meeting.id).await.unwrap();
    assert_eq!(stored, meeting);
    assert_eq!(store.len(Collection::Posts), 1);
}

#[tokio::test]
async fn rejects_invalid_meetings() {
    let (environment, store) = memory_environment();

    let result = create_meeting(&environment, &Caller::Anonymous, details()).await;
    assert!(matches!(result, Err(MeetlyError::Unauthenticated)));

    let mut bad = details();
    bad.age_range = Some(AgeRange {
        from: Some(30),
        to: Some(20),
    });
    let result = create_meeting(&environment, &caller("carol"), bad).await;
    assert!(matches!(result, Err(MeetlyError::InvalidArgument { .. })));

    let mut bad = details();
    bad.location = serde_json::from_value(json!({"latitude": 0.0, "longitude": 200.0})).unwrap();
    let result = create_meeting(&environment, &caller("carol"), bad).await;
    assert!(matches!(result, Err(MeetlyError::InvalidArgument { .. })));

    assert!(store.is_empty(Collection::Posts));
}

#[tokio::test]
async fn only_the_creator_edits_and_deletes() {
    let (environment, _store) = memory_environment();
    let meeting = create_meeting(&environment, &caller("carol"), details())
        .await
        .unwrap();

    let mut changes = details();
    changes.title = "Chess".to_owned();

    let result = edit_meeting(&environment, &caller("dave"), &meeting.id, changes.clone()).await;
    assert!(matches!(result, Err(MeetlyError::Forbidden { .. })));

    let edited = edit_meeting(&environment, &caller("carol"), &meeting.id, changes)
        .await
        .unwrap();
    assert_eq!(edited.title, "Chess");
    assert_eq!(edited.creator, "carol");

    let result = delete_meeting(&environment, &caller("dave"), &meeting.id).await;
    assert!(matches!(result, Err(MeetlyError::Forbidden { .. })));

    delete_meeting(&environment, &caller("carol"), &meeting.id)
        .await
        .unwrap();

    let result = read_meeting(&environment, &meeting.id).await;
    assert!(matches!(result, Err(MeetlyError::NotFound { .. })));
}

#[tokio::test]
async fn editing_keeps_participants_and_capacity() {
    let (environment, store) = memory_environment();
    seed_profile(&*store, "dave").await;
    seed_profile(&*store, "erin").await;

    let meeting = create_meeting(&environment, &caller("carol"), details())
        .await
        .unwrap();

    join_meeting(&environment, &caller("dave"), &meeting.id, TODAY).await.unwrap();
    join_meeting(&environment, &caller("erin"), &meeting.id, TODAY).await.unwrap();

    let mut smaller = details();
    smaller.max_participants = 1;
    let result = edit_meeting(&environment, &caller("carol"), &meeting.id, smaller).await;
    assert!(matches!(result, Err(MeetlyError::Conflict { .. })));

    let mut larger = details();
    larger.max_participants = 5;
    let edited = edit_meeting(&environment, &caller("carol"), &meeting.id, larger)
        .await
        .unwrap();

    assert_eq!(edited.max_participants, 5);
    assert_eq!(edited.participants.len(), 2);
}

#[tokio::test]
async fn join_and_leave() {
    let (environment, store) = memory_environment();
    seed_profile(&*store, "dave").await;

    let meeting = create_meeting(&environment, &caller("carol"), details())
        .await
        .unwrap();

    let joined = join_meeting(&environment, &caller("dave"), &meeting.id, TODAY)
        .await
        .unwrap();
    assert!(joined.participants.contains("dave"));

    let again = join_meeting(&environment, &caller("dave"), &meeting.id, TODAY)
        .await
        .unwrap();
    assert_eq!(again.participants.len(), 1);

    leave_meeting(&environment, &caller("dave"), &meeting.id).await.unwrap();
    leave_meeting(&environment, &caller("dave"), &meeting.id).await.unwrap();

    let left = read_meeting(&environment, &meeting.id).await.unwrap();
    assert!(left.participants.is_empty());
}

#[tokio::test]
async fn join_rules() {
    let (environment, store) = memory_environment();
    for uid in &["dave", "erin", "frank"] {
        seed_profile(&*store, uid).await;
    }
    save_profile(&*store, &profile("kid", date!(2010 - 01 - 01))).await;

    let meeting = create_meeting(&environment, &caller("carol"), details())
        .await
        .unwrap();
    let id = meeting.id.as_str();

    let result = join_meeting(&environment, &caller("carol"), id, TODAY).await;
    assert!(matches!(result, Err(MeetlyError::Conflict { .. })));

    let result = join_meeting(&environment, &caller("nobody"), id, TODAY).await;
    assert!(matches!(result, Err(MeetlyError::NotFound { .. })));

    let result = join_meeting(&environment, &caller("dave"), "missing", TODAY).await;
    assert!(matches!(result, Err(MeetlyError::NotFound { .. })));

    join_meeting(&environment, &caller("dave"), id, TODAY).await.unwrap();
    join_meeting(&environment, &caller("erin"), id, TODAY).await.unwrap();

    let result = join_meeting(&environment, &caller("frank"), id, TODAY).await;
    assert!(matches!(result, Err(MeetlyError::Conflict { .. })));

    let mut drinks = details();
    drinks.categories = vec![Category::Alcohol].into_iter().collect();
    let drinks = create_meeting(&environment, &caller("carol"), drinks).await.unwrap();

    let result = join_meeting(&environment, &caller("kid"), &drinks.id, TODAY).await;
    assert!(matches!(result, Err(MeetlyError::Conflict { .. })));
    join_meeting(&environment, &caller("frank"), &drinks.id, TODAY).await.unwrap();

    let mut seniors = details();
    seniors.age_range = Some(AgeRange {
        from: Some(60),
        to: None,
    });
    let seniors = create_meeting(&environment, &caller("carol"), seniors).await.unwrap();

    let result = join_meeting(&environment, &caller("dave"), &seniors.id, TODAY).await;
    assert!(matches!(result, Err(MeetlyError::Conflict { .. })));
}

#[tokio::test]
async fn join_respects_visibility() {
    let (environment, store) = memory_environment();
    seed_profile(&*store, "dave").await;

    let mut friend = profile("erin", date!(1990 - 01 - 01));
    friend.friends.insert("carol".to_owned());
    save_profile(&*store, &friend).await;

    let mut for_friends = details();
    for_friends.visibility = Visibility::Friends;
    let for_friends = create_meeting(&environment, &caller("carol"), for_friends)
        .await
        .unwrap();

    let result = join_meeting(&environment, &caller("dave"), &for_friends.id, TODAY).await;
    assert!(matches!(result, Err(MeetlyError::Forbidden { .. })));
    join_meeting(&environment, &caller("erin"), &for_friends.id, TODAY)
        .await
        .unwrap();

    let mut private = details();
    private.visibility = Visibility::Private;
    let private = create_meeting(&environment, &caller("carol"), private)
        .await
        .unwrap();

    let result = join_meeting(&environment, &caller("erin"), &private.id, TODAY).await;
    assert!(matches!(result, Err(MeetlyError::Forbidden { .. })));
}

#[tokio::test]
async fn concurrent_joins_never_overflow() {
    let (environment, store) = memory_environment();
    let uids = ["u1", "u2", "u3", "u4", "u5"];
    for uid in &uids {
        seed_profile(&*store, uid).await;
    }

    let meeting = create_meeting(&environment, &caller("carol"), details())
        .await
        .unwrap();

    let callers = uids.iter().map(|uid| caller(uid)).collect::<Vec<_>>();
    let results = futures::future::join_all(
        callers
            .iter()
            .map(|c| join_meeting(&environment, c, &meeting.id, TODAY)),
    )
    .await;

    let joined = results.iter().filter(|r| r.is_ok()).count();
    assert!(joined <= 2);

    let stored = read_meeting(&environment, &meeting.id).await.unwrap();
    assert!(stored.participants.len() <= 2);
    assert_eq!(stored.participants.len(), joined);
}
