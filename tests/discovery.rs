mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;

use meetly::auth::Caller;
use meetly::category::Category;
use meetly::discovery::{find_nearby, find_nearby_from, resolve_origin};
use meetly::errors::MeetlyError;
use meetly::geo::Coordinate;
use meetly::location::{OriginSource, ReportedLocation};
use meetly::meeting::Visibility;

use common::*;

fn no_categories() -> BTreeSet<Category> {
    BTreeSet::new()
}

fn ids(found: &[meetly::discovery::NearbyMeeting]) -> Vec<&str> {
    found.iter().map(|m| m.id.as_str()).collect()
}

#[tokio::test]
async fn finds_meetings_inside_the_box() {
    let (environment, store) = memory_environment();
    seed_profile(&*store, "alice").await;

    let near = seed_meeting(&*store, &meeting("bob", coordinate(0.5, 0.0))).await;
    seed_meeting(&*store, &meeting("bob", coordinate(2.0, 2.0))).await;

    let found = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, 0.0),
        100.0,
        &no_categories(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&found), vec![near.as_str()]);
    assert!((found[0].distance_m - 55_597.0).abs() < 5.0);
    assert_eq!(
        found[0].image.as_str(),
        format!("https://images.example.com/posts/{}/photo.jpeg", near)
    );
}

#[tokio::test]
async fn skips_undecodable_meetings() {
    let (environment, store) = memory_environment();

    let valid = seed_meeting(&*store, &meeting("bob", coordinate(0.5, 0.0))).await;
    seed_raw_meeting(&*store, json!({"location": {"latitude": 0.1, "longitude": 0.1}})).await;

    let found = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, 0.0),
        100.0,
        &no_categories(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&found), vec![valid.as_str()]);
}

#[tokio::test]
async fn sorts_nearest_first() {
    let (environment, store) = memory_environment();

    let far = seed_meeting(&*store, &meeting("bob", coordinate(0.0, 0.8))).await;
    let nearest = seed_meeting(&*store, &meeting("bob", coordinate(0.1, 0.0))).await;
    let middle = seed_meeting(&*store, &meeting("bob", coordinate(-0.4, 0.0))).await;

    let found = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, 0.0),
        100.0,
        &no_categories(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&found), vec![nearest.as_str(), middle.as_str(), far.as_str()]);
}

#[tokio::test]
async fn box_corners_are_not_trimmed_by_distance() {
    let (environment, store) = memory_environment();

    // about 125 km away, but inside the 100 km box
    let corner = seed_meeting(&*store, &meeting("bob", coordinate(0.8, 0.8))).await;

    let found = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, 0.0),
        100.0,
        &no_categories(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&found), vec![corner.as_str()]);
    assert!(found[0].distance_m > 100_000.0);
}

#[tokio::test]
async fn filters_by_category() {
    let (environment, store) = memory_environment();
    let here = coordinate(0.1, 0.1);

    let party = seed_meeting(
        &*store,
        &with_categories(meeting("bob", here), &[Category::Party, Category::Movies]),
    )
    .await;
    let hike = seed_meeting(&*store, &with_categories(meeting("bob", here), &[Category::Outdoors])).await;
    let untagged = seed_meeting(&*store, &meeting("bob", here)).await;

    let wanted = vec![Category::Party].into_iter().collect();
    let found = find_nearby(&environment, &caller("alice"), coordinate(0.0, 0.0), 50.0, &wanted)
        .await
        .unwrap();

    assert_eq!(ids(&found), vec![party.as_str()]);

    let mut all = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, 0.0),
        50.0,
        &no_categories(),
    )
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.id)
    .collect::<Vec<_>>();
    all.sort();

    let mut expected = vec![party, hike, untagged];
    expected.sort();

    assert_eq!(all, expected);
}

#[tokio::test]
async fn filters_categories_on_the_client_when_the_store_cannot() {
    let store = Arc::new(FlakyStore::without_array_contains_any());
    let environment = environment_with(store.clone());
    let here = coordinate(0.1, 0.1);

    let swim = seed_meeting(&store.inner, &with_categories(meeting("bob", here), &[Category::Swim])).await;
    seed_meeting(&store.inner, &with_categories(meeting("bob", here), &[Category::VideoGames])).await;

    let wanted = vec![Category::Swim, Category::Event].into_iter().collect();
    let found = find_nearby(&environment, &caller("alice"), coordinate(0.0, 0.0), 50.0, &wanted)
        .await
        .unwrap();

    assert_eq!(ids(&found), vec![swim.as_str()]);
    assert_eq!(store.query_count(), 1);
}

#[tokio::test]
async fn rejects_bad_arguments_before_querying() {
    let store = Arc::new(FlakyStore::new());
    let environment = environment_with(store.clone());

    let result = find_nearby(
        &environment,
        &Caller::Anonymous,
        coordinate(0.0, 0.0),
        10.0,
        &no_categories(),
    )
    .await;
    assert!(matches!(result, Err(MeetlyError::Unauthenticated)));

    let outside: Coordinate =
        serde_json::from_value(json!({"latitude": 91.0, "longitude": 0.0})).unwrap();
    let result = find_nearby(&environment, &caller("alice"), outside, 10.0, &no_categories()).await;
    assert!(matches!(result, Err(MeetlyError::InvalidArgument { .. })));

    for radius in &[0.0, -5.0, f64::NAN, f64::INFINITY, 10_000.0] {
        let result = find_nearby(
            &environment,
            &caller("alice"),
            coordinate(0.0, 0.0),
            *radius,
            &no_categories(),
        )
        .await;

        assert!(
            matches!(result, Err(MeetlyError::InvalidArgument { .. })),
            "radius {} was accepted",
            radius
        );
    }

    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn store_failures_are_retryable() {
    let store = Arc::new(FlakyStore::new());
    let environment = environment_with(store.clone());
    store.go_down();

    let error = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, 0.0),
        10.0,
        &no_categories(),
    )
    .await
    .unwrap_err();

    assert!(error.is_retryable());
}

#[tokio::test]
async fn hides_meetings_the_caller_may_not_see() {
    let (environment, store) = memory_environment();
    let here = coordinate(0.1, 0.1);

    let mut alice = profile("alice", time::macros::date!(1990 - 01 - 01));
    alice.friends.insert("carol".to_owned());
    save_profile(&*store, &alice).await;

    let mut visible = vec![];
    visible.push(seed_meeting(&*store, &meeting("bob", here)).await);

    let mut by_friend = meeting("carol", here);
    by_friend.visibility = Visibility::Friends;
    visible.push(seed_meeting(&*store, &by_friend).await);

    let mut by_stranger = meeting("bob", here);
    by_stranger.visibility = Visibility::Friends;
    seed_meeting(&*store, &by_stranger).await;

    let mut private = meeting("bob", here);
    private.visibility = Visibility::Private;
    seed_meeting(&*store, &private).await;

    let mut invited = meeting("bob", here);
    invited.visibility = Visibility::Private;
    invited.participants.insert("alice".to_owned());
    visible.push(seed_meeting(&*store, &invited).await);

    let mut own = meeting("alice", here);
    own.visibility = Visibility::Private;
    visible.push(seed_meeting(&*store, &own).await);

    let mut found = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, 0.0),
        50.0,
        &no_categories(),
    )
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.id)
    .collect::<Vec<_>>();

    found.sort();
    visible.sort();

    assert_eq!(found, visible);
}

#[tokio::test]
async fn searches_across_the_antimeridian() {
    let store = Arc::new(FlakyStore::new());
    let environment = environment_with(store.clone());

    let east = seed_meeting(&store.inner, &meeting("bob", coordinate(0.0, 179.8))).await;
    let west = seed_meeting(&store.inner, &meeting("bob", coordinate(0.0, -179.95))).await;
    seed_meeting(&store.inner, &meeting("bob", coordinate(0.0, 0.0))).await;

    let found = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, 179.95),
        50.0,
        &no_categories(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&found), vec![west.as_str(), east.as_str()]);
    assert_eq!(store.query_count(), 2);
}

#[tokio::test]
async fn finds_a_meeting_on_the_antimeridian_from_the_west() {
    let (environment, store) = memory_environment();

    let edge = seed_meeting(&*store, &meeting("bob", coordinate(0.0, 180.0))).await;

    let found = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(0.0, -179.9),
        50.0,
        &no_categories(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&found), vec![edge.as_str()]);
}

#[tokio::test]
async fn searches_every_longitude_near_a_pole() {
    let store = Arc::new(FlakyStore::new());
    let environment = environment_with(store.clone());

    let across = seed_meeting(&store.inner, &meeting("bob", coordinate(89.5, -120.0))).await;
    seed_meeting(&store.inner, &meeting("bob", coordinate(80.0, 10.0))).await;

    let found = find_nearby(
        &environment,
        &caller("alice"),
        coordinate(89.95, 60.0),
        100.0,
        &no_categories(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&found), vec![across.as_str()]);
    assert_eq!(store.query_count(), 1);
}

#[tokio::test]
async fn origin_from_device_or_profile() {
    let (environment, store) = memory_environment();
    let mut alice = profile("alice", time::macros::date!(1990 - 01 - 01));
    alice.location = coordinate(10.0, 20.0);
    save_profile(&*store, &alice).await;

    let device = ReportedLocation(Some(coordinate(1.0, 2.0)));
    let no_fix = ReportedLocation(None);
    let alice = caller("alice");

    let origin = resolve_origin(&environment, &alice, &device, OriginSource::DeviceOrProfile)
        .await
        .unwrap();
    assert_eq!(origin, coordinate(1.0, 2.0));

    let origin = resolve_origin(&environment, &alice, &no_fix, OriginSource::DeviceOrProfile)
        .await
        .unwrap();
    assert_eq!(origin, coordinate(10.0, 20.0));

    let origin = resolve_origin(&environment, &alice, &device, OriginSource::Profile)
        .await
        .unwrap();
    assert_eq!(origin, coordinate(10.0, 20.0));

    let result = resolve_origin(&environment, &alice, &no_fix, OriginSource::Device).await;
    assert!(matches!(result, Err(MeetlyError::Unavailable { .. })));

    let result = resolve_origin(&environment, &caller("nobody"), &no_fix, OriginSource::DeviceOrProfile).await;
    assert!(matches!(result, Err(MeetlyError::NotFound { .. })));
}

#[tokio::test]
async fn finds_from_the_stored_location() {
    let (environment, store) = memory_environment();
    let mut alice = profile("alice", time::macros::date!(1990 - 01 - 01));
    alice.location = coordinate(45.0, 7.0);
    save_profile(&*store, &alice).await;

    let local = seed_meeting(&*store, &meeting("bob", coordinate(45.05, 7.05))).await;
    seed_meeting(&*store, &meeting("bob", coordinate(0.0, 0.0))).await;

    let found = find_nearby_from(
        &environment,
        &caller("alice"),
        &ReportedLocation(None),
        OriginSource::default(),
        20.0,
        &no_categories(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&found), vec![local.as_str()]);
}
