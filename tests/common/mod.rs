#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture, FutureExt};
use time::macros::date;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use meetly::auth::Caller;
use meetly::category::Category;
use meetly::environment::{Config, Environment};
use meetly::errors::MeetlyError;
use meetly::geo::Coordinate;
use meetly::meeting::{AgeRange, Meeting, Visibility};
use meetly::profile::Profile;
use meetly::store::memory::MemoryStore;
use meetly::store::{Collection, Document, DocumentStore, FieldOp, Predicate, StoredDocument};
use meetly::urls::Urls;

/// The date every test treats as today.
pub const TODAY: Date = date!(2024 - 06 - 01);

pub fn environment_with(store: Arc<dyn DocumentStore>) -> Environment {
    Environment::new(
        Arc::new(log::discard_logger()),
        store,
        Arc::new(Urls::new("https://images.example.com/")),
        Config::default(),
    )
}

pub fn memory_environment() -> (Environment, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());

    (environment_with(store.clone()), store)
}

pub fn coordinate(latitude: f64, longitude: f64) -> Coordinate {
    Coordinate::new(latitude, longitude).unwrap()
}

pub fn caller(uid: &str) -> Caller {
    Caller::authenticated(uid)
}

pub fn midnight(date: Date) -> OffsetDateTime {
    PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc()
}

pub fn profile(uid: &str, born: Date) -> Profile {
    Profile {
        uid: uid.to_owned(),
        name: uid.to_uppercase(),
        surname: "Tester".to_owned(),
        login: uid.to_owned(),
        bio: String::new(),
        date_of_birth: midnight(born),
        location: coordinate(0.0, 0.0),
        friends: BTreeSet::new(),
        incoming_requests: BTreeSet::new(),
        outgoing_requests: BTreeSet::new(),
    }
}

/// Stores an adult profile with no relationships.
pub async fn seed_profile(store: &dyn DocumentStore, uid: &str) -> Profile {
    let profile = profile(uid, date!(1990 - 01 - 01));
    save_profile(store, &profile).await;

    profile
}

pub async fn save_profile(store: &dyn DocumentStore, profile: &Profile) {
    store
        .set(Collection::Users, &profile.uid, profile.to_document().unwrap())
        .await
        .unwrap();
}

pub async fn load_profile(store: &dyn DocumentStore, uid: &str) -> Profile {
    let document = store.get(Collection::Users, uid).await.unwrap().unwrap();

    Profile::from_document(document).unwrap()
}

pub fn meeting(creator: &str, location: Coordinate) -> Meeting {
    Meeting {
        id: String::new(),
        title: "Meetup".to_owned(),
        creator: creator.to_owned(),
        description: String::new(),
        date: midnight(date!(2024 - 07 - 01)),
        location,
        address: "Somewhere".to_owned(),
        categories: BTreeSet::new(),
        participants: BTreeSet::new(),
        max_participants: 0,
        age_range: None::<AgeRange>,
        visibility: Visibility::Public,
    }
}

pub fn with_categories(mut meeting: Meeting, categories: &[Category]) -> Meeting {
    meeting.categories = categories.iter().copied().collect();
    meeting
}

/// Stores a meeting and returns its id.
pub async fn seed_meeting(store: &dyn DocumentStore, meeting: &Meeting) -> String {
    store
        .add(Collection::Posts, meeting.to_document().unwrap())
        .await
        .unwrap()
}

/// Stores a posts document as-is, whether or not it decodes as a meeting.
pub async fn seed_raw_meeting(store: &dyn DocumentStore, fields: serde_json::Value) -> String {
    match fields {
        serde_json::Value::Object(fields) => store.add(Collection::Posts, fields).await.unwrap(),
        other => panic!("not a document: {}", other),
    }
}

/// Wraps a `MemoryStore`, counting queries and failing chosen calls.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    queries: AtomicUsize,
    failing_updates: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    without_array_contains_any: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects `Predicate::ArrayContainsAny`.
    pub fn without_array_contains_any() -> Self {
        FlakyStore {
            without_array_contains_any: true,
            ..Self::default()
        }
    }

    pub fn fail_updates_of(&self, id: &str) {
        self.failing_updates.lock().unwrap().insert(id.to_owned());
    }

    pub fn heal(&self) {
        self.failing_updates.lock().unwrap().clear();
        self.unavailable.store(false, Ordering::SeqCst);
    }

    pub fn go_down(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn down<T: Send + 'static>(&self) -> Option<BoxFuture<'static, Result<T, MeetlyError>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            Some(future::ready(Err(MeetlyError::unavailable("store is down"))).boxed())
        } else {
            None
        }
    }
}

impl DocumentStore for FlakyStore {
    fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> BoxFuture<Result<Option<StoredDocument>, MeetlyError>> {
        if let Some(failure) = self.down() {
            return failure;
        }

        self.inner.get(collection, id)
    }

    fn query(
        &self,
        collection: Collection,
        predicates: Vec<Predicate>,
    ) -> BoxFuture<Result<Vec<StoredDocument>, MeetlyError>> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = self.down() {
            return failure;
        }

        if self.without_array_contains_any
            && predicates
                .iter()
                .any(|p| matches!(p, Predicate::ArrayContainsAny { .. }))
        {
            return future::ready(Err(MeetlyError::invalid("array-contains-any is not supported"))).boxed();
        }

        self.inner.query(collection, predicates)
    }

    fn set(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> BoxFuture<Result<(), MeetlyError>> {
        if let Some(failure) = self.down() {
            return failure;
        }

        self.inner.set(collection, id, fields)
    }

    fn add(&self, collection: Collection, fields: Document) -> BoxFuture<Result<String, MeetlyError>> {
        if let Some(failure) = self.down() {
            return failure;
        }

        self.inner.add(collection, fields)
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        ops: Vec<FieldOp>,
    ) -> BoxFuture<Result<(), MeetlyError>> {
        if let Some(failure) = self.down() {
            return failure;
        }

        if self.failing_updates.lock().unwrap().contains(id) {
            return future::ready(Err(MeetlyError::unavailable(format!("update of {} failed", id)))).boxed();
        }

        self.inner.update(collection, id, ops)
    }

    fn delete(&self, collection: Collection, id: &str) -> BoxFuture<Result<(), MeetlyError>> {
        if let Some(failure) = self.down() {
            return failure;
        }

        self.inner.delete(collection, id)
    }

    fn supports_array_contains_any(&self) -> bool {
        !self.without_array_contains_any
    }
}
