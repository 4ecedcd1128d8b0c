//! The proximity query engine.
//!
//! The document store has no geospatial index, so a search derives a
//! latitude/longitude rectangle around the origin, asks the store for the
//! meetings inside it and computes the true distance of each result on
//! the client. Results are not filtered by that distance: the rectangle
//! is the answer, ranked nearest first.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace, warn};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::auth::Caller;
use crate::category::Category;
use crate::environment::Environment;
use crate::errors::MeetlyError;
use crate::geo::{BoundingBox, Coordinate};
use crate::location::{LocationProvider, OriginSource};
use crate::meeting::{Meeting, CATEGORIES};
use crate::profile::Profile;
use crate::store::{Collection, Predicate, StoredDocument};

const LATITUDE: &str = "location.latitude";
const LONGITUDE: &str = "location.longitude";

/// A meeting found by `find_nearby`, with its distance from the origin.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyMeeting {
    pub id: String,

    #[serde(flatten)]
    pub meeting: Meeting,

    /// Great-circle distance from the search origin, in metres.
    pub distance_m: f64,

    pub image: Url,
}

/// Finds the meetings inside the bounding box of `radius_km` around
/// `origin` that the caller may see, nearest first. A non-empty
/// `categories` keeps only meetings sharing at least one category.
pub async fn find_nearby(
    environment: &Environment,
    caller: &Caller,
    origin: Coordinate,
    radius_km: f64,
    categories: &BTreeSet<Category>,
) -> Result<Vec<NearbyMeeting>, MeetlyError> {
    let uid = caller.uid()?;

    if radius_km > environment.config.max_radius_km {
        return Err(MeetlyError::invalid(format!(
            "radius {} km exceeds the maximum of {} km",
            radius_km, environment.config.max_radius_km
        )));
    }

    let bounds = BoundingBox::around(&origin, radius_km)?;
    let logger = &environment.logger;
    let store = &environment.store;

    debug!(logger, "Finding nearby meetings"; "uid" => uid, "origin" => %origin, "radius_km" => radius_km, "categories" => ?categories, "bounds" => ?bounds);

    let mut base = vec![Predicate::range(
        LATITUDE,
        bounds.min_latitude,
        bounds.max_latitude,
    )];

    if !categories.is_empty() && store.supports_array_contains_any() {
        let names = categories
            .iter()
            .map(|c| Value::from(c.name()))
            .collect::<Vec<_>>();

        base.push(Predicate::array_contains_any(CATEGORIES, names));
    }

    let ranges = bounds.longitude_ranges();
    let queries = if ranges.is_empty() {
        vec![base]
    } else {
        ranges
            .into_iter()
            .map(|(min, max)| {
                let mut predicates = base.clone();
                predicates.push(Predicate::range(LONGITUDE, min, max));
                predicates
            })
            .collect()
    };

    // merged by id
    let mut found = BTreeMap::<String, StoredDocument>::new();

    for predicates in queries {
        for document in store.query(Collection::Posts, predicates).await? {
            found.insert(document.id.clone(), document);
        }
    }

    trace!(logger, "Bounding box query returned"; "count" => found.len());

    let viewer = store
        .get(Collection::Users, uid)
        .await?
        .map(Profile::from_document)
        .transpose()?;

    let mut results = vec![];

    for (id, document) in found {
        let meeting = match Meeting::from_document(document) {
            Ok(meeting) => meeting,
            Err(e) => {
                warn!(logger, "Skipping undecodable meeting"; "id" => &id, "error" => %e);
                continue;
            }
        };

        if !meeting.matches_categories(categories) || !meeting.is_visible_to(uid, viewer.as_ref()) {
            continue;
        }

        results.push(NearbyMeeting {
            id: meeting.id.clone(),
            distance_m: origin.distance_to(&meeting.location),
            image: environment.urls.meeting_image(&meeting.id),
            meeting,
        });
    }

    results.sort_by(|a, b| {
        a.distance_m
            .partial_cmp(&b.distance_m)
            .unwrap_or(Ordering::Equal)
    });

    debug!(logger, "Found nearby meetings"; "uid" => uid, "count" => results.len());

    Ok(results)
}

/// Determines the search origin for `caller` according to `source`.
pub async fn resolve_origin(
    environment: &Environment,
    caller: &Caller,
    provider: &dyn LocationProvider,
    source: OriginSource,
) -> Result<Coordinate, MeetlyError> {
    let uid = caller.uid()?;

    let origin = match source {
        OriginSource::Device => provider.current_location().await?,
        OriginSource::Profile => stored_location(environment, uid).await?,
        OriginSource::DeviceOrProfile => match provider.current_location().await {
            Ok(origin) => origin,
            Err(MeetlyError::Unavailable { reason }) => {
                debug!(environment.logger, "Falling back to the stored location"; "uid" => uid, "reason" => reason);
                stored_location(environment, uid).await?
            }
            Err(e) => return Err(e),
        },
    };

    origin.validate()?;

    Ok(origin)
}

async fn stored_location(environment: &Environment, uid: &str) -> Result<Coordinate, MeetlyError> {
    let document = environment
        .store
        .get(Collection::Users, uid)
        .await?
        .ok_or_else(|| MeetlyError::not_found(Collection::Users, uid))?;

    Ok(Profile::from_document(document)?.location)
}

/// `resolve_origin` followed by `find_nearby`.
pub async fn find_nearby_from(
    environment: &Environment,
    caller: &Caller,
    provider: &dyn LocationProvider,
    source: OriginSource,
    radius_km: f64,
    categories: &BTreeSet<Category>,
) -> Result<Vec<NearbyMeeting>, MeetlyError> {
    let origin = resolve_origin(environment, caller, provider, source).await?;

    find_nearby(environment, caller, origin, radius_km, categories).await
}
