use std::time::{Duration, Instant};

use log::debug;
use time::OffsetDateTime;
use warp::{
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::auth::Caller;
use crate::category::{Category, CategoryInfo};
use crate::environment::Environment;
use crate::errors::MeetlyError;
use crate::friends::Action;
use crate::geo::{self, Coordinate};
use crate::meeting::{Meeting, NewMeeting};
use crate::profile::{NewProfile, Profile};
use crate::routes::{
    query::{DistanceQuery, NearbyQuery, RepairRequest},
    rejection::{Context, Rejection},
    response::SuccessResponse,
};
use crate::{accounts, discovery, friends, participation};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn nearby(environment: Environment, caller: Caller, query: NearbyQuery) -> RouteResult {
    timed! {
        let error_handler = |e: MeetlyError| Rejection::new(Context::nearby(), e);

        let categories = query.categories().map_err(error_handler)?;
        let provider = query.reported_location().map_err(error_handler)?;

        let meetings = discovery::find_nearby_from(
            &environment,
            &caller,
            &provider,
            query.origin.unwrap_or_default(),
            query.radius_km,
            &categories,
        )
        .await
        .map_err(error_handler)?;

        json(&SuccessResponse::Nearby { meetings })
    }
}

pub async fn distance(_environment: Environment, _caller: Caller, query: DistanceQuery) -> RouteResult {
    timed! {
        let (from, to) = query
            .endpoints()
            .map_err(|e| Rejection::new(Context::distance(), e))?;

        json(&SuccessResponse::Distance { distance_m: geo::distance(&from, &to) })
    }
}

pub async fn categories(_environment: Environment, _caller: Caller) -> RouteResult {
    timed! {
        let categories = Category::all()
            .iter()
            .copied()
            .map(CategoryInfo::from)
            .collect();

        json(&SuccessResponse::Categories { categories })
    }
}

pub async fn create_meeting(
    environment: Environment,
    caller: Caller,
    details: NewMeeting,
) -> RouteResult {
    timed! {
        let meeting = participation::create_meeting(&environment, &caller, details)
            .await
            .map_err(|e| Rejection::new(Context::meeting(None), e))?;

        with_status(json(&meeting_response(&environment, meeting)), StatusCode::CREATED)
    }
}

pub async fn edit_meeting(
    environment: Environment,
    caller: Caller,
    id: String,
    details: NewMeeting,
) -> RouteResult {
    timed! {
        let meeting = participation::edit_meeting(&environment, &caller, &id, details)
            .await
            .map_err(|e| Rejection::new(Context::meeting(Some(id.clone())), e))?;

        json(&meeting_response(&environment, meeting))
    }
}

pub async fn delete_meeting(environment: Environment, caller: Caller, id: String) -> RouteResult {
    timed! {
        debug!(environment.logger, "Deleting meeting..."; "id" => &id);

        participation::delete_meeting(&environment, &caller, &id)
            .await
            .map_err(|e| Rejection::new(Context::meeting(Some(id.clone())), e))?;

        StatusCode::NO_CONTENT
    }
}

pub async fn join(environment: Environment, caller: Caller, id: String) -> RouteResult {
    timed! {
        let today = OffsetDateTime::now_utc().date();

        let meeting = participation::join_meeting(&environment, &caller, &id, today)
            .await
            .map_err(|e| Rejection::new(Context::meeting(Some(id.clone())), e))?;

        json(&meeting_response(&environment, meeting))
    }
}

pub async fn leave(environment: Environment, caller: Caller, id: String) -> RouteResult {
    timed! {
        participation::leave_meeting(&environment, &caller, &id)
            .await
            .map_err(|e| Rejection::new(Context::meeting(Some(id.clone())), e))?;

        StatusCode::NO_CONTENT
    }
}

pub async fn register(environment: Environment, caller: Caller, details: NewProfile) -> RouteResult {
    timed! {
        let today = OffsetDateTime::now_utc().date();

        let profile = accounts::register(&environment, &caller, details, today)
            .await
            .map_err(|e| Rejection::new(Context::profile(None), e))?;

        with_status(json(&profile_response(&environment, profile)), StatusCode::CREATED)
    }
}

pub async fn update_location(
    environment: Environment,
    caller: Caller,
    location: Coordinate,
) -> RouteResult {
    timed! {
        accounts::update_location(&environment, &caller, location)
            .await
            .map_err(|e| Rejection::new(Context::profile(None), e))?;

        json(&SuccessResponse::Location { location })
    }
}

pub async fn profile(environment: Environment, caller: Caller, uid: String) -> RouteResult {
    timed! {
        let error_handler = |e: MeetlyError| Rejection::new(Context::profile(Some(uid.clone())), e);

        let _uid = caller.uid().map_err(error_handler)?;

        let profile = accounts::profile(&environment, &uid)
            .await
            .map_err(error_handler)?;

        json(&profile_response(&environment, profile))
    }
}

pub async fn relationship(environment: Environment, caller: Caller, other: String) -> RouteResult {
    timed! {
        let relationship = friends::relationship_state(&environment, &caller, &other)
            .await
            .map_err(|e| Rejection::new(Context::relationship(other.clone(), "read"), e))?;

        json(&SuccessResponse::relationship(relationship))
    }
}

pub async fn repair(
    environment: Environment,
    caller: Caller,
    other: String,
    request: RepairRequest,
) -> RouteResult {
    timed! {
        let outcome = friends::repair(&environment, &caller, &other, request.target)
            .await
            .map_err(|e| Rejection::new(Context::relationship(other.clone(), "repair"), e))?;

        json(&SuccessResponse::Transition(outcome))
    }
}

pub async fn transition(
    environment: Environment,
    caller: Caller,
    other: String,
    action: String,
) -> RouteResult {
    timed! {
        let error_handler = |e: MeetlyError| Rejection::new(Context::relationship(other.clone(), action.clone()), e);

        let parsed: Action = action.parse().map_err(error_handler)?;

        let outcome = friends::transition(&environment, &caller, &other, parsed)
            .await
            .map_err(error_handler)?;

        json(&SuccessResponse::Transition(outcome))
    }
}

fn meeting_response(environment: &Environment, meeting: Meeting) -> SuccessResponse<'static> {
    SuccessResponse::Meeting {
        id: meeting.id.clone(),
        image: environment.urls.meeting_image(&meeting.id),
        meeting,
    }
}

fn profile_response(environment: &Environment, profile: Profile) -> SuccessResponse<'static> {
    SuccessResponse::Profile {
        uid: profile.uid.clone(),
        image: environment.urls.profile_image(&profile.uid),
        profile,
    }
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
