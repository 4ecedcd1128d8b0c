use std::sync::Arc;

use log::{error, warn, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::MeetlyError;

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// Header carrying the uid asserted by the authentication gateway.
pub const CALLER_HEADER: &str = "x-meetly-uid";

/// The maximum JSON body size to accept. This should be enforced by the
/// HTTP gateway as well.
const MAX_CONTENT_LENGTH: u64 = 64 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Request failed"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            warn!(logger, "Request rejected"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status));
    }

    Err(rej)
}

fn status_code_for(e: &MeetlyError) -> StatusCode {
    use MeetlyError::*;

    match e {
        InvalidArgument { .. } => StatusCode::BAD_REQUEST,
        Unauthenticated => StatusCode::UNAUTHORIZED,
        Forbidden { .. } => StatusCode::FORBIDDEN,
        NotFound { .. } => StatusCode::NOT_FOUND,
        Conflict { .. } | Desynced(..) => StatusCode::CONFLICT,
        Unavailable { .. } | Sqlx { .. } | PartialWrite { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Malformed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use serde::de::DeserializeOwned;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete, get as g, path as p, path::param as par, post, put, query};

    use super::{handlers, query as q, CALLER_HEADER, MAX_CONTENT_LENGTH};
    use crate::auth::Caller;
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    fn caller() -> impl Filter<Extract = (Caller,), Error = warp::Rejection> + Clone {
        warp::header::optional::<String>(CALLER_HEADER).map(Caller::from_header)
    }

    fn body<T: DeserializeOwned + Send>(
    ) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
        warp::body::content_length_limit(MAX_CONTENT_LENGTH).and(warp::body::json())
    }

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(caller());

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_nearby_route => nearby, rt; p!("meetings" / "nearby"), end(), g(), query::<q::NearbyQuery>());
    route!(make_distance_route => distance, rt; p("distance"), end(), g(), query::<q::DistanceQuery>());
    route!(make_categories_route => categories, rt; p("categories"), end(), g());
    route!(make_create_meeting_route => create_meeting, rt; p("meetings"), end(), post(), body());
    route!(make_edit_meeting_route => edit_meeting, rt; p("meetings"), par::<String>(), end(), put(), body());
    route!(make_delete_meeting_route => delete_meeting, rt; p("meetings"), par::<String>(), end(), delete());
    route!(make_join_route => join, rt; p!("meetings" / String / "participants"), end(), post());
    route!(make_leave_route => leave, rt; p!("meetings" / String / "participants"), end(), delete());
    route!(make_register_route => register, rt; p("profiles"), end(), post(), body());
    route!(make_location_route => update_location, rt; p!("profiles" / "me" / "location"), end(), put(), body());
    route!(make_profile_route => profile, rt; p("profiles"), par::<String>(), end(), g());
    route!(make_relationship_route => relationship, rt; p!("profiles" / String / "relationship"), end(), g());
    route!(make_repair_route => repair, rt; p!("profiles" / String / "relationship" / "repair"), end(), post(), body());
    route!(make_transition_route => transition, rt; p!("profiles" / String / "relationship" / String), end(), post());

    /// Every public route, combined.
    pub fn make_api_route(environment: Environment) -> Route {
        make_nearby_route(environment.clone())
            .or(make_distance_route(environment.clone()))
            .unify()
            .or(make_categories_route(environment.clone()))
            .unify()
            .or(make_create_meeting_route(environment.clone()))
            .unify()
            .or(make_edit_meeting_route(environment.clone()))
            .unify()
            .or(make_delete_meeting_route(environment.clone()))
            .unify()
            .or(make_join_route(environment.clone()))
            .unify()
            .or(make_leave_route(environment.clone()))
            .unify()
            .or(make_register_route(environment.clone()))
            .unify()
            .or(make_location_route(environment.clone()))
            .unify()
            .or(make_profile_route(environment.clone()))
            .unify()
            .or(make_relationship_route(environment.clone()))
            .unify()
            .or(make_repair_route(environment.clone()))
            .unify()
            .or(make_transition_route(environment))
            .unify()
            .boxed()
    }
}
