//! Routes served on the admin port only.

use std::convert::Infallible;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::{info, warn};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{self, json, Reply};
use warp::Filter;

use super::response::SuccessResponse;
use crate::environment::Environment;
use crate::store::Collection;

/// Build information plus a round trip to the document store. Answers
/// 503 while the store cannot be reached.
pub fn make_healthz_route(
    environment: Environment,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    warp::path("healthz")
        .and(warp::get())
        .and_then(move || healthz(environment.clone()))
}

async fn healthz(environment: Environment) -> Result<reply::Response, Infallible> {
    // any id will do: only the round trip matters
    let store_reachable = match environment.store.get(Collection::Users, "").await {
        Ok(_) => true,
        Err(e) => {
            warn!(environment.logger, "Store unreachable"; "error" => %e);
            false
        }
    };

    let status = if store_reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json(&SuccessResponse::Healthz {
        revision: info::REVISION,
        timestamp: info::BUILD_TIMESTAMP,
        version: info::VERSION,
        store_reachable,
        max_radius_km: environment.config.max_radius_km,
    });

    Ok(reply::with_status(body, status).into_response())
}

type TerminationFuture<'a> = BoxFuture<'a, ()>;

/// Resolves once the servers have been told to shut down.
pub type TerminationFunctionWrapper<'a> =
    Arc<dyn Fn() -> TerminationFuture<'a> + Send + Sync + 'a>;

pub fn make_termination_route<'a>(
    environment: Environment,
    terminate: TerminationFunctionWrapper<'a>,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone + 'a {
    let handler = move || -> BoxFuture<Result<StatusCode, Infallible>> {
        let terminate = terminate.clone();
        let logger = environment.logger.clone();

        async move {
            info!(logger, "Shutting down meetly"; "requested_by" => "admin");
            terminate().await;
            Ok(StatusCode::NO_CONTENT)
        }
        .boxed()
    };

    warp::path("terminate").and(warp::post()).and_then(handler)
}
