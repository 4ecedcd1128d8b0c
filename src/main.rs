use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use log::{info, initialize_logger, warn};
use meetly::config::get_variable;
use meetly::db::PgDocumentStore;
use meetly::environment::{Config, Environment};
use meetly::routes;
use meetly::store::memory::MemoryStore;
use meetly::store::DocumentStore;
use meetly::urls::Urls;
use tokio::sync::mpsc;
use warp::Filter;

/// Connection string selecting the in-memory store instead of PostgreSQL.
const MEMORY_STORE: &str = "memory";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = get_variable("MEETLY_PORT")
        .parse()
        .expect("parse MEETLY_PORT as u16");
    let admin_port: u16 = get_variable("MEETLY_ADMIN_PORT")
        .parse()
        .expect("parse MEETLY_ADMIN_PORT as u16");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    let connection_string = get_variable("MEETLY_DB_CONNECTION_STRING");

    let store: Arc<dyn DocumentStore> = if connection_string == MEMORY_STORE {
        warn!(logger, "Using the in-memory store; nothing will be persisted");
        Arc::new(MemoryStore::new())
    } else {
        info!(logger, "Creating database pool...");
        let pool = sqlx::PgPool::connect(&connection_string)
            .await
            .expect("create database pool from MEETLY_DB_CONNECTION_STRING");

        let store = PgDocumentStore::new(pool);
        store.initialize().await?;

        Arc::new(store)
    };

    let urls = Arc::new(Urls::new(get_variable("MEETLY_IMAGES_BASE_URL")));
    let config = Config::from_env();
    info!(logger, "Configured"; "config" => ?config);

    let environment = Environment::new(logger.clone(), store, urls, config);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // a closed channel means shutdown is already under way
            let _ = termination_sender.send(()).await;
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let logger2 = logger.clone();

        let routes = routes::make_api_route(environment.clone())
            .recover(move |r| routes::format_rejection(logger2.clone(), r));

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
