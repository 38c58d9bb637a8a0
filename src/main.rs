use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use warp::Filter;

use roomboard::config::get_variable;
use roomboard::db::{PgDb, PgSessions};
use roomboard::environment::{Config, Environment};
use roomboard::log::{info, initialize_logger};
use roomboard::routes;
use roomboard::store::S3Store;
use roomboard::urls::Urls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let store = Arc::new(S3Store::from_env().expect("initialize S3 store from environment"));

    let main_port: u16 = get_variable("BACKEND_PORT")
        .parse()
        .expect("parse BACKEND_PORT as u16");
    let admin_port: u16 = get_variable("BACKEND_ADMIN_PORT")
        .parse()
        .expect("parse BACKEND_ADMIN_PORT as u16");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("BACKEND_DB_CONNECTION_STRING");
    let pool: sqlx::PgPool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool from BACKEND_DB_CONNECTION_STRING");
    let db = Arc::new(PgDb::new(pool.clone()));
    let sessions = Arc::new(PgSessions::new(pool));

    let urls = Arc::new(Urls::new(
        get_variable("BACKEND_BASE_URL"),
        get_variable("BACKEND_LISTINGS_PATH"),
    ));

    let store_timeout = Duration::from_secs(
        get_variable("BACKEND_STORE_TIMEOUT_SECONDS")
            .parse()
            .expect("parse BACKEND_STORE_TIMEOUT_SECONDS as u64"),
    );
    let config = Config::new(store_timeout);
    let environment = Environment::new(logger.clone(), db, sessions, store, urls, config);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            let termination_sender = termination_sender.clone();
            termination_sender.send(()).await.unwrap();
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
            let terminate = terminate.clone();

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

        let list_route = routes::make_list_route(environment.clone());
        let create_route = routes::make_create_route(environment.clone());
        let retrieve_route = routes::make_retrieve_route(environment.clone());
        let update_route = routes::make_update_route(environment.clone());
        let delete_route = routes::make_delete_route(environment.clone());
        let comment_route = routes::make_comment_route(environment.clone());

        let routes = list_route
            .or(create_route)
            .or(comment_route)
            .or(retrieve_route)
            .or(update_route)
            .or(delete_route)
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
