use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use std::io::{Error, ErrorKind};
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::config::{DatabaseSettings, Settings};
use crate::domain::offer_policy::OfferPolicy;
use crate::email_client::EmailClient;
use crate::routes::{
    handle_check_claimed, handle_claim, handle_list_subscribers, handle_remaining,
    handle_subscribe, health_check, reject_json_payload,
};

pub struct Application {
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let db_pool = get_connection_db_pool(&config.database);
        let sender_email = config
            .get_email_client_sender()
            .map_err(|err| Error::new(ErrorKind::InvalidInput, err))?;
        let email_client = EmailClient::new(
            config.get_email_client_base_url(),
            sender_email,
            config.get_email_client_api(),
            Some(config.get_email_client_timeout()),
        )
        .map_err(|err| Error::new(ErrorKind::Other, err))?;
        let offer_policy = config
            .get_offer_policy()
            .map_err(|err| Error::new(ErrorKind::InvalidInput, err))?;

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(listener, db_pool, email_client, offer_policy)?;

        tracing::info!("Server listening on {}:{}", config.application.get_host(), port);

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    email_client: EmailClient,
    offer_policy: OfferPolicy,
) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(db_pool);
    let email_client = web::Data::new(email_client);
    let offer_policy = web::Data::new(offer_policy);

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/offers")
                    .route("/subscribe", web::post().to(handle_subscribe))
                    .route("/subscribers", web::get().to(handle_list_subscribers))
                    .route("/remaining", web::get().to(handle_remaining))
                    .route("/check", web::get().to(handle_check_claimed))
                    .route("/claim", web::post().to(handle_claim)),
            )
            .app_data(web::JsonConfig::default().error_handler(reject_json_payload))
            .app_data(db_pool.clone())
            .app_data(email_client.clone())
            .app_data(offer_policy.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
