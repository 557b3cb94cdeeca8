#[macro_use]
extern crate diesel;

mod appointments;
mod audit;
mod auth;
mod capacity;
mod config;
mod database;
mod error;
mod mailer;
mod models;
mod notifications;
mod protocol;
mod schema;
mod utils;

use actix_web::{middleware, web, App, HttpServer};
use diesel::{r2d2::ConnectionManager, MysqlConnection};

pub type DbPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = config::Config::from_env().expect("invalid configuration");

    let manager = ConnectionManager::<MysqlConnection>::new(&config.database_url);
    let pool = r2d2::Pool::builder()
        .build(manager)
        .expect("Failed to create pool");

    let mailer = mailer::Mailer::from_config(config.smtp.as_ref())
        .expect("invalid SMTP configuration");
    if !mailer.is_enabled() {
        log::info!("SMTP not configured, mail delivery disabled");
    }

    let bind = config.bind_addr.clone();
    log::info!("listening on {}", bind);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .data(pool.clone())
            .data(mailer.clone())
            .service(web::scope("/auth").configure(auth::config))
            .service(web::scope("/appointments").configure(appointments::config))
            .service(web::scope("/notifications").configure(notifications::config))
    })
    .bind(bind)?
    .run()
    .await
}
