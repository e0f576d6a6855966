use actix_cors::Cors;
use actix_web::{App, HttpServer, http, middleware::Logger, web};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};

use qrsmall::build_state;
use qrsmall::config::AppConfig;
use qrsmall::routes::init_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    let bind = (config.bind_address.clone(), config.port);
    let cors_origins = config.cors_origins.clone();

    // Connect storage and the tracking backend
    let app_state = match build_state(config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            error!("Error initializing application: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        // Create a logger with a custom format instead
        let logger = Logger::new("%a \"%r\" %s %b \"%{Referer}i\" \"%{User-Agent}i\" %D ms");
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![http::header::AUTHORIZATION, http::header::ACCEPT])
            .allowed_header(http::header::CONTENT_TYPE)
            .expose_headers(vec![
                http::header::CONTENT_DISPOSITION,
                http::header::HeaderName::from_static("x-qr-record-id"),
                http::header::HeaderName::from_static("x-tracking-url"),
            ])
            .max_age(3600);
        App::new()
            .wrap(logger)
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(init_routes)
    })
    .bind(bind)?
    .run()
    .await
}
