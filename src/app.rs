use std::time::{Duration, Instant};

use actix_cors::Cors;
use actix_web::{
    http::header::{ACCEPT, CONTENT_TYPE},
    middleware::Logger,
    web, App, HttpServer,
};
use env_logger::Env;
use log::{debug, info};

use crate::{
    config::{Config, Environment},
    db::Database,
    errors::AppError,
    middleware::{RateLimit, RequestLogger},
    routes,
    services::{keep_alive, RateLimiter, Services},
    types::AppState,
};

// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;

/// Vite dev server, allowed to call the API outside production
const FRONTEND_DEV_ORIGIN: &str = "http://localhost:5173";

// Setup logging with custom format and configuration
fn setup_logging(config: &Config) -> Result<(), AppError> {
    // Configure log level based on environment and config
    let log_level = match config.app.environment {
        Environment::Development => config.app.log_level.clone(),
        Environment::Testing => "debug,actix_web=info,sqlx=warn".to_string(),
        Environment::Production => "info,actix_web=warn,sqlx=warn".to_string(),
    };

    let env = Env::default()
        .filter_or("RUST_LOG", log_level)
        .write_style_or("RUST_LOG_STYLE", "always");

    env_logger::try_init_from_env(env)
        .map_err(|e| AppError::Logger(format!("Failed to initialize logger: {}", e)))
}

// The SPA is normally same-origin; CORS only matters for aliases and local frontend work
fn cors(config: &Config) -> Cors {
    let mut cors = Cors::default()
        .allowed_origin(&config.app.base_url)
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
        .allowed_headers(vec![CONTENT_TYPE, ACCEPT])
        .supports_credentials()
        .max_age(3600);

    for origin in &config.app.alias_base_urls {
        cors = cors.allowed_origin(origin);
    }
    if config.app.environment != Environment::Production {
        cors = cors.allowed_origin(FRONTEND_DEV_ORIGIN);
    }
    cors
}

pub async fn server() -> AppResult<()> {
    // Load application configuration
    let config = Config::load()?;

    // Setup enhanced logging based on configuration
    setup_logging(&config)?;

    // Capture start time for uptime calculation
    let start_time = Instant::now();

    // Log startup information
    info!("Starting {} v{}", config.app.name, config.app.version);
    info!("Environment: {:?}", config.app.environment);
    info!("Public base URL: {}", config.app.base_url);
    info!(
        "Binding to {}:{} with {} workers",
        config.server.host, config.server.port, config.server.workers
    );

    if config.app.environment == Environment::Development {
        debug!("Debug logging enabled");
        debug!("Full configuration: {:?}", config);
    }

    let db = Database::connect(&config.db).await?;
    let services = Services::new(db.clone(), &config)?;

    let limiter = RateLimiter::new(&config.rate_limit);
    let sweeper = limiter.spawn_sweeper(Duration::from_secs(config.rate_limit.sweep_secs.max(1)));
    info!(
        "Rate limiting: {} req/s, burst {}",
        config.rate_limit.per_second, config.rate_limit.burst
    );

    let pinger = keep_alive::spawn(&config.keep_alive, &config.app.base_url);

    // Determine if we should enable more verbose logging
    let enable_debug_logging = config.app.environment != Environment::Production;

    // Create a cloned config for the closure
    let app_config = config.clone();
    let app_db = db.clone();

    // Determine log format based on environment
    let log_format = if enable_debug_logging {
        "%a \"%r\" %s %b %T"
    } else {
        "%a \"%r\" %s %b %T \"%{Referer}i\" \"%{User-Agent}i\""
    };

    // Start the HTTP server
    let result = HttpServer::new(move || {
        let services = services.clone();

        App::new()
            .app_data(web::Data::new(AppState {
                start_time,
                db: app_db.clone(),
                version: app_config.app.version.clone(),
            }))
            .wrap(RateLimit::new(limiter.clone()))
            .wrap(RequestLogger::new(enable_debug_logging))
            .wrap(cors(&app_config))
            .wrap(Logger::new(log_format))
            .configure(move |cfg| services.register(cfg))
            .configure(routes::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.to_string(), config.server.port))?
    .run()
    .await;

    // Background tasks end with the server
    sweeper.abort();
    if let Some(pinger) = pinger {
        pinger.abort();
    }
    db.shutdown().await;

    result.map_err(AppError::from)
}
