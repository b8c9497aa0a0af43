use actix_web::{error::InternalError, web, HttpResponse, ResponseError};

use crate::errors::AppError;
use crate::handlers::{admin, auth, frontend, health, short_link};
use crate::models::AdminScope;

// Malformed bodies and query strings answer with the same JSON shape as other errors
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response: HttpResponse = AppError::Validation(err.to_string()).error_response();
        InternalError::from_response(err, response).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let response: HttpResponse = AppError::Validation(err.to_string()).error_response();
        InternalError::from_response(err, response).into()
    })
}

// User administration, mounted once per scope
fn admin_scope(path: &str, scope: AdminScope) -> actix_web::Scope {
    web::scope(path)
        .app_data(web::Data::new(scope))
        .route("/users", web::get().to(admin::list_users))
        .route("/users/{id}", web::get().to(admin::get_user))
        .route("/users/{id}/urls", web::get().to(admin::get_user_urls))
        .route("/users/{id}/role", web::patch().to(admin::update_role))
}

// Configure all routes function
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/ping", web::get().to(health::ping))
        .route("/health", web::get().to(health::health_check))
        .route("/r/{short_code}", web::get().to(short_link::redirect))
        .service(
            web::scope("/auth")
                .route("/login", web::get().to(auth::login))
                .route("/callback", web::get().to(auth::callback))
                .route("/profile", web::get().to(auth::profile))
                .route("/logout", web::post().to(auth::logout))
                .route("/logout", web::get().to(auth::logout)),
        )
        .service(
            web::scope("/api/v1")
                .route("/shorten", web::post().to(short_link::shorten))
                .route("/urls", web::get().to(short_link::list_urls))
                .route("/urls/{id}", web::get().to(short_link::get_url))
                .route("/urls/{id}", web::patch().to(short_link::update_url))
                .route("/urls/{id}", web::delete().to(short_link::delete_url))
                .route("/users/{id}", web::delete().to(admin::delete_account))
                .service(admin_scope("/admin", AdminScope::Admin))
                .service(admin_scope("/leader", AdminScope::Leader)),
        )
        .default_service(web::to(frontend::spa));
}
