use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::db::DBHealthStatus;
use crate::types::{AppState, HealthStatus};

/// Liveness probe used by the keep-alive pinger
pub async fn ping() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "pong" }))
}

// Handler function for the health check endpoint
pub async fn health_check(data: web::Data<AppState>) -> impl Responder {
    // Calculate uptime in seconds
    let uptime = data.start_time.elapsed().as_secs();
    let db_health = data.db.health_check().await.ok();

    let healthy = matches!(
        db_health.as_ref().map(|h| &h.status),
        Some(DBHealthStatus::Healthy)
    );

    let status = HealthStatus {
        status: String::from(if healthy { "OK" } else { "DEGRADED" }),
        version: data.version.clone(),
        db_health,
        uptime_seconds: uptime,
    };

    if healthy {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::ServiceUnavailable().json(status)
    }
}
