use actix_web::{
    http::header::{CACHE_CONTROL, LOCATION},
    web, HttpResponse, Responder,
};
use log::{debug, error};
use serde_json::json;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    middleware::AuthUser,
    models::{Capability, PageQuery, ShortenRequest, UpdateShortLinkRequest},
    services::ShortLinkService,
    types::Result,
};

/// Where unknown codes are sent; the frontend shows the error
pub const INVALID_SHORT_URL_REDIRECT: &str = "/?error=invalid_short_url";

/// Create short link route handler
pub async fn shorten(
    user: AuthUser,
    dto: web::Json<ShortenRequest>,
    service: web::Data<ShortLinkService>,
) -> Result<impl Responder> {
    let user = user.require(Capability::ShortenUrls)?;
    let response = service.shorten(&user, dto.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Redirect route handler
pub async fn redirect(
    path: web::Path<String>,
    service: web::Data<ShortLinkService>,
) -> Result<impl Responder> {
    let short_code = path.into_inner();
    debug!("Redirect requested for code: {}", short_code);

    match service.resolve(&short_code).await {
        Ok(long_url) => Ok(HttpResponse::TemporaryRedirect()
            .insert_header((LOCATION, long_url))
            .insert_header((CACHE_CONTROL, "no-store, no-cache, must-revalidate"))
            .finish()),
        Err(ServiceError::NotFound(_)) => Ok(HttpResponse::Found()
            .insert_header((LOCATION, INVALID_SHORT_URL_REDIRECT))
            .finish()),
        Err(e) => {
            error!("Failed to resolve short code {}: {}", short_code, e);
            Err(e.into())
        }
    }
}

/// List own URLs route handler
pub async fn list_urls(
    user: AuthUser,
    query: web::Query<PageQuery>,
    service: web::Data<ShortLinkService>,
) -> Result<impl Responder> {
    let user = user.require(Capability::ShortenUrls)?;
    let page = service.list(user.id, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Get URL by ID route handler
pub async fn get_url(
    user: AuthUser,
    id: web::Path<Uuid>,
    service: web::Data<ShortLinkService>,
) -> Result<impl Responder> {
    let user = user.require(Capability::ShortenUrls)?;
    let url = service.get(user.id, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": url,
        "message": "Successfully retrieved URL",
    })))
}

/// Update URL route handler
pub async fn update_url(
    user: AuthUser,
    id: web::Path<Uuid>,
    dto: web::Json<UpdateShortLinkRequest>,
    service: web::Data<ShortLinkService>,
) -> Result<impl Responder> {
    let user = user.require(Capability::ShortenUrls)?;
    let url = service
        .update(user.id, id.into_inner(), dto.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": url,
        "message": "URL updated successfully",
    })))
}

/// Delete URL route handler
pub async fn delete_url(
    user: AuthUser,
    id: web::Path<Uuid>,
    service: web::Data<ShortLinkService>,
) -> Result<impl Responder> {
    let user = user.require(Capability::ShortenUrls)?;
    let id = id.into_inner();
    service.delete(user.id, id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "deleted_id": &id,
        "message": "URL deleted successfully",
    })))
}
