use actix_web::{
    http::{header::CACHE_CONTROL, Method},
    HttpRequest, HttpResponse, ResponseError,
};
use log::trace;
use rust_embed::Embed;

use crate::errors::AppError;

/// Built single-page application, embedded at compile time
#[derive(Embed)]
#[folder = "frontend/dist/"]
struct FrontendAssets;

const INDEX: &str = "index.html";

fn not_found(path: &str) -> HttpResponse {
    AppError::NotFound(format!("No route for {}", path)).error_response()
}

fn serve_asset(path: &str) -> Option<HttpResponse> {
    let asset = FrontendAssets::get(path)?;
    // Hashed bundles never change; the shell must always be revalidated
    let cache = if path.starts_with("assets/") {
        "public, max-age=31536000, immutable"
    } else {
        "no-cache"
    };

    Some(
        HttpResponse::Ok()
            .content_type(asset.metadata.mimetype())
            .insert_header((CACHE_CONTROL, cache))
            .body(asset.data.into_owned()),
    )
}

/// Fallback for every unmatched route: static files by path, `index.html` for client-side routes
pub async fn spa(req: HttpRequest) -> HttpResponse {
    let path = req.path();
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return not_found(path);
    }
    // Unknown API routes answer in JSON instead of the HTML shell
    if path.starts_with("/api/") || path.starts_with("/auth/") {
        return not_found(path);
    }

    let file = path.trim_start_matches('/');
    let looks_like_file = file.rsplit('/').next().is_some_and(|name| name.contains('.'));

    if looks_like_file {
        trace!("Serving static file: {}", file);
        return serve_asset(file).unwrap_or_else(|| not_found(path));
    }

    trace!("SPA fallback for {}", path);
    serve_asset(INDEX).unwrap_or_else(|| not_found(path))
}
