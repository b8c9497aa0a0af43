use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;

use crate::{
    middleware::AuthUser,
    models::{AdminScope, PageQuery, UpdateRoleRequest},
    services::{SessionManager, ShortLinkService, UserService, SESSION_COOKIE},
    types::Result,
};

/// List users route handler
pub async fn list_users(
    user: AuthUser,
    scope: web::Data<AdminScope>,
    query: web::Query<PageQuery>,
    users: web::Data<UserService>,
) -> Result<impl Responder> {
    let page = users.list_users(&user, **scope, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Get user by ID route handler
pub async fn get_user(
    user: AuthUser,
    scope: web::Data<AdminScope>,
    id: web::Path<Uuid>,
    users: web::Data<UserService>,
) -> Result<impl Responder> {
    let target = users.detail(&user, **scope, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": target,
        "message": "Successfully retrieved user",
    })))
}

/// Links owned by another member
pub async fn get_user_urls(
    user: AuthUser,
    scope: web::Data<AdminScope>,
    id: web::Path<Uuid>,
    query: web::Query<PageQuery>,
    users: web::Data<UserService>,
    links: web::Data<ShortLinkService>,
) -> Result<impl Responder> {
    let target = users.detail(&user, **scope, id.into_inner()).await?;
    let page = links.list(target.id, &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Update user role route handler
pub async fn update_role(
    user: AuthUser,
    scope: web::Data<AdminScope>,
    id: web::Path<Uuid>,
    dto: web::Json<UpdateRoleRequest>,
    users: web::Data<UserService>,
) -> Result<impl Responder> {
    let updated = users
        .change_role(&user, **scope, id.into_inner(), dto.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "data": updated,
        "message": "User role updated successfully",
    })))
}

/// Self-service account deletion
pub async fn delete_account(
    user: AuthUser,
    id: web::Path<Uuid>,
    users: web::Data<UserService>,
    sessions: web::Data<SessionManager>,
) -> Result<impl Responder> {
    let id = id.into_inner();
    users.delete_account(&user, id).await?;
    Ok(HttpResponse::Ok()
        .cookie(sessions.removal_cookie(SESSION_COOKIE))
        .json(json!({
            "deleted_id": &id,
            "message": "Account deleted successfully",
        })))
}
