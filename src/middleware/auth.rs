use std::ops::Deref;

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use log::debug;

use crate::errors::AppError;
use crate::models::{Capability, User};
use crate::services::{SessionManager, UserService, SESSION_COOKIE};

/// The signed-in member behind the request's session cookie
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    /// Fails with 403 unless the member's role grants `capability`
    pub fn require(self, capability: Capability) -> Result<Self, AppError> {
        if self.0.can(capability) {
            Ok(self)
        } else {
            debug!("User {} ({}) lacks {:?}", self.0.id, self.0.role, capability);
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }

    pub fn into_inner(self) -> User {
        self.0
    }
}

impl Deref for AuthUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let sessions = req.app_data::<web::Data<SessionManager>>().cloned();
        let users = req.app_data::<web::Data<UserService>>().cloned();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());

        Box::pin(async move {
            let (Some(sessions), Some(users)) = (sessions, users) else {
                return Err(AppError::Internal(
                    "Session services are not registered".to_string(),
                ));
            };

            let token = token.ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))?;
            let user_id = sessions.verify(&token)?;

            users
                .find(user_id)
                .await?
                .map(AuthUser)
                .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))
        })
    }
}
