use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;

mod auth;
pub mod keep_alive;
mod rate_limiter;
mod short_link;
mod user;

#[cfg(test)]
pub use auth::MockIdentityProvider;
pub use auth::{
    new_state, GoogleIdentityProvider, IdentityProvider, SessionManager, SESSION_COOKIE,
    STATE_COOKIE,
};
pub use rate_limiter::RateLimiter;
pub use short_link::ShortLinkService;
pub use user::UserService;

use crate::{
    config::Config,
    db::Database,
    errors::{RepositoryError, ServiceError},
    repositories::{PgShortLinkRepository, PgUserRepository},
};

/// Deadline for every outbound HTTP request
pub const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client whose requests fail after `timeout` instead of hanging
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Bounds a storage call; an expired deadline fails instead of hanging
pub(crate) async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ServiceError::Timeout(timeout))?
        .map_err(ServiceError::from)
}

/// Shared application services, built once and handed to every worker
#[derive(Clone)]
pub struct Services {
    pub links: web::Data<ShortLinkService>,
    pub users: web::Data<UserService>,
    pub sessions: web::Data<SessionManager>,
    pub identity: web::Data<dyn IdentityProvider>,
}

impl Services {
    pub fn new(db: Database, config: &Config) -> Result<Self, ServiceError> {
        // create repositories
        let link_repository = PgShortLinkRepository::new(db.clone());
        let user_repository = PgUserRepository::new(db);
        let timeout = Duration::from_secs(config.links.storage_timeout_secs);

        let identity: Arc<dyn IdentityProvider> =
            Arc::new(GoogleIdentityProvider::new(&config.auth, &config.app)?);

        Ok(Self {
            links: web::Data::new(ShortLinkService::from_config(
                Arc::new(link_repository),
                config,
            )),
            users: web::Data::new(UserService::new(Arc::new(user_repository), timeout)),
            sessions: web::Data::new(SessionManager::from_config(&config.auth)),
            identity: web::Data::from(identity),
        })
    }

    /// Service Register
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.links.clone())
            .app_data(self.users.clone())
            .app_data(self.sessions.clone())
            .app_data(self.identity.clone());
    }
}
