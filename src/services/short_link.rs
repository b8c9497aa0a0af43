// src/services/short_link.rs - Business logic
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use url::Url;
use uuid::Uuid;
use validator::Validate;

use super::with_deadline;
use crate::config::Config;
use crate::errors::ServiceError;
use crate::models::{
    NewShortLink, Page, PageQuery, QrOptions, ShortLink, ShortLinkResponseDto, ShortenRequest,
    ShortenResponse, UpdateShortLinkRequest, User,
};
use crate::repositories::ShortLinkRepositoryTrait;
use crate::utils::{qr_code, short_code};
use crate::validations::check_long_url;

type Result<T> = std::result::Result<T, ServiceError>;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ShortLinkService {
    repository: Arc<dyn ShortLinkRepositoryTrait>,
    base_url: String,
    own_bases: Vec<Url>,
    max_attempts: u32,
    timeout: Duration,
}

impl ShortLinkService {
    pub fn new(
        repository: Arc<dyn ShortLinkRepositoryTrait>,
        base_url: impl Into<String>,
        own_bases: Vec<Url>,
    ) -> Self {
        Self {
            repository,
            base_url: base_url.into(),
            own_bases,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    pub fn from_config(repository: Arc<dyn ShortLinkRepositoryTrait>, config: &Config) -> Self {
        Self::new(repository, config.app.base_url.clone(), config.own_base_urls())
            .with_max_attempts(config.links.max_code_attempts)
            .with_timeout(Duration::from_secs(config.links.storage_timeout_secs))
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/r/{}", self.base_url, short_code)
    }

    fn render(&self, short_code: &str, options: &QrOptions) -> Result<String> {
        Ok(qr_code::render(&self.short_url(short_code), options)?)
    }

    fn accept_long_url(&self, candidate: &str) -> Result<String> {
        check_long_url(candidate, &self.own_bases)
            .map_err(|rejection| ServiceError::Validation(rejection.to_string()))?;
        Ok(candidate.trim().to_string())
    }

    fn to_dto(&self, link: ShortLink) -> ShortLinkResponseDto {
        ShortLinkResponseDto::from_link(link, &self.base_url)
    }

    /// Creates a link for `owner`, or returns the one already created with identical options
    pub async fn shorten(&self, owner: &User, request: ShortenRequest) -> Result<ShortenResponse> {
        if let Err(e) = request.validate() {
            return Err(ServiceError::Validation(e.to_string()));
        }

        let long_url = self.accept_long_url(&request.long_url)?;
        let options = request.qr_options.unwrap_or_default().normalized();

        let existing = with_deadline(
            self.timeout,
            self.repository
                .find_existing(owner.id, long_url.clone(), options.clone()),
        )
        .await?;

        if let Some(link) = existing {
            debug!("Reusing short link {} for {}", link.short_code, long_url);
            return Ok(ShortenResponse {
                qrcode: self.render(&link.short_code, &options)?,
                short_url: self.short_url(&link.short_code),
            });
        }

        for attempt in 1..=self.max_attempts {
            let code = short_code::generate_short_code()?;
            // Render first so an unrenderable request leaves nothing behind
            let qrcode = self.render(&code, &options)?;

            let new_link = NewShortLink {
                long_url: long_url.clone(),
                short_code: code,
                user_id: owner.id,
                options: options.clone(),
            };

            match with_deadline(self.timeout, self.repository.insert(new_link)).await {
                Ok(link) => {
                    info!("Created short link {} for user {}", link.short_code, owner.id);
                    return Ok(ShortenResponse {
                        short_url: self.short_url(&link.short_code),
                        qrcode,
                    });
                }
                Err(ServiceError::Conflict(_)) => {
                    warn!(
                        "Short code collision on attempt {}/{}",
                        attempt, self.max_attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(ServiceError::Internal(format!(
            "Failed to generate a unique short code after {} attempts",
            self.max_attempts
        )))
    }

    /// Destination of an active link; counts the visit
    pub async fn resolve(&self, code: &str) -> Result<String> {
        if !short_code::is_short_code(code) {
            return Err(ServiceError::NotFound(format!("Short code '{}' not found", code)));
        }

        with_deadline(self.timeout, self.repository.resolve_and_count(code.to_string()))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Short code '{}' not found", code)))
    }

    pub async fn list(&self, owner_id: Uuid, query: &PageQuery) -> Result<Page<ShortLinkResponseDto>> {
        let page = query.page_request();
        let (links, total) = with_deadline(
            self.timeout,
            self.repository
                .find_by_owner(owner_id, page, query.search_term()),
        )
        .await?;

        Ok(Page::new(links, page, total).map(|link| self.to_dto(link)))
    }

    /// A single owned link with its QR code rendered again from the stored options
    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<ShortLinkResponseDto> {
        let link = with_deadline(self.timeout, self.repository.find_by_id_for_owner(id, owner_id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("URL with ID {} not found", id)))?;

        let qrcode = self.render(&link.short_code, &link.qr_options())?;
        Ok(self.to_dto(link).with_qrcode(qrcode))
    }

    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        request: UpdateShortLinkRequest,
    ) -> Result<ShortLinkResponseDto> {
        if let Err(e) = request.validate() {
            return Err(ServiceError::Validation(e.to_string()));
        }
        let long_url = self.accept_long_url(&request.long_url)?;

        let link = with_deadline(
            self.timeout,
            self.repository.update_long_url(id, owner_id, long_url),
        )
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("URL with ID {} not found", id)))?;

        Ok(self.to_dto(link))
    }

    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<()> {
        let deleted = with_deadline(self.timeout, self.repository.soft_delete(id, owner_id)).await?;
        if !deleted {
            return Err(ServiceError::NotFound(format!("URL with ID {} not found", id)));
        }
        info!("Deleted short link {} of user {}", id, owner_id);
        Ok(())
    }
}
