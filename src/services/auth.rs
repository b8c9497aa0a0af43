// src/services/auth.rs - Google sign-in and session cookies
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, warn};
#[cfg(test)]
use mockall::automock;
use rand::{rngs::OsRng, TryRngCore};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::config::{AppConfig, AuthConfig};
use crate::errors::ServiceError;
use crate::models::GoogleProfile;

type Result<T> = std::result::Result<T, ServiceError>;

pub const SESSION_COOKIE: &str = "session";
pub const STATE_COOKIE: &str = "oauth_state";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Seconds a sign-in attempt may take between `/auth/login` and the callback
const STATE_TTL_SECS: i64 = 600;

/// Session Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies the signed session cookie
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_hours: i64,
    secure: bool,
}

impl SessionManager {
    pub fn new(secret: &str, ttl_hours: i64, secure: bool) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
            secure,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.session_secret, config.session_ttl_hours, config.cookie_secure)
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("Failed to sign session: {}", e)))
    }

    /// User id carried by a valid, unexpired session token
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| {
                debug!("Rejected session token: {}", e);
                ServiceError::Authentication("Invalid or expired session".to_string())
            })?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::Authentication("Invalid session subject".to_string()))
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        self.cookie(SESSION_COOKIE, token, CookieDuration::hours(self.ttl_hours))
    }

    pub fn state_cookie(&self, state: String) -> Cookie<'static> {
        self.cookie(STATE_COOKIE, state, CookieDuration::seconds(STATE_TTL_SECS))
    }

    /// Expired cookie that makes the browser drop `name`
    pub fn removal_cookie(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = self.cookie(name, String::new(), CookieDuration::ZERO);
        cookie.make_removal();
        cookie
    }

    fn cookie(&self, name: &'static str, value: String, max_age: CookieDuration) -> Cookie<'static> {
        Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(max_age)
            .finish()
    }
}

/// Random value tying a callback to the browser that started the sign-in
pub fn new_state() -> Result<String> {
    let mut bytes = [0u8; 24];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("Failed to generate OAuth state: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// External identity provider used for sign-in
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent page the browser is sent to
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Trades an authorization code for the signed-in user's profile
    async fn exchange(&self, code: String) -> Result<GoogleProfile>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleIdentityProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleIdentityProvider {
    pub fn new(auth: &AuthConfig, app: &AppConfig) -> Result<Self> {
        if auth.google_client_id.is_empty() || auth.google_client_secret.is_empty() {
            warn!("GOOGLE_CLIENT_ID or GOOGLE_CLIENT_SECRET is empty, sign-in will fail");
        }

        Ok(Self {
            client: super::http_client(super::OUTBOUND_TIMEOUT)?,
            client_id: auth.google_client_id.clone(),
            client_secret: auth.google_client_secret.clone(),
            redirect_uri: format!("{}/auth/callback", app.base_url),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorize_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| ServiceError::Internal(format!("Invalid authorization URL: {}", e)))?;

        Ok(url.into())
    }

    async fn exchange(&self, code: String) -> Result<GoogleProfile> {
        let auth_error = |e: reqwest::Error| ServiceError::Authentication(e.to_string());

        let token: TokenResponse = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(auth_error)?
            .json()
            .await
            .map_err(auth_error)?;

        let profile: GoogleProfile = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(auth_error)?
            .json()
            .await
            .map_err(auth_error)?;

        debug!("Google sign-in for {}", profile.email);
        Ok(profile)
    }
}
