use actix_web::{http::header::LOCATION, web, HttpRequest, HttpResponse, Responder};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::{
    errors::ServiceError,
    middleware::AuthUser,
    services::{
        new_state, IdentityProvider, SessionManager, UserService, SESSION_COOKIE, STATE_COOKIE,
    },
    types::Result,
};

/// Frontend route that finishes a successful sign-in
pub const SIGNED_IN_REDIRECT: &str = "/callback";
pub const SIGN_IN_FAILED_REDIRECT: &str = "/error?error=authentication_failed";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Starts the Google sign-in flow
pub async fn login(
    sessions: web::Data<SessionManager>,
    identity: web::Data<dyn IdentityProvider>,
) -> Result<impl Responder> {
    let state = new_state()?;
    let authorize_url = identity.authorize_url(&state)?;

    Ok(HttpResponse::TemporaryRedirect()
        .insert_header((LOCATION, authorize_url))
        .cookie(sessions.state_cookie(state))
        .finish())
}

async fn complete_sign_in(
    req: &HttpRequest,
    query: CallbackQuery,
    sessions: &SessionManager,
    identity: &dyn IdentityProvider,
    users: &UserService,
) -> std::result::Result<String, ServiceError> {
    if let Some(error) = query.error {
        return Err(ServiceError::Authentication(format!("Provider returned {}", error)));
    }

    let expected_state = req.cookie(STATE_COOKIE).map(|c| c.value().to_string());
    match (expected_state, query.state) {
        (Some(expected), Some(state)) if !expected.is_empty() && expected == state => {}
        _ => return Err(ServiceError::Authentication("OAuth state mismatch".to_string())),
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ServiceError::Authentication("Missing authorization code".to_string()))?;

    let profile = identity.exchange(code).await?;
    let user = users.login(profile).await?;
    sessions.issue(user.id)
}

/// Google redirects here after consent
pub async fn callback(
    req: HttpRequest,
    query: web::Query<CallbackQuery>,
    sessions: web::Data<SessionManager>,
    identity: web::Data<dyn IdentityProvider>,
    users: web::Data<UserService>,
) -> impl Responder {
    let outcome = complete_sign_in(
        &req,
        query.into_inner(),
        &sessions,
        identity.get_ref(),
        &users,
    )
    .await;

    let mut response = HttpResponse::TemporaryRedirect();
    response.cookie(sessions.removal_cookie(STATE_COOKIE));

    match outcome {
        Ok(token) => {
            info!("Sign-in completed");
            response
                .cookie(sessions.session_cookie(token))
                .insert_header((LOCATION, SIGNED_IN_REDIRECT))
                .finish()
        }
        Err(e) => {
            warn!("Sign-in failed: {}", e);
            response
                .insert_header((LOCATION, SIGN_IN_FAILED_REDIRECT))
                .finish()
        }
    }
}

/// Current member
pub async fn profile(user: AuthUser) -> Result<impl Responder> {
    Ok(HttpResponse::Ok().json(user.into_inner()))
}

pub async fn logout(sessions: web::Data<SessionManager>) -> Result<impl Responder> {
    Ok(HttpResponse::Ok()
        .cookie(sessions.removal_cookie(SESSION_COOKIE))
        .json(json!({ "message": "Logged out successfully" })))
}

#[cfg(test)]
mod tests {
    use actix_web::{cookie::Cookie, http::StatusCode, test};
    use mockall::predicate::eq;
    use serde_json::Value;

    use super::*;
    use crate::handlers::testing::TestContext;
    use crate::models::{GoogleProfile, Role};
    use crate::services::MockIdentityProvider;

    fn profile() -> GoogleProfile {
        GoogleProfile {
            google_id: "google-42".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            picture: "https://lh3.googleusercontent.com/a/ada".to_string(),
        }
    }

    #[actix_web::test]
    async fn test_login_redirects_with_state_cookie() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_authorize_url()
            .returning(|state| Ok(format!("https://accounts.google.com/o/oauth2/v2/auth?state={}", state)));
        let ctx = TestContext::with_identity(identity);
        let app = test::init_service(ctx.app()).await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/auth/login").to_request()).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);

        let state = res
            .response()
            .cookies()
            .find(|c| c.name() == STATE_COOKIE)
            .unwrap()
            .value()
            .to_string();
        let location = res.headers().get(LOCATION).unwrap().to_str().unwrap();
        assert!(location.ends_with(&format!("state={}", state)));
    }

    #[actix_web::test]
    async fn test_callback_signs_in_and_sets_session() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_exchange()
            .with(eq("auth-code".to_string()))
            .times(1)
            .returning(|_| Ok(profile()));
        let ctx = TestContext::with_identity(identity);
        let app = test::init_service(ctx.app()).await;

        let req = test::TestRequest::get()
            .uri("/auth/callback?code=auth-code&state=s1")
            .cookie(Cookie::new(STATE_COOKIE, "s1"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers().get(LOCATION).unwrap(), SIGNED_IN_REDIRECT);

        let session = res
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .unwrap()
            .into_owned();

        let req = test::TestRequest::get()
            .uri("/auth/profile")
            .cookie(session)
            .to_request();
        let me: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(me["email"], "ada@example.com");
        assert_eq!(me["role"], "COMMUNITY");
    }

    #[actix_web::test]
    async fn test_callback_failures_redirect_to_error_page() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_exchange()
            .returning(|_| Err(ServiceError::Authentication("invalid_grant".to_string())));
        let ctx = TestContext::with_identity(identity);
        let app = test::init_service(ctx.app()).await;

        let requests = [
            // Provider refused
            test::TestRequest::get()
                .uri("/auth/callback?code=bad&state=s1")
                .cookie(Cookie::new(STATE_COOKIE, "s1")),
            // Forged state
            test::TestRequest::get()
                .uri("/auth/callback?code=abc&state=evil")
                .cookie(Cookie::new(STATE_COOKIE, "s1")),
            // User denied consent
            test::TestRequest::get().uri("/auth/callback?error=access_denied"),
        ];

        for req in requests {
            let res = test::call_service(&app, req.to_request()).await;
            assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
            assert_eq!(res.headers().get(LOCATION).unwrap(), SIGN_IN_FAILED_REDIRECT);
            assert!(res.response().cookies().all(|c| c.name() != SESSION_COOKIE));
        }
    }

    #[actix_web::test]
    async fn test_profile_requires_session() {
        let ctx = TestContext::new();
        let member = ctx.user(Role::CoreTeam);
        let app = test::init_service(ctx.app()).await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/auth/profile").to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/auth/profile")
            .cookie(Cookie::new(SESSION_COOKIE, "garbage"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/auth/profile")
            .cookie(ctx.session_cookie(&member))
            .to_request();
        let me: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(me["role"], "CORE_TEAM");
    }

    #[actix_web::test]
    async fn test_logout_clears_session() {
        let ctx = TestContext::new();
        let app = test::init_service(ctx.app()).await;

        let res = test::call_service(&app, test::TestRequest::post().uri("/auth/logout").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .unwrap();
        assert_eq!(cookie.value(), "");
    }
}
