use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;

use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::REFERER,
    Error, ResponseError,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::{debug, warn};

use crate::errors::AppError;
use crate::services::RateLimiter;

/// Path prefixes that are never throttled
const EXEMPT_PREFIXES: [&str; 4] = ["/auth/", "/ping", "/health", "/r/"];

/// Avatar images loaded from Google's CDN carry this referrer host
const EXEMPT_REFERER_HOST: &str = "googleusercontent.com";

/// Throttles requests per client IP with the shared [`RateLimiter`]
pub struct RateLimit {
    limiter: RateLimiter,
}

impl RateLimit {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        })
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: RateLimiter,
}

fn is_exempt(req: &ServiceRequest) -> bool {
    let path = req.path();
    if EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }

    req.headers()
        .get(REFERER)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|referer| referer.contains(EXEMPT_REFERER_HOST))
}

/// Best guess at the caller's address, forwarded headers first
fn client_ip(req: &ServiceRequest) -> IpAddr {
    let conn = req.connection_info();
    conn.realip_remote_addr()
        .and_then(|raw| {
            raw.parse::<IpAddr>()
                .ok()
                .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
        })
        .or_else(|| req.peer_addr().map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !is_exempt(&req) {
            let ip = client_ip(&req);
            if !self.limiter.allow(ip) {
                warn!("Rate limit exceeded for {} on {}", ip, req.path());
                let response = AppError::TooManyRequests.error_response();
                return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
            }
            debug!("Rate limit passed for {}", ip);
        }

        let service = self.service.clone();
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
