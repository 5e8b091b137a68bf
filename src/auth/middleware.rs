use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::warn;

use crate::auth::roles::{Identity, RoleGate};
use crate::error::{AppError, AuthError, UnauthenticatedReason};
use crate::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Access token carried by the request: the cookie wins over the
/// `Authorization: Bearer` header.
pub fn access_token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Extractor that authenticates the request. Handlers taking it never run
/// for anonymous callers.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl Authenticated {
    pub fn identity(&self) -> &Identity {
        &self.0
    }

    /// Applies a role gate to the authenticated caller.
    pub fn require(&self, gate: &RoleGate) -> Result<&Identity, AppError> {
        gate.check(&self.0)?;
        Ok(&self.0)
    }
}

impl FromRequest for Authenticated {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = access_token_from_request(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let path = req.path().to_string();

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                AppError::InternalError("application state is not registered".into())
            })?;

            let token = token.ok_or_else(|| {
                warn!(%path, reason = %UnauthenticatedReason::MissingToken, "rejected request");
                AppError::unauthenticated(UnauthenticatedReason::MissingToken)
            })?;

            match state.auth_service.authenticate(&token).await {
                Ok(identity) => Ok(Authenticated(identity)),
                Err(AppError::AuthError(AuthError::Unauthenticated(reason))) => {
                    warn!(%path, %reason, "rejected request");
                    Err(AppError::unauthenticated(reason))
                }
                Err(e) => Err(e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    #[test]
    fn test_cookie_takes_priority_over_header() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, "from-cookie"))
            .insert_header((AUTHORIZATION, "Bearer from-header"))
            .to_http_request();

        assert_eq!(access_token_from_request(&req).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_bearer_header_fallback() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer from-header"))
            .to_http_request();

        assert_eq!(access_token_from_request(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_missing_or_malformed_token() {
        let req = TestRequest::default().to_http_request();
        assert!(access_token_from_request(&req).is_none());

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(access_token_from_request(&req).is_none());

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert!(access_token_from_request(&req).is_none());
    }
}
