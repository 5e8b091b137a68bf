use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::middleware::{Authenticated, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::auth::service::{LoginOutcome, NewUser};
use crate::auth::tokens::TokenPair;
use crate::db::models::{PublicUser, Role};
use crate::error::{AppError, AuthError, UnauthenticatedReason};
use crate::{AppState, Result};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    pub semester: Option<i32>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub login_user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            login_user: outcome.user,
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
        }
    }
}

fn session_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .finish();
    cookie.make_removal();
    cookie
}

fn with_session_cookies<'a>(
    builder: &'a mut HttpResponseBuilder,
    state: &AppState,
    tokens: &TokenPair,
) -> &'a mut HttpResponseBuilder {
    let secure = state.config.auth.cookie_secure;
    let token_service = state.auth_service.tokens();
    builder
        .cookie(session_cookie(
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.clone(),
            token_service.access_ttl_secs(),
            secure,
        ))
        .cookie(session_cookie(
            REFRESH_TOKEN_COOKIE,
            tokens.refresh_token.clone(),
            token_service.refresh_ttl_secs(),
            secure,
        ))
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    info!("Received login request for email: {}", req.email);

    if !state.login_limiter.check_rate_limit(&req.email).await {
        warn!("Login rate limit exceeded for email: {}", req.email);
        return Err(AuthError::RateLimited.into());
    }

    match state.auth_service.login(&req.email, &req.password).await {
        Ok(outcome) => {
            info!("Login successful for email: {}", req.email);
            let mut response = HttpResponse::Ok();
            with_session_cookies(&mut response, &state, &outcome.tokens);
            Ok(response.json(LoginResponse::from(outcome)))
        }
        Err(e) => {
            warn!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

/// Anonymous callers sign themselves up as students and get a session.
/// An authenticated teacher may create an account with any role; the caller's
/// own session is left untouched and no cookies are set.
pub async fn register(
    auth: Option<Authenticated>,
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    info!("Received registration request for email: {}", req.email);

    let req = req.into_inner();
    let email = req.email.clone();
    let new_user = NewUser {
        full_name: req.full_name,
        email: req.email,
        password: req.password,
        role: req.role.unwrap_or(Role::Student),
        semester: req.semester,
        avatar_url: req.avatar_url,
    };

    if let Some(auth) = auth {
        return match state.auth_service.create_account(auth.identity(), new_user).await {
            Ok(user) => {
                info!("Account created for email: {} by {}", email, auth.identity().user_id);
                Ok(HttpResponse::Created().json(user))
            }
            Err(e) => {
                error!("Account creation failed for email: {}: {}", email, e);
                Err(e)
            }
        };
    }

    match state.auth_service.register(new_user).await {
        Ok(outcome) => {
            info!("Registration successful for email: {}", email);
            let mut response = HttpResponse::Created();
            with_session_cookies(&mut response, &state, &outcome.tokens);
            Ok(response.json(LoginResponse::from(outcome)))
        }
        Err(e) => {
            error!("Registration failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

/// Refresh token from the cookie, else from the JSON body.
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let token = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            warn!(reason = %UnauthenticatedReason::MissingToken, "refresh rejected");
            AppError::unauthenticated(UnauthenticatedReason::MissingToken)
        })?;

    match state.auth_service.refresh(&token).await {
        Ok(tokens) => {
            let mut response = HttpResponse::Ok();
            with_session_cookies(&mut response, &state, &tokens);
            Ok(response.json(tokens))
        }
        Err(e) => {
            warn!("Refresh failed: {}", e);
            Err(e)
        }
    }
}

pub async fn logout(
    auth: Authenticated,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.auth_service.logout(auth.identity()).await?;

    let secure = state.config.auth.cookie_secure;
    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE, secure))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE, secure))
        .json(serde_json::json!({
            "message": "Successfully logged out"
        })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(ACCESS_TOKEN_COOKIE, "tok".into(), 900, true);
        assert_eq!(cookie.name(), "accessToken");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(900)));
    }

    #[test]
    fn test_removal_cookie_expires() {
        let cookie = removal_cookie(REFRESH_TOKEN_COOKIE, false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}
