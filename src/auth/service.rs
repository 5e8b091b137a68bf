use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::roles::{Identity, TEACHER_ONLY};
use crate::auth::tokens::{TokenKind, TokenPair, TokenService};
use crate::db::models::{PublicUser, Role, User};
use crate::db::store::UserStore;
use crate::error::{AppError, AuthError, DatabaseError, UnauthenticatedReason};
use crate::Result;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub semester: Option<i32>,
    pub avatar_url: Option<String>,
}

pub struct AuthService {
    store: Arc<dyn UserStore>,
    tokens: TokenService,
    // Verified against when the email is unknown, so both login failures cost one Argon2 run.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenService) -> Result<Self> {
        let dummy_hash = hash_password(&Uuid::new_v4().to_string())?;
        Ok(Self {
            store,
            tokens,
            dummy_hash,
        })
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Checks the credentials and starts a session.
    ///
    /// An unknown email and a wrong password fail identically, in body and in cost.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::ValidationError("email and password are required".into()));
        }

        let user = match self.store.find_by_email(email).await? {
            Some(user) if verify_password(&user.password_hash, password) => user,
            Some(_) => return Err(AuthError::InvalidCredentials.into()),
            None => {
                let _ = verify_password(&self.dummy_hash, password);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        self.start_session(user).await
    }

    /// Self-service sign-up. Only student accounts can be created this way.
    pub async fn register(&self, new_user: NewUser) -> Result<LoginOutcome> {
        if new_user.role != Role::Student {
            warn!(email = %new_user.email, role = %new_user.role, "self-registration with elevated role refused");
            return Err(AuthError::Forbidden.into());
        }

        let user = self.create_user(new_user).await?;
        self.start_session(user).await
    }

    /// Account creation on behalf of someone else; the creator must be a teacher.
    ///
    /// No session is started for the new account.
    pub async fn create_account(&self, creator: &Identity, new_user: NewUser) -> Result<PublicUser> {
        TEACHER_ONLY.check(creator)?;

        let user = self.create_user(new_user).await?;
        info!(creator = %creator.user_id, user_id = %user.id, "account created by teacher");
        Ok(PublicUser::from(&user))
    }

    /// Resolves an access token to the caller's identity.
    pub async fn authenticate(&self, access_token: &str) -> Result<Identity> {
        let claims = self.tokens.verify(access_token, TokenKind::Access)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthenticated(UnauthenticatedReason::UnknownSubject))?;

        Ok(Identity::from(&user))
    }

    /// Exchanges a refresh token for a new pair and retires the presented one.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;

        let user = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthenticated(UnauthenticatedReason::UnknownSubject))?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            warn!(user_id = %user.id, "refresh token does not match stored token, possible reuse");
            return Err(AppError::unauthenticated(UnauthenticatedReason::StaleRefreshToken));
        }

        let pair = self.tokens.issue_pair(&user)?;

        let swapped = self
            .store
            .swap_refresh_token(
                user.id,
                Some(refresh_token.to_string()),
                Some(pair.refresh_token.clone()),
            )
            .await?;
        if !swapped {
            warn!(user_id = %user.id, "lost refresh rotation race, rejecting");
            return Err(AppError::unauthenticated(UnauthenticatedReason::StaleRefreshToken));
        }

        info!(user_id = %user.id, "rotated refresh token");
        Ok(pair)
    }

    /// Clears the stored refresh token so no outstanding one can be exchanged.
    pub async fn logout(&self, identity: &Identity) -> Result<()> {
        if !self.store.set_refresh_token(identity.user_id, None).await? {
            return Err(AppError::unauthenticated(UnauthenticatedReason::UnknownSubject));
        }

        info!(user_id = %identity.user_id, "logged out");
        Ok(())
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        self.store.find_by_id(id).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        validate_new_user(&new_user)?;

        if self.store.find_by_email(&new_user.email).await?.is_some() {
            return Err(DatabaseError::Duplicate.into());
        }

        let password_hash = hash_password(&new_user.password)?;
        let user = User::new(new_user.email, password_hash, new_user.role, new_user.full_name)
            .with_profile(new_user.semester, new_user.avatar_url);

        self.store.save(&user).await?;
        info!(user_id = %user.id, role = %user.role, "registered user");
        Ok(user)
    }

    async fn start_session(&self, mut user: User) -> Result<LoginOutcome> {
        let tokens = self.tokens.issue_pair(&user)?;

        if !self
            .store
            .set_refresh_token(user.id, Some(tokens.refresh_token.clone()))
            .await?
        {
            return Err(AppError::unauthenticated(UnauthenticatedReason::UnknownSubject));
        }
        user.refresh_token = Some(tokens.refresh_token.clone());

        Ok(LoginOutcome {
            user: PublicUser::from(&user),
            tokens,
        })
    }
}

fn validate_new_user(new_user: &NewUser) -> Result<()> {
    if new_user.full_name.trim().is_empty() {
        return Err(AppError::ValidationError("full name is required".into()));
    }
    if !new_user.email.contains('@') || new_user.email.trim() != new_user.email {
        return Err(AppError::ValidationError("a valid email is required".into()));
    }
    if new_user.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::ValidationError(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
