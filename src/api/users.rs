use actix_web::{web, HttpResponse};
use tracing::info;
use uuid::Uuid;

use crate::auth::middleware::Authenticated;
use crate::auth::roles::{ANY_ROLE, TEACHER_ONLY};
use crate::db::models::PublicUser;
use crate::error::{AppError, DatabaseError, UnauthenticatedReason};
use crate::{AppState, Result};

/// The caller's own profile.
pub async fn current_user(
    auth: Authenticated,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let identity = auth.require(&ANY_ROLE)?;

    let user = state
        .auth_service
        .find_user(identity.user_id)
        .await?
        .ok_or_else(|| AppError::unauthenticated(UnauthenticatedReason::UnknownSubject))?;

    Ok(HttpResponse::Ok().json(PublicUser::from(&user)))
}

/// Looks up any account by id. Teachers only.
pub async fn get_user(
    auth: Authenticated,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let identity = auth.require(&TEACHER_ONLY)?;
    let id = path.into_inner();

    let user = state
        .auth_service
        .find_user(id)
        .await?
        .ok_or(DatabaseError::NotFound)?;

    info!(requested_by = %identity.user_id, user_id = %id, "user lookup");
    Ok(HttpResponse::Ok().json(PublicUser::from(&user)))
}
