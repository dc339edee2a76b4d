/// Authentication Routes
///
/// Thin HTTP binding for registration, login, token refresh, logout and the
/// current identity. All decisions are made by the authentication core.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthServices, AuthenticatedUser};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::validators::{is_valid_email, is_valid_name, is_valid_password};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub user_id: Uuid,
    pub refresh_token: String,
}

/// Current identity, without credentials
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub provider: String,
    pub created_at: String,
}

/// POST /auth/register
///
/// # Errors
/// - 400: Validation errors (invalid names/email/password)
/// - 409: Email already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let first_name = is_valid_name("first name", &form.first_name)?;
    let last_name = is_valid_name("last name", &form.last_name)?;
    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;

    let pair = auth
        .issuer
        .register(&first_name, &last_name, &email, &form.password)
        .await
        .map_err(|e| context.log_error(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %pair.user_id,
        "Registration completed"
    );

    Ok(HttpResponse::Created().json(pair))
}

/// POST /auth/login
///
/// # Errors
/// - 401: Unknown email or wrong password (same response for both)
/// - 500: Internal server error
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let pair = auth
        .issuer
        .login(&form.email, &form.password)
        .await
        .map_err(|e| context.log_error(e))?;

    Ok(HttpResponse::Ok().json(pair))
}

/// POST /auth/refresh
///
/// Exchanges the current refresh secret for a new token pair. A stale secret
/// revokes the whole session.
///
/// # Errors
/// - 401: No session, expired session, or reused secret
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh").with_user_id(form.user_id.to_string());

    let pair = auth
        .rotator
        .rotate(form.user_id, &form.refresh_token)
        .await
        .map_err(|e| context.log_error(e))?;

    Ok(HttpResponse::Ok().json(pair))
}

/// POST /api/logout
///
/// Ends the caller's refresh session. Access tokens already issued stay valid
/// until they expire.
pub async fn logout(
    user: web::ReqData<AuthenticatedUser>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    auth.rotator.revoke(user.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/me
///
/// **Requires valid access token** in the Authorization header; the identity
/// is injected by the access guard middleware.
pub async fn get_current_user(
    user: web::ReqData<AuthenticatedUser>,
    auth: web::Data<AuthServices>,
) -> Result<HttpResponse, AppError> {
    let identity = auth
        .store
        .find_by_id(user.user_id)
        .await?
        .ok_or(AppError::Auth(AuthError::Unauthenticated))?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: identity.id.to_string(),
        email: identity.email,
        first_name: identity.first_name,
        last_name: identity.last_name,
        provider: identity.provider.to_string(),
        created_at: identity.created_at.to_rfc3339(),
    }))
}
