use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::extractor::AuthUser;
use crate::auth::jwt::{Claims, encode_token};
use crate::auth::password;
use crate::db;
use crate::db::users::NewUser;
use crate::error::AppError;
use crate::extract::Json;
use crate::models::{User, UserRole};
use crate::routes::MessageResponse;
use crate::state::SharedState;
use crate::validation;

const REFRESH_TOKEN_DAYS: i64 = 7;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignUpRequest {
    pub role_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "The lastname field is required"))]
    pub lastname: String,
    #[validate(length(min = 1, max = 255, message = "The firstname field is required"))]
    pub firstname: String,
    #[validate(email(message = "The value is not a valid email address"))]
    pub email: String,
    #[validate(
        custom(function = "validation::strong_password"),
        must_match(other = "password_confirmation", message = "The password confirmation does not match")
    )]
    pub password: String,
    pub password_confirmation: String,
    #[validate(custom(function = "validation::ipv4"))]
    pub ip_address: String,
    #[validate(length(min = 1, max = 45, message = "The ip_region field is required"))]
    pub ip_region: String,
    #[validate(length(min = 1, max = 8, message = "The currency_code field is required"))]
    pub currency_code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignInRequest {
    #[validate(email(message = "The value is not a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "The password field is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyCodeRequest {
    #[validate(email(message = "The value is not a valid email address"))]
    pub email: String,
    #[validate(range(min = 100_000, max = 999_999, message = "The code must have 6 digits"))]
    pub code: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResendCodeRequest {
    #[validate(email(message = "The value is not a valid email address"))]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
}

fn auth_cookies(access_token: &str, refresh_token: &str) -> CookieJar {
    let access = Cookie::build(("access_token", access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(15))
        .build();

    let refresh = Cookie::build(("refresh_token", refresh_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(REFRESH_TOKEN_DAYS))
        .build();

    CookieJar::new().add(access).add(refresh)
}

fn clear_auth_cookies() -> CookieJar {
    let access = Cookie::build(("access_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    let refresh = Cookie::build(("refresh_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    CookieJar::new().add(access).add(refresh)
}

fn generate_refresh_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue an access token and a fresh refresh token for `user`.
async fn issue_tokens(
    state: &SharedState,
    user: &User,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let role = db::user_roles::find_by_id(&state.pool, user.role_id)
        .await?
        .map(|r| r.name)
        .unwrap_or_default();

    let claims = Claims::new(user.id, role);
    let token = encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)?;

    let refresh = generate_refresh_token();
    db::refresh_tokens::create(
        &state.pool,
        user.id,
        &hash_token(&refresh),
        Utc::now() + Duration::days(REFRESH_TOKEN_DAYS),
    )
    .await?;

    let jar = auth_cookies(&token, &refresh);
    Ok((
        jar,
        Json(TokenResponse {
            token,
            token_type: "bearer".to_string(),
            expires_at: claims.expires_at(),
            refresh_token: refresh,
        }),
    ))
}

/// A used refresh token came back: revoke every session of its owner.
async fn revoke_on_reuse(state: &SharedState, user_id: Uuid) -> Result<AppError, AppError> {
    tracing::warn!(%user_id, "Refresh token reuse detected. Revoking all sessions.");
    db::refresh_tokens::delete_all_for_user(&state.pool, user_id).await?;
    Ok(AppError::Unauthorized(
        "Refresh token reuse detected. All sessions revoked.".to_string(),
    ))
}

/// Send mail off the request path; failures are only logged.
fn send_code_in_background(state: &SharedState, user: User, code: i32, is_new: bool) {
    let Some(mailer) = state.providers.mailer.clone() else {
        tracing::warn!(email = %user.email, "Mail transport not configured. Activation code: {code}");
        return;
    };

    tokio::spawn(async move {
        let name = user.display_name();
        let result = if is_new {
            mailer.send_new_code(&user.email, &name, code).await
        } else {
            mailer.send_activation_code(&user.email, &name, code).await
        };
        if let Err(e) = result {
            tracing::error!(email = %user.email, "Failed to send activation code: {e}");
        }
    });
}

#[utoipa::path(
    post,
    path = "/signup",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created, activation code sent", body = MessageResponse),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Email already taken")
    )
)]
pub async fn sign_up(
    State(state): State<SharedState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    req.validate()?;

    let role: UserRole = db::user_roles::find_by_id(&state.pool, req.role_id)
        .await?
        .ok_or_else(|| AppError::field("role_id", "exists", "The selected role does not exist"))?;

    let email = req.email.trim().to_lowercase();
    if db::users::find_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict(
            "The email address is already taken".to_string(),
        ));
    }

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;
    let code = password::activation_code();

    let mut tx = state.pool.begin().await?;
    let user = db::users::create(
        &mut *tx,
        &NewUser {
            role_id: role.id,
            lastname: req.lastname.trim(),
            firstname: req.firstname.trim(),
            email: &email,
            password_hash: &pw_hash,
            currency_code: &req.currency_code,
            ip_address: &req.ip_address,
            ip_region: &req.ip_region,
            active_code: code,
        },
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict("The email address is already taken".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    // Mirror into the identity provider before committing; dropping `tx` on
    // any error below rolls the local user back.
    if let Some(identity) = state.providers.identity.as_ref() {
        let keycloak_id = identity
            .create_user(&email, &req.password, req.firstname.trim(), req.lastname.trim())
            .await?;

        if let Err(e) = identity.assign_realm_role(&keycloak_id, &role.name).await {
            if let Err(cleanup) = identity.delete_user(&keycloak_id).await {
                tracing::error!(%keycloak_id, "Failed to delete orphaned identity user: {cleanup}");
            }
            return Err(e.into());
        }

        db::users::set_keycloak_id(&mut *tx, user.id, &keycloak_id).await?;
    }

    tx.commit().await?;
    tracing::info!(user_id = %user.id, role = %role.name, "User signed up");

    send_code_in_background(&state, user, code, false);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Account created successfully")),
    ))
}

#[utoipa::path(
    post,
    path = "/signIn",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Authentication failed"),
        (status = 403, description = "Account not activated"),
        (status = 429, description = "Too many failed attempts")
    )
)]
pub async fn sign_in(
    State(state): State<SharedState>,
    Json(req): Json<SignInRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    req.validate()?;

    if state.login_limiter.check(&req.email).is_err() {
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let failed = || AppError::Unauthorized("Authentication failed".to_string());

    let Some(user) = db::users::find_by_email(&state.pool, req.email.trim()).await? else {
        state.login_limiter.record_failure(&req.email);
        return Err(failed());
    };

    let valid = password::verify(&req.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&req.email);
        return Err(failed());
    }

    if !user.is_active {
        return Err(AppError::Forbidden(
            "Account is not activated".to_string(),
        ));
    }

    state.login_limiter.reset(&req.email);
    tracing::info!(user_id = %user.id, "User signed in");
    issue_tokens(&state, &user).await
}

#[utoipa::path(
    post,
    path = "/signOut",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All sessions revoked", body = MessageResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn sign_out(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let revoked = db::refresh_tokens::delete_all_for_user(&state.pool, auth.user_id).await?;
    tracing::info!(user_id = %auth.user_id, revoked, "User signed out");

    Ok((
        clear_auth_cookies(),
        Json(MessageResponse::new("Logged out from all sessions")),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body(content = RefreshRequest, description = "Falls back to the refresh_token cookie"),
    responses(
        (status = 200, description = "Token pair rotated", body = TokenResponse),
        (status = 401, description = "Missing, expired, or reused refresh token")
    )
)]
pub async fn refresh(
    State(state): State<SharedState>,
    jar: CookieJar,
    body: Option<axum::Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let refresh_value = body
        .map(|axum::Json(b)| b.refresh_token)
        .or_else(|| jar.get("refresh_token").map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let stored = db::refresh_tokens::find_by_hash(&state.pool, &hash_token(&refresh_value))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    if stored.used {
        return Err(revoke_on_reuse(&state, stored.user_id).await?);
    }

    if stored.expires_at < Utc::now() {
        return Err(AppError::Unauthorized("Refresh token expired".to_string()));
    }

    if !db::refresh_tokens::mark_used(&state.pool, stored.id).await? {
        return Err(revoke_on_reuse(&state, stored.user_id).await?);
    }

    let user = db::users::find_by_id(&state.pool, stored.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    issue_tokens(&state, &user).await
}

#[utoipa::path(
    post,
    path = "/verify-code",
    tag = "auth",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Account activated", body = MessageResponse),
        (status = 400, description = "Invalid code"),
        (status = 429, description = "Too many wrong codes")
    )
)]
pub async fn verify_code(
    State(state): State<SharedState>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    req.validate()?;

    if state.activation_limiter.check(&req.email).is_err() {
        return Err(AppError::RateLimited(
            "Too many attempts. Please try again later.".to_string(),
        ));
    }

    let invalid = || AppError::BadRequest("Invalid activation code".to_string());

    let Some(user) = db::users::find_by_email(&state.pool, req.email.trim()).await? else {
        state.activation_limiter.record_failure(&req.email);
        return Err(invalid());
    };

    if user.is_active {
        return Ok(Json(MessageResponse::new("Account is active")));
    }

    if !db::users::activate(&state.pool, user.id, req.code).await? {
        state.activation_limiter.record_failure(&req.email);
        return Err(invalid());
    }

    state.activation_limiter.reset(&req.email);
    tracing::info!(user_id = %user.id, "Account activated");
    Ok(Json(MessageResponse::new("Account is active")))
}

#[utoipa::path(
    post,
    path = "/resend-code",
    tag = "auth",
    request_body = ResendCodeRequest,
    responses(
        (status = 200, description = "Sent if the account exists and is inactive", body = MessageResponse)
    )
)]
pub async fn resend_code(
    State(state): State<SharedState>,
    Json(req): Json<ResendCodeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    req.validate()?;

    // Same answer whether or not the account exists
    let response = Json(MessageResponse::new("New code sent"));

    let Some(user) = db::users::find_by_email(&state.pool, req.email.trim()).await? else {
        return Ok(response);
    };
    if user.is_active {
        return Ok(response);
    }

    let code = password::activation_code();
    db::users::update_active_code(&state.pool, user.id, code).await?;
    send_code_in_background(&state, user, code, true);

    Ok(response)
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "auth",
    responses((status = 200, description = "Available user roles", body = [UserRole]))
)]
pub async fn list_roles(State(state): State<SharedState>) -> Result<Json<Vec<UserRole>>, AppError> {
    Ok(Json(db::user_roles::list(&state.pool).await?))
}
