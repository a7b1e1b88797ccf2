/// Authentication endpoints
///
/// This module provides account authentication and the two OTP flows:
/// - Registration and login
/// - Logout (clears the session cookie)
/// - Email verification (authenticated)
/// - Password reset (public)
///
/// # Endpoints
///
/// - `POST /api/v1/auth/users/register` - Register new user
/// - `POST /api/v1/auth/users/login` - Login, sets the `AccessToken` cookie
/// - `POST /api/v1/auth/users/logout` - Clear the session cookie
/// - `POST /api/v1/auth/users/send-otp-verify` - Email a verification code
/// - `POST /api/v1/auth/users/verify-otp` - Confirm the verification code
/// - `POST /api/v1/auth/users/send-reset-password` - Email a reset code
/// - `POST /api/v1/auth/users/reset-password` - Set a new password
///
/// OTPs are stored as argon2 hashes and consumed with a conditional write,
/// so a code that was already used fails even if two requests race.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use todolist_shared::{
    auth::{
        jwt::{self, Claims},
        middleware::{AuthContext, ACCESS_TOKEN_COOKIE},
        otp::{self, OtpError},
        password,
    },
    cache::keys,
    logging::redact,
    mail::EmailJob,
    models::{CreateUser, OtpPurpose, PublicUser, User, UserRole},
};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::ApiJson,
};

/// Register request
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 30, message = "First name must be between 2 and 30 characters"))]
    pub first_name: String,

    #[validate(length(min = 2, max = 30, message = "Last name must be between 2 and 30 characters"))]
    pub last_name: String,

    #[validate(email(message = "Email must be a valid email"))]
    pub email: String,

    #[validate(custom(function = "check_password"))]
    pub password: String,

    #[serde(rename = "confirm_password")]
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,

    /// Defaults to `user`
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Register response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
}

/// Login request
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email must be a valid email"))]
    pub email: String,

    #[validate(custom(function = "check_password"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,

    /// Same token as the `AccessToken` cookie
    pub access_token: String,

    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub otp: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResetOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub otp: Option<String>,

    #[serde(default)]
    pub new_password: Option<String>,
}

/// `{success, message}` body shared by the simple endpoints
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub success: bool,
    pub message: String,
}

impl StatusMessage {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub is_account_verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailResponse {
    pub success: bool,
    pub message: String,
    pub user_data: VerifiedUser,
}

fn check_password(password: &str) -> Result<(), ValidationError> {
    password::validate_password_strength(password).map_err(|message| {
        let mut error = ValidationError::new("password_strength");
        error.message = Some(message.into());
        error
    })
}

/// Validates `req`, logging the redacted payload on failure
fn validate_body<T: Validate + Serialize>(req: &T, action: &str) -> ApiResult<()> {
    req.validate().map_err(|e| {
        let body = serde_json::to_value(req).unwrap_or_default();
        tracing::warn!(action, body = %redact(&body), "Request validation failed");
        ApiError::from(e)
    })
}

/// `Set-Cookie` value carrying the session token
fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{ACCESS_TOKEN_COOKIE}={token}; Max-Age={max_age_secs}; Path=/; HttpOnly; Secure; SameSite=None"
    )
}

/// Missing or blank body field
fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/auth/users/register
/// Content-Type: application/json
///
/// {
///   "firstName": "Ada",
///   "lastName": "Lovelace",
///   "email": "ada@example.com",
///   "password": "SecureP@ss123",
///   "confirm_password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, or the email is taken
/// - `500 Internal Server Error`: Server error
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    validate_body(&req, "register")?;

    if state.store.find_user_by_email(&req.email).await?.is_some() {
        tracing::warn!(email = %req.email, "Registration for existing email");
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = state
        .store
        .create_user(CreateUser {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            password_hash,
            role: req.role.unwrap_or_default(),
        })
        .await?;

    state
        .enqueue_email(EmailJob::welcome(&user.email, &user.first_name))
        .await;
    state.cache.invalidate(keys::ALL_USERS).await;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User created successfully".to_string(),
            user: PublicUser::from(&user),
        }),
    ))
}

/// Login endpoint
///
/// Unknown email and wrong password give the same 401 so accounts cannot
/// be probed.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_body(&req, "login")?;

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let Some(user) = state.store.find_user_by_email(&req.email).await? else {
        tracing::warn!(email = %req.email, "Login for unknown email");
        return Err(invalid());
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "Login with wrong password");
        return Err(invalid());
    }

    let expires_in = state.config.jwt.expires_in_secs;
    let claims = Claims::with_expiration(
        user.id,
        &user.email,
        user.role,
        chrono::Duration::seconds(expires_in),
    );
    let access_token = jwt::create_token(&claims, state.jwt_secret())?;

    state.active_users.touch(user.id);
    tracing::info!(user_id = %user.id, "User logged in");

    let cookie = session_cookie(&access_token, expires_in);
    let body = LoginResponse {
        success: true,
        message: "User logged in successfully".to_string(),
        access_token,
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        role: user.role,
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// Logout endpoint
///
/// Tokens are stateless; logging out only expires the cookie.
pub async fn logout(auth: Option<AuthContext>) -> impl IntoResponse {
    match auth {
        Some(auth) => tracing::info!(user_id = %auth.user_id, "User logged out"),
        None => tracing::info!("Anonymous logout"),
    }

    (
        [(header::SET_COOKIE, session_cookie("", 0))],
        StatusMessage::ok("User logged out successfully"),
    )
}

/// Emails the caller a fresh verification code (valid 24 hours)
///
/// # Errors
///
/// - `400 Bad Request`: Account already verified
/// - `404 Not Found`: The account no longer exists
pub async fn send_verify_otp(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<StatusMessage>> {
    let user = load_user(&state, auth.user_id, "User not found").await?;

    if user.is_account_verified {
        return Err(ApiError::BadRequest("Account is already verified.".to_string()));
    }

    issue_otp(&state, &user, OtpPurpose::Verify).await?;

    Ok(StatusMessage::ok("Verification email sent successfully."))
}

/// Marks the caller's account verified
///
/// # Errors
///
/// - `400 Bad Request`: OTP missing, already verified, no stored code,
///   expired or wrong code
/// - `404 Not Found`: The account no longer exists
pub async fn verify_email(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> ApiResult<Json<VerifyEmailResponse>> {
    let Some(candidate) = required(req.otp.as_deref()) else {
        return Err(ApiError::BadRequest("OTP is required.".to_string()));
    };

    let user = load_user(&state, auth.user_id, "User not found").await?;

    if user.is_account_verified {
        return Err(ApiError::BadRequest("Account already verified.".to_string()));
    }

    let stored = consume_check(&state, &user, OtpPurpose::Verify, candidate).await?;

    if !state.store.mark_verified(user.id, &stored).await? {
        tracing::warn!(user_id = %user.id, "Verification code already consumed");
        return Err(OtpError::Invalid.into());
    }

    state.cache.invalidate_user(user.id).await;
    tracing::info!(user_id = %user.id, "Account verified");

    Ok(Json(VerifyEmailResponse {
        success: true,
        message: "Email verified successfully.".to_string(),
        user_data: VerifiedUser {
            id: user.id,
            email: user.email,
            role: user.role,
            is_account_verified: true,
        },
    }))
}

/// Emails a password reset code (valid 15 minutes)
///
/// # Errors
///
/// - `400 Bad Request`: Email missing
/// - `404 Not Found`: No account with that email
pub async fn send_reset_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetOtpRequest>,
) -> ApiResult<Json<StatusMessage>> {
    let Some(email) = required(req.email.as_deref()) else {
        return Err(ApiError::BadRequest("Email is required.".to_string()));
    };

    let user = state
        .store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

    issue_otp(&state, &user, OtpPurpose::Reset).await?;

    Ok(StatusMessage::ok(
        "A password reset OTP has been sent to your email.",
    ))
}

/// Sets a new password after checking the reset code
///
/// # Errors
///
/// - `400 Bad Request`: Field missing, bad code, or weak password
/// - `404 Not Found`: No account with that email
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<StatusMessage>> {
    let (Some(email), Some(candidate), Some(new_password)) = (
        required(req.email.as_deref()),
        required(req.otp.as_deref()),
        req.new_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "Email, OTP, and new password are required.".to_string(),
        ));
    };

    let user = state
        .store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))?;

    let stored = consume_check(&state, &user, OtpPurpose::Reset, candidate).await?;

    password::validate_password_strength(new_password).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail::new("newPassword", message)])
    })?;

    let password_hash = password::hash_password(new_password)?;

    if !state
        .store
        .reset_password(user.id, &stored, &password_hash)
        .await?
    {
        tracing::warn!(user_id = %user.id, "Reset code already consumed");
        return Err(OtpError::Invalid.into());
    }

    tracing::info!(user_id = %user.id, "Password reset");

    Ok(StatusMessage::ok("Password reset successfully."))
}

async fn load_user(state: &AppState, id: Uuid, missing: &str) -> ApiResult<User> {
    state.store.find_user(id).await?.ok_or_else(|| {
        tracing::warn!(user_id = %id, "User vanished");
        ApiError::NotFound(missing.to_string())
    })
}

/// Generates, stores and emails a code for `purpose`
async fn issue_otp(state: &AppState, user: &User, purpose: OtpPurpose) -> ApiResult<()> {
    let code = otp::generate_otp();
    let hash = otp::hash_otp(&code)?;
    let expires_at = otp::expires_at(purpose, Utc::now());

    if !state.store.store_otp(user.id, purpose, &hash, expires_at).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let job = match purpose {
        OtpPurpose::Verify => EmailJob::verify_otp(&user.email, user.full_name(), &code),
        OtpPurpose::Reset => EmailJob::reset_otp(&user.email, user.full_name(), &code),
    };
    state.enqueue_email(job).await;

    tracing::info!(user_id = %user.id, ?purpose, %expires_at, "OTP issued");
    Ok(())
}

/// Checks `candidate` and returns the stored hash it matched
///
/// An expired code is cleared before the error is returned.
async fn consume_check(
    state: &AppState,
    user: &User,
    purpose: OtpPurpose,
    candidate: &str,
) -> ApiResult<String> {
    let stored = user.otp(purpose);

    match otp::check_otp(candidate, stored.as_ref(), Utc::now()) {
        Ok(()) => Ok(stored.map(|s| s.hash).unwrap_or_default()),
        Err(OtpError::Expired) => {
            tracing::warn!(user_id = %user.id, ?purpose, "Expired OTP submitted");
            state.store.clear_otp(user.id, purpose).await?;
            Err(OtpError::Expired.into())
        }
        Err(e) => {
            tracing::warn!(user_id = %user.id, ?purpose, error = %e, "OTP rejected");
            Err(e.into())
        }
    }
}
