use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Header, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use parley_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use parley_types::models::User;

use crate::config::AuthConfig;
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

const MAX_FULL_NAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 6;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    validate_registration(&req)?;

    let (user_id, token) = run_blocking(&state, move |s| {
        let email = req.email.trim().to_string();
        if s.db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Duplicate(format!(
                "Email {} is already registered",
                email
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            full_name: req.full_name.trim().to_string(),
            email,
            password_hash: hash_password(&req.password)?,
        };
        s.db.create_user(&user)
            .map_err(|e| duplicate_email_or_internal(e, &user.email))?;

        let token = create_token(&s.auth, &user, Utc::now())?;
        info!("Registered user {} <{}>", user.id, user.email);
        Ok((user.id, token))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let response = run_blocking(&state, move |s| {
        let invalid = || ApiError::Unauthorized("Invalid email or password".into());

        let Some(user) = s.db.get_user_by_email(req.email.trim())? else {
            warn!("Login attempt for unknown email");
            return Err(invalid());
        };
        if !verify_password(&req.password, &user.password_hash)? {
            warn!("Failed login for user {}", user.id);
            return Err(invalid());
        }

        let token = create_token(&s.auth, &user, Utc::now())?;
        Ok(LoginResponse {
            user_id: user.id,
            email: user.email,
            token,
        })
    })
    .await?;

    Ok(Json(response))
}

fn duplicate_email_or_internal(err: anyhow::Error, email: &str) -> ApiError {
    if parley_db::is_unique_violation(&err) {
        ApiError::Duplicate(format!("Email {} is already registered", email))
    } else {
        ApiError::Internal(err)
    }
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let full_name = req.full_name.trim();
    if full_name.is_empty() || full_name.chars().count() > MAX_FULL_NAME_LEN {
        return Err(ApiError::validation(format!(
            "Full name is required and must be at most {} characters",
            MAX_FULL_NAME_LEN
        )));
    }
    if !looks_like_email(req.email.trim()) {
        return Err(ApiError::validation("A valid email address is required"));
    }
    validate_password(&req.password)
}

/// `local@domain.tld`, no whitespace.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// At least six characters with a digit, a lowercase and an uppercase
/// letter, and a symbol.
fn validate_password(password: &str) -> Result<(), ApiError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lower = password.chars().any(char::is_lowercase);
    let has_upper = password.chars().any(char::is_uppercase);
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric());

    if long_enough && has_digit && has_lower && has_upper && has_symbol {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "Password must be at least {} characters and contain a digit, \
             a lowercase letter, an uppercase letter and a symbol",
            MIN_PASSWORD_LEN
        )))
    }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(config: &AuthConfig, user: &User, now: DateTime<Utc>) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        jti: Uuid::new_v4(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        iat: now.timestamp() as usize,
        exp: (now + config.token_ttl).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &config.encoding_key())?;
    Ok(token)
}

pub fn decode_token(config: &AuthConfig, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(token, &config.decoding_key(), &config.validation())?;
    Ok(data.claims)
}
