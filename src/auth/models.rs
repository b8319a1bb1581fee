use crate::schema::users;
use crate::utils::error::ApiError;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Farmer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Farmer => "FARMER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "CUSTOMER" => Some(Role::Customer),
            "FARMER" => Some(Role::Farmer),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Queryable, Selectable, Debug, PartialEq)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub hashed_rt: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Projection safe to hand back to clients: no credential material.
#[derive(Queryable, Selectable, Debug, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SafeUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
pub struct UpdateUserRow {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 72))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Deserialize, Validate)]
pub struct LoginUser {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct UpdateMe {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub phone: Option<String>,
    pub current_password: Option<String>,
    #[validate(length(min = 8, max = 72))]
    pub new_password: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshPayload {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

pub const ACCESS_TTL_SECS: i64 = 60 * 15;
pub const REFRESH_TTL_SECS: i64 = 60 * 60 * 24 * 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    pub exp: usize,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<Uuid, ApiError> {
        Uuid::parse_str(&self.sub).map_err(|_| ApiError::Unauthorized)
    }
}

pub fn jwt_secret() -> Result<Vec<u8>, ApiError> {
    env::var("JWT_SECRET")
        .map(String::into_bytes)
        .map_err(|_| ApiError::Internal("JWT_SECRET must be set".to_owned()))
}

pub fn issue_token(
    user_id: Uuid,
    role: Role,
    kind: TokenKind,
    ttl_secs: i64,
    secret: &[u8],
) -> Result<String, ApiError> {
    let exp = (chrono::Utc::now().timestamp() + ttl_secs) as usize;
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        role,
        kind,
        exp,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
}

pub fn decode_token(token: &str, secret: &[u8]) -> Result<AccessTokenClaims, ApiError> {
    decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

/// bcrypt truncates input at 72 bytes, so refresh tokens are bound to their
/// signature segment rather than the whole JWT.
pub fn token_signature(token: &str) -> &str {
    token.rsplit('.').next().unwrap_or(token)
}

impl<S> FromRequestParts<S> for AccessTokenClaims
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;

        let claims = decode_token(token, &jwt_secret()?)?;

        if claims.kind != TokenKind::Access {
            return Err(ApiError::Unauthorized);
        }

        Ok(claims)
    }
}
