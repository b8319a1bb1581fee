use super::models::{
    ACCESS_TTL_SECS, AccessTokenClaims, LoginUser, NewUserRow, REFRESH_TTL_SECS, RefreshPayload,
    RegisterUser, Role, SafeUser, TokenKind, TokenPair, UpdateMe, UpdateUserRow, User,
    decode_token, issue_token, jwt_secret, token_signature,
};
use crate::cart::models::NewCart;
use crate::utils::error::ApiError;
use crate::utils::extract::ValidatedJson;
use crate::utils::types::Pool;
use axum::extract::{Json, State};
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::Local;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use uuid::Uuid;

pub async fn create_user(
    State(pool): State<Pool>,
    ValidatedJson(payload): ValidatedJson<RegisterUser>,
) -> Result<Json<SafeUser>, ApiError> {
    use crate::schema::{carts, users};

    if payload.role == Role::Admin {
        return Err(ApiError::Validation(
            "role must be CUSTOMER or FARMER".to_owned(),
        ));
    }

    let hashed_pass = create_password_hash(payload.password).await?;

    let user_id = Uuid::new_v4();
    let role = payload.role;

    let user_data = NewUserRow {
        id: user_id,
        email: payload.email,
        password_hash: hashed_pass,
        name: payload.name,
        phone: payload.phone,
        role: role.as_str().to_owned(),
    };

    let mut conn = pool.get().await?;

    let res = conn
        .transaction::<SafeUser, ApiError, _>(|conn| {
            async move {
                let user = diesel::insert_into(users::table)
                    .values(&user_data)
                    .returning(SafeUser::as_returning())
                    .get_result(conn)
                    .await
                    .map_err(|e| match e {
                        diesel::result::Error::DatabaseError(
                            diesel::result::DatabaseErrorKind::UniqueViolation,
                            _,
                        ) => ApiError::Conflict("email is already registered".to_owned()),
                        other => other.into(),
                    })?;

                // customers get their server-backed cart right away
                if role == Role::Customer {
                    let cart_data = NewCart {
                        user_id,
                        updated_at: Local::now().date_naive(),
                    };

                    diesel::insert_into(carts::table)
                        .values(&cart_data)
                        .execute(conn)
                        .await?;
                }

                Ok(user)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(user = %user_id, role = role.as_str(), "registered user");

    Ok(Json(res))
}

pub async fn login_user(
    State(pool): State<Pool>,
    ValidatedJson(payload): ValidatedJson<LoginUser>,
) -> Result<Json<TokenPair>, ApiError> {
    use crate::schema::users;

    let mut conn = pool.get().await?;

    let user = users::table
        .filter(users::email.eq(&payload.email))
        .select(User::as_select())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or(ApiError::Unauthorized)?;

    match verify(&payload.password, user.password_hash.as_str()) {
        Ok(true) => {}
        _ => return Err(ApiError::Unauthorized),
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| ApiError::Internal(format!("unknown role stored for user {}", user.id)))?;

    let pair = issue_token_pair(user.id, role, &mut conn).await?;

    Ok(Json(pair))
}

pub async fn refresh_token(
    State(pool): State<Pool>,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<TokenPair>, ApiError> {
    use crate::schema::users;

    let claims = decode_token(&payload.refresh_token, &jwt_secret()?)?;
    if claims.kind != TokenKind::Refresh {
        return Err(ApiError::Unauthorized);
    }
    let user_id = claims.user_id()?;

    let mut conn = pool.get().await?;

    let user = users::table
        .find(user_id)
        .select(User::as_select())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or(ApiError::Unauthorized)?;

    let stored = user.hashed_rt.as_deref().ok_or(ApiError::Unauthorized)?;
    match verify(token_signature(&payload.refresh_token), stored) {
        Ok(true) => {}
        _ => return Err(ApiError::Unauthorized),
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| ApiError::Internal(format!("unknown role stored for user {}", user.id)))?;

    let pair = issue_token_pair(user.id, role, &mut conn).await?;

    Ok(Json(pair))
}

pub async fn logout(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
) -> Result<Json<serde_json::Value>, ApiError> {
    use crate::schema::users;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    diesel::update(users::table.find(user_id))
        .set(users::hashed_rt.eq(None::<String>))
        .execute(&mut conn)
        .await?;

    Ok(Json(serde_json::json!({ "message": "logged out" })))
}

pub async fn get_current_user(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
) -> Result<Json<SafeUser>, ApiError> {
    use crate::schema::users;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let res = users::table
        .find(user_id)
        .select(SafeUser::as_select())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", user_id)))?;

    Ok(Json(res))
}

pub async fn update_me(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    ValidatedJson(payload): ValidatedJson<UpdateMe>,
) -> Result<Json<SafeUser>, ApiError> {
    use crate::schema::users;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let password_hash = match payload.new_password {
        Some(new_password) => {
            let current = payload.current_password.ok_or_else(|| {
                ApiError::Validation("current_password is required to change password".to_owned())
            })?;

            let user = users::table
                .find(user_id)
                .select(User::as_select())
                .get_result(&mut conn)
                .await?;

            match verify(&current, user.password_hash.as_str()) {
                Ok(true) => {}
                _ => return Err(ApiError::Unauthorized),
            }

            Some(create_password_hash(new_password).await?)
        }
        None => None,
    };

    // role and email are immutable after registration
    let changes = UpdateUserRow {
        name: payload.name,
        phone: payload.phone,
        password_hash,
    };

    if changes.name.is_none() && changes.phone.is_none() && changes.password_hash.is_none() {
        return Err(ApiError::Validation("nothing to update".to_owned()));
    }

    let res = diesel::update(users::table.find(user_id))
        .set(&changes)
        .returning(SafeUser::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Json(res))
}

async fn issue_token_pair(
    user_id: Uuid,
    role: Role,
    conn: &mut diesel_async::pooled_connection::bb8::PooledConnection<
        '_,
        diesel_async::AsyncPgConnection,
    >,
) -> Result<TokenPair, ApiError> {
    use crate::schema::users;

    let secret = jwt_secret()?;

    let pair = TokenPair {
        access_token: issue_token(user_id, role, TokenKind::Access, ACCESS_TTL_SECS, &secret)?,
        refresh_token: issue_token(user_id, role, TokenKind::Refresh, REFRESH_TTL_SECS, &secret)?,
    };

    let rt_hash = create_password_hash(token_signature(&pair.refresh_token).to_owned()).await?;

    diesel::update(users::table.find(user_id))
        .set(users::hashed_rt.eq(Some(rt_hash)))
        .execute(conn)
        .await?;

    Ok(pair)
}

async fn create_password_hash(password: String) -> Result<String, ApiError> {
    let hashed_password = tokio::task::spawn_blocking(move || hash(password, DEFAULT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("hashing error: {}", e)))?;

    Ok(hashed_password)
}
