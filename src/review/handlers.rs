use super::models::{NewReview, NewReviewRow, Review};
use crate::auth::models::AccessTokenClaims;
use crate::store::models::Store;
use crate::utils::error::ApiError;
use crate::utils::extract::ValidatedJson;
use crate::utils::types::Pool;
use axum::extract::{Json, Path, State};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

pub async fn get_store_reviews(
    State(pool): State<Pool>,
    Path(store_id): Path<i32>,
) -> Result<Json<Vec<Review>>, ApiError> {
    use crate::schema::{reviews, stores};

    let mut conn = pool.get().await?;

    let exists = stores::table
        .find(store_id)
        .select(stores::id)
        .get_result::<i32>(&mut conn)
        .await
        .optional()?;
    if exists.is_none() {
        return Err(ApiError::NotFound(format!("store {}", store_id)));
    }

    let res = reviews::table
        .filter(reviews::store_id.eq(store_id))
        .order(reviews::created_at.desc())
        .select(Review::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(res))
}

pub async fn create_review(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(store_id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<NewReview>,
) -> Result<Json<Review>, ApiError> {
    use crate::schema::{reviews, stores};

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let store = stores::table
        .find(store_id)
        .select(Store::as_select())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("store {}", store_id)))?;

    if store.owner_id == user_id {
        return Err(ApiError::Forbidden(
            "store owners cannot review their own store",
        ));
    }

    let review_data = NewReviewRow {
        store_id,
        user_id,
        rating: payload.rating,
        comment: payload.comment,
    };

    let res = diesel::insert_into(reviews::table)
        .values(&review_data)
        .returning(Review::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ApiError::Conflict("store already reviewed by this user".to_owned()),
            other => other.into(),
        })?;

    Ok(Json(res))
}
