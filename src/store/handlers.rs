use super::models::{NewStore, NewStoreRow, Store, StoreWithRating, UpdateStore};
use crate::auth::models::{AccessTokenClaims, Role};
use crate::utils::error::ApiError;
use crate::utils::extract::ValidatedJson;
use crate::utils::types::Pool;
use axum::extract::{Json, Path, State};
use diesel::{dsl::sql, prelude::*, sql_types};
use diesel_async::RunQueryDsl;

pub async fn create_store(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    ValidatedJson(payload): ValidatedJson<NewStore>,
) -> Result<Json<Store>, ApiError> {
    use crate::schema::stores;

    if claims.role != Role::Farmer {
        return Err(ApiError::Forbidden("only farmers can open a store"));
    }

    let owner_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let store_data = NewStoreRow {
        owner_id,
        name: payload.name,
        description: payload.description,
        image: payload.image,
    };

    let res = diesel::insert_into(stores::table)
        .values(&store_data)
        .returning(Store::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ApiError::Conflict("farmer already owns a store".to_owned()),
            other => other.into(),
        })?;

    tracing::info!(store = res.id, owner = %owner_id, "store created");

    Ok(Json(res))
}

pub async fn get_stores(
    State(pool): State<Pool>,
) -> Result<Json<Vec<StoreWithRating>>, ApiError> {
    use crate::schema::{reviews, stores};

    let mut conn = pool.get().await?;

    let rows = stores::table
        .left_join(reviews::table)
        .group_by(stores::id)
        .select((
            Store::as_select(),
            sql::<sql_types::Nullable<sql_types::Double>>("AVG(reviews.rating)::float8"),
        ))
        .load::<(Store, Option<f64>)>(&mut conn)
        .await?;

    let res = rows
        .into_iter()
        .map(|(store, rating)| StoreWithRating { store, rating })
        .collect();

    Ok(Json(res))
}

pub async fn get_store_by_id(
    State(pool): State<Pool>,
    Path(id): Path<i32>,
) -> Result<Json<StoreWithRating>, ApiError> {
    use crate::schema::{reviews, stores};

    let mut conn = pool.get().await?;

    let row = stores::table
        .left_join(reviews::table)
        .filter(stores::id.eq(id))
        .group_by(stores::id)
        .select((
            Store::as_select(),
            sql::<sql_types::Nullable<sql_types::Double>>("AVG(reviews.rating)::float8"),
        ))
        .get_result::<(Store, Option<f64>)>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("store {}", id)))?;

    Ok(Json(StoreWithRating {
        store: row.0,
        rating: row.1,
    }))
}

pub async fn update_store(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<UpdateStore>,
) -> Result<Json<Store>, ApiError> {
    use crate::schema::stores;

    if payload.name.is_none() && payload.description.is_none() && payload.image.is_none() {
        return Err(ApiError::Validation("nothing to update".to_owned()));
    }

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let store = stores::table
        .find(id)
        .select(Store::as_select())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("store {}", id)))?;

    if store.owner_id != user_id && claims.role != Role::Admin {
        return Err(ApiError::Forbidden("only the owner can edit this store"));
    }

    let res = diesel::update(stores::table.find(id))
        .set(&payload)
        .returning(Store::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Json(res))
}

pub async fn delete_store(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(id): Path<i32>,
) -> Result<Json<Store>, ApiError> {
    use crate::schema::stores;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let store = stores::table
        .find(id)
        .select(Store::as_select())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("store {}", id)))?;

    if store.owner_id != user_id && claims.role != Role::Admin {
        return Err(ApiError::Forbidden("only the owner can delete this store"));
    }

    // products cascade with the store
    let res = diesel::delete(stores::table.find(id))
        .returning(Store::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Json(res))
}
