use super::models::{
    Category, NewProduct, NewProductRow, Product, ProductFilters, UpdateProduct, UpdateProductRow,
};
use crate::auth::models::{AccessTokenClaims, Role};
use crate::utils::error::ApiError;
use crate::utils::extract::ValidatedJson;
use crate::utils::types::Pool;
use axum::extract::{Json, Path, Query, State};
use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

pub async fn get_products(
    State(pool): State<Pool>,
    Query(filters): Query<ProductFilters>,
) -> Result<Json<Vec<Product>>, ApiError> {
    use crate::schema::products;

    let mut query = products::table.into_boxed();

    if let Some(raw) = &filters.category {
        let category = Category::parse(raw)
            .ok_or_else(|| ApiError::Validation(format!("unknown category: {}", raw)))?;
        query = query.filter(products::category.eq(category.as_str()));
    }

    if let Some(store_id) = filters.store_id {
        query = query.filter(products::store_id.eq(store_id));
    }

    let offset = filters.offset.unwrap_or(0).max(0);
    let limit = filters
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut conn = pool.get().await?;

    let res = query
        .order(products::id.asc())
        .offset(offset)
        .limit(limit)
        .select(Product::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(res))
}

pub async fn get_product_by_id(
    State(pool): State<Pool>,
    Path(id): Path<i32>,
) -> Result<Json<Product>, ApiError> {
    use crate::schema::products;

    let mut conn = pool.get().await?;

    let res = products::table
        .find(id)
        .select(Product::as_select())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("product {}", id)))?;

    Ok(Json(res))
}

pub async fn create_product(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    ValidatedJson(payload): ValidatedJson<NewProduct>,
) -> Result<Json<Product>, ApiError> {
    use crate::schema::{products, stores};

    if claims.role != Role::Farmer {
        return Err(ApiError::Forbidden("only farmers can list products"));
    }

    if payload.price < BigDecimal::from(0) {
        return Err(ApiError::Validation("price must be non-negative".to_owned()));
    }

    let owner_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    // products always land in the caller's own store
    let store_id = stores::table
        .filter(stores::owner_id.eq(owner_id))
        .select(stores::id)
        .get_result::<i32>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| {
            ApiError::Validation("create a store before listing products".to_owned())
        })?;

    let product_data = NewProductRow {
        store_id,
        title: payload.title,
        description: payload.description,
        price: payload.price,
        quantity: payload.quantity,
        category: payload.category.as_str().to_owned(),
        image: payload.image,
    };

    let res = diesel::insert_into(products::table)
        .values(&product_data)
        .returning(Product::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Json(res))
}

pub async fn update_product(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<UpdateProduct>,
) -> Result<Json<Product>, ApiError> {
    use crate::schema::products;

    if let Some(price) = &payload.price {
        if *price < BigDecimal::from(0) {
            return Err(ApiError::Validation("price must be non-negative".to_owned()));
        }
    }

    let changes = UpdateProductRow {
        title: payload.title,
        description: payload.description,
        price: payload.price,
        category: payload.category.map(|c| c.as_str().to_owned()),
        image: payload.image,
    };

    if changes.title.is_none()
        && changes.description.is_none()
        && changes.price.is_none()
        && changes.category.is_none()
        && changes.image.is_none()
    {
        return Err(ApiError::Validation("nothing to update".to_owned()));
    }

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let owner_id = owner_of_product(id, &mut conn).await?;
    if owner_id != user_id {
        return Err(ApiError::Forbidden("only the owner can edit this product"));
    }

    let res = diesel::update(products::table.find(id))
        .set(&changes)
        .returning(Product::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Json(res))
}

pub async fn remove_product(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(id): Path<i32>,
) -> Result<Json<Product>, ApiError> {
    use crate::schema::products;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let owner_id = owner_of_product(id, &mut conn).await?;
    if owner_id != user_id && claims.role != Role::Admin {
        return Err(ApiError::Forbidden("only the owner can delete this product"));
    }

    let res = diesel::delete(products::table.find(id))
        .returning(Product::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(Json(res))
}

async fn owner_of_product(
    product_id: i32,
    conn: &mut diesel_async::pooled_connection::bb8::PooledConnection<
        '_,
        diesel_async::AsyncPgConnection,
    >,
) -> Result<Uuid, ApiError> {
    use crate::schema::{products, stores};

    products::table
        .inner_join(stores::table)
        .filter(products::id.eq(product_id))
        .select(stores::owner_id)
        .get_result::<Uuid>(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("product {}", product_id)))
}
