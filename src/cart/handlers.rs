use super::models::{Cart, CartItemsPayload, CartProductRow, CartWithProducts};
use crate::auth::models::{AccessTokenClaims, Role};
use crate::utils::error::ApiError;
use crate::utils::extract::ValidatedJson;
use crate::utils::merge_quantities;
use crate::utils::types::Pool;
use axum::extract::{Json, Path, State};
use diesel::{dsl::sql, prelude::*};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use uuid::Uuid;

type PooledConn<'a> = diesel_async::pooled_connection::bb8::PooledConnection<'a, AsyncPgConnection>;

pub async fn get_cart(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
) -> Result<Json<CartWithProducts>, ApiError> {
    require_customer(&claims)?;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let res = cart_view(user_id, &mut conn).await?;

    Ok(Json(res))
}

pub async fn add_products_to_cart(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    ValidatedJson(payload): ValidatedJson<CartItemsPayload>,
) -> Result<Json<Cart>, ApiError> {
    require_customer(&claims)?;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let res = upsert_items(user_id, payload, &mut conn).await?;

    Ok(Json(res))
}

/// Login-time merge of a client-local cart: additive per product, same
/// semantics as a regular add, but answers with the full merged view.
pub async fn merge_cart(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    ValidatedJson(payload): ValidatedJson<CartItemsPayload>,
) -> Result<Json<CartWithProducts>, ApiError> {
    require_customer(&claims)?;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    upsert_items(user_id, payload, &mut conn).await?;

    let res = cart_view(user_id, &mut conn).await?;

    Ok(Json(res))
}

pub async fn remove_product_from_cart(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(product_id): Path<i32>,
) -> Result<Json<Cart>, ApiError> {
    use crate::schema::cart_products;

    require_customer(&claims)?;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let res = conn
        .transaction::<Cart, ApiError, _>(|conn| {
            async move {
                let cart = find_cart(user_id, conn).await?;

                let deleted_count = diesel::delete(
                    cart_products::table
                        .filter(cart_products::cart_id.eq(cart.id))
                        .filter(cart_products::product_id.eq(product_id)),
                )
                .execute(conn)
                .await?;

                if deleted_count == 0 {
                    return Err(ApiError::NotFound(format!(
                        "cart item for product {}",
                        product_id
                    )));
                }

                touch_cart(cart.id, conn).await
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(res))
}

pub async fn clear_cart(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
) -> Result<Json<Cart>, ApiError> {
    use crate::schema::cart_products;

    require_customer(&claims)?;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let res = conn
        .transaction::<Cart, ApiError, _>(|conn| {
            async move {
                let cart = find_cart(user_id, conn).await?;

                diesel::delete(cart_products::table.filter(cart_products::cart_id.eq(cart.id)))
                    .execute(conn)
                    .await?;

                touch_cart(cart.id, conn).await
            }
            .scope_boxed()
        })
        .await?;

    Ok(Json(res))
}

fn require_customer(claims: &AccessTokenClaims) -> Result<(), ApiError> {
    if claims.role != Role::Customer {
        return Err(ApiError::Forbidden("cart is only available to customers"));
    }
    Ok(())
}

async fn find_cart(user_id: Uuid, conn: &mut AsyncPgConnection) -> Result<Cart, ApiError> {
    use crate::schema::carts;

    carts::table
        .filter(carts::user_id.eq(user_id))
        .select(Cart::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("cart".to_owned()))
}

async fn touch_cart(cart_id: i32, conn: &mut AsyncPgConnection) -> Result<Cart, ApiError> {
    use crate::schema::carts;

    let updated_at = chrono::Local::now().date_naive();

    let cart = diesel::update(carts::table.find(cart_id))
        .set(carts::updated_at.eq(updated_at))
        .returning(Cart::as_returning())
        .get_result(conn)
        .await?;

    Ok(cart)
}

async fn upsert_items(
    user_id: Uuid,
    payload: CartItemsPayload,
    conn: &mut PooledConn<'_>,
) -> Result<Cart, ApiError> {
    use crate::schema::cart_products;
    use diesel::upsert::excluded;

    let merged = merge_quantities(
        payload
            .items
            .into_iter()
            .map(|item| (item.product_id, item.quantity)),
    );

    conn.transaction::<Cart, ApiError, _>(|conn| {
        async move {
            let cart = find_cart(user_id, conn).await?;

            let rows = merged
                .into_iter()
                .map(|(product_id, quantity)| CartProductRow {
                    cart_id: cart.id,
                    product_id,
                    quantity,
                })
                .collect::<Vec<_>>();

            diesel::insert_into(cart_products::table)
                .values(&rows)
                .on_conflict((cart_products::cart_id, cart_products::product_id))
                .do_update()
                .set(
                    cart_products::quantity
                        .eq(cart_products::quantity + excluded(cart_products::quantity)),
                )
                .execute(conn)
                .await
                .map_err(|e| match e {
                    diesel::result::Error::DatabaseError(
                        diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                        _,
                    ) => ApiError::NotFound("product".to_owned()),
                    other => other.into(),
                })?;

            touch_cart(cart.id, conn).await
        }
        .scope_boxed()
    })
    .await
}

async fn cart_view(
    user_id: Uuid,
    conn: &mut PooledConn<'_>,
) -> Result<CartWithProducts, ApiError> {
    use crate::schema::{cart_products, carts, products};

    let (cart, products_json) = carts::table
        .left_join(cart_products::table.on(carts::id.eq(cart_products::cart_id)))
        .left_join(products::table.on(cart_products::product_id.eq(products::id)))
        .filter(carts::user_id.eq(user_id))
        .group_by(carts::id)
        .select((
            Cart::as_select(),
            sql::<diesel::sql_types::Json>(
                "COALESCE(
                json_agg(
                json_build_object(
                    'id', products.id,
                    'title', products.title,
                    'price', products.price,
                    'quantity', cart_products.quantity,
                    'image', products.image
                )
            ) FILTER (WHERE products.id IS NOT NULL),
            '[]'
        )",
            ),
        ))
        .get_result::<(Cart, serde_json::Value)>(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound("cart".to_owned()))?;

    let products = serde_json::from_value(products_json).unwrap_or_default();

    Ok(CartWithProducts { cart, products })
}
