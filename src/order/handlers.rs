use super::models::{
    NewOrder, NewOrderItemRow, NewOrderRow, Order, OrderFilters, OrderItem, OrderStatus,
    OrderWithItems, OrdersResponse, Pagination, Transition, UpdateOrderStatus,
    classify_transition, order_total, total_pages,
};
use crate::auth::models::{AccessTokenClaims, Role};
use crate::product::models::Product;
use crate::utils::error::ApiError;
use crate::utils::extract::ValidatedJson;
use crate::utils::merge_quantities;
use crate::utils::types::Pool;
use axum::extract::{Json, Path, Query, State};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use std::collections::HashMap;
use uuid::Uuid;

type PooledConn<'a> = diesel_async::pooled_connection::bb8::PooledConnection<'a, AsyncPgConnection>;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Turns a validated item list into a durable order: batch product lookup,
/// fail-fast stock check, price-snapshot items, guarded stock decrement.
/// All of it inside one transaction, so a failure leaves nothing behind.
pub async fn create_order(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    ValidatedJson(payload): ValidatedJson<NewOrder>,
) -> Result<Json<OrderWithItems>, ApiError> {
    use crate::schema::{order_items, orders, products};

    if claims.role != Role::Customer {
        return Err(ApiError::Forbidden("only customers can place orders"));
    }

    let user_id = claims.user_id()?;

    let lines = merge_quantities(
        payload
            .items
            .into_iter()
            .map(|item| (item.product_id, item.quantity)),
    );

    let mut conn = pool.get().await?;

    let res = conn
        .transaction::<OrderWithItems, ApiError, _>(|conn| {
            async move {
                let ids = lines.iter().map(|(id, _)| *id).collect::<Vec<_>>();

                let found = products::table
                    .filter(products::id.eq_any(&ids))
                    .select(Product::as_select())
                    .load(conn)
                    .await?;

                let by_id = found
                    .into_iter()
                    .map(|p| (p.id, p))
                    .collect::<HashMap<i32, Product>>();

                // validate everything before the first write
                for (product_id, quantity) in &lines {
                    let product = by_id
                        .get(product_id)
                        .ok_or_else(|| ApiError::NotFound(format!("product {}", product_id)))?;

                    if product.quantity < *quantity {
                        return Err(ApiError::InsufficientStock {
                            product: product.title.clone(),
                            requested: *quantity,
                            available: product.quantity,
                        });
                    }
                }

                let total_amount =
                    order_total(lines.iter().map(|(id, quantity)| (&by_id[id].price, *quantity)));

                let order_data = NewOrderRow {
                    user_id,
                    status: OrderStatus::Pending.as_str().to_owned(),
                    total_amount,
                };

                let order = diesel::insert_into(orders::table)
                    .values(&order_data)
                    .returning(Order::as_returning())
                    .get_result(conn)
                    .await?;

                let item_rows = lines
                    .iter()
                    .map(|(product_id, quantity)| NewOrderItemRow {
                        order_id: order.id,
                        product_id: *product_id,
                        quantity: *quantity,
                        // snapshot, deliberately not a live reference
                        price: by_id[product_id].price.clone(),
                    })
                    .collect::<Vec<_>>();

                let items = diesel::insert_into(order_items::table)
                    .values(&item_rows)
                    .returning(OrderItem::as_returning())
                    .get_results(conn)
                    .await?;

                // The check above can go stale under concurrent checkouts, so
                // the decrement re-asserts it; zero affected rows means a
                // racing order took the stock first.
                for (product_id, quantity) in &lines {
                    let updated = diesel::update(
                        products::table
                            .filter(products::id.eq(product_id))
                            .filter(products::quantity.ge(quantity)),
                    )
                    .set(products::quantity.eq(products::quantity - quantity))
                    .execute(conn)
                    .await?;

                    if updated == 0 {
                        return Err(ApiError::Conflict(format!(
                            "stock for {} changed during checkout, please retry",
                            by_id[product_id].title
                        )));
                    }
                }

                Ok(OrderWithItems { order, items })
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(order = res.order.id, customer = %user_id, "order placed");

    Ok(Json(res))
}

pub async fn list_orders(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Query(filters): Query<OrderFilters>,
) -> Result<Json<OrdersResponse>, ApiError> {
    use crate::schema::{order_items, orders, products, stores};

    let status = match &filters.status {
        Some(raw) => Some(
            OrderStatus::parse(raw)
                .ok_or_else(|| ApiError::Validation(format!("unknown status: {}", raw)))?,
        ),
        None => None,
    };

    let page = filters.page.unwrap_or(1).max(1);
    let limit = filters
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    // farmers only see orders touching their own store
    let farmer_order_ids = match claims.role {
        Role::Farmer => Some(
            order_items::table
                .inner_join(products::table.inner_join(stores::table))
                .filter(stores::owner_id.eq(user_id))
                .select(order_items::order_id)
                .distinct()
                .load::<i32>(&mut conn)
                .await?,
        ),
        _ => None,
    };

    let scoped = || {
        let mut query = orders::table.into_boxed();

        if let Some(status) = status {
            query = query.filter(orders::status.eq(status.as_str()));
        }

        match (claims.role, &farmer_order_ids) {
            (Role::Customer, _) => query = query.filter(orders::user_id.eq(user_id)),
            (Role::Farmer, Some(ids)) => query = query.filter(orders::id.eq_any(ids.clone())),
            _ => {}
        }

        query
    };

    let total = scoped().count().get_result::<i64>(&mut conn).await?;

    let orders = scoped()
        .order(orders::created_at.desc())
        .offset((page - 1) * limit)
        .limit(limit)
        .select(Order::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(OrdersResponse {
        orders,
        pagination: Pagination {
            page,
            limit,
            total,
            pages: total_pages(total, limit),
        },
    }))
}

pub async fn get_order(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(id): Path<i32>,
) -> Result<Json<OrderWithItems>, ApiError> {
    use crate::schema::order_items;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let order = find_order(id, &mut conn).await?;

    let visible = match claims.role {
        Role::Admin => true,
        Role::Customer => order.user_id == user_id,
        Role::Farmer => farmer_in_order(order.id, user_id, &mut conn).await?,
    };

    if !visible {
        return Err(ApiError::Forbidden("order is not visible to this account"));
    }

    let items = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .select(OrderItem::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(OrderWithItems { order, items }))
}

pub async fn update_order_status(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateOrderStatus>,
) -> Result<Json<Order>, ApiError> {
    let new_status = OrderStatus::parse(&payload.status)
        .ok_or_else(|| ApiError::Validation(format!("unknown status: {}", payload.status)))?;

    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let order = find_order(id, &mut conn).await?;

    let allowed = claims.role == Role::Admin
        || (claims.role == Role::Farmer && farmer_in_order(order.id, user_id, &mut conn).await?);
    if !allowed {
        return Err(ApiError::Forbidden(
            "only the selling farmer or an admin can update order status",
        ));
    }

    let res = apply_transition(order, new_status, &mut conn).await?;

    Ok(Json(res))
}

/// Convenience alias for the CANCELLED transition; additionally open to the
/// order's own customer.
pub async fn cancel_order(
    State(pool): State<Pool>,
    claims: AccessTokenClaims,
    Path(id): Path<i32>,
) -> Result<Json<Order>, ApiError> {
    let user_id = claims.user_id()?;
    let mut conn = pool.get().await?;

    let order = find_order(id, &mut conn).await?;

    let allowed = match claims.role {
        Role::Admin => true,
        Role::Customer => order.user_id == user_id,
        Role::Farmer => farmer_in_order(order.id, user_id, &mut conn).await?,
    };
    if !allowed {
        return Err(ApiError::Forbidden("order is not visible to this account"));
    }

    let res = apply_transition(order, OrderStatus::Cancelled, &mut conn).await?;

    Ok(Json(res))
}

async fn find_order(id: i32, conn: &mut PooledConn<'_>) -> Result<Order, ApiError> {
    use crate::schema::orders;

    orders::table
        .find(id)
        .select(Order::as_select())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("order {}", id)))
}

async fn farmer_in_order(
    order_id: i32,
    owner_id: Uuid,
    conn: &mut PooledConn<'_>,
) -> Result<bool, ApiError> {
    use crate::schema::{order_items, products, stores};

    let matching: i64 = order_items::table
        .inner_join(products::table.inner_join(stores::table))
        .filter(order_items::order_id.eq(order_id))
        .filter(stores::owner_id.eq(owner_id))
        .count()
        .get_result(conn)
        .await?;

    Ok(matching > 0)
}

async fn apply_transition(
    order: Order,
    to: OrderStatus,
    conn: &mut PooledConn<'_>,
) -> Result<Order, ApiError> {
    use crate::schema::{order_items, orders, products};

    let from = OrderStatus::parse(&order.status).ok_or_else(|| {
        ApiError::Internal(format!("unknown status stored on order {}", order.id))
    })?;

    match classify_transition(from, to) {
        Transition::Noop => Ok(order),
        Transition::Rejected => Err(ApiError::Validation(format!(
            "cannot move a cancelled order to {}",
            to.as_str()
        ))),
        Transition::Plain => {
            let updated = diesel::update(orders::table.find(order.id))
                .set(orders::status.eq(to.as_str()))
                .returning(Order::as_returning())
                .get_result(conn)
                .await?;

            Ok(updated)
        }
        Transition::CancelRestore => {
            let order_id = order.id;

            let res = conn
                .transaction::<Order, ApiError, _>(|conn| {
                    async move {
                        // The status read happened outside this transaction,
                        // so re-assert it on the write. Zero rows means a
                        // racing cancel already won and already restored the
                        // stock; restoring again would double-count it.
                        let updated = diesel::update(
                            orders::table
                                .find(order_id)
                                .filter(orders::status.ne(OrderStatus::Cancelled.as_str())),
                        )
                        .set(orders::status.eq(OrderStatus::Cancelled.as_str()))
                        .returning(Order::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                        let updated = match updated {
                            Some(order) => order,
                            None => return find_order(order_id, conn).await,
                        };

                        let items = order_items::table
                            .filter(order_items::order_id.eq(order_id))
                            .select(OrderItem::as_select())
                            .load(conn)
                            .await?;

                        // give back exactly what the order took
                        for item in &items {
                            diesel::update(products::table.find(item.product_id))
                                .set(products::quantity.eq(products::quantity + item.quantity))
                                .execute(conn)
                                .await?;
                        }

                        Ok(updated)
                    }
                    .scope_boxed()
                })
                .await?;

            tracing::info!(order = order_id, "order cancelled, stock restored");

            Ok(res)
        }
    }
}
