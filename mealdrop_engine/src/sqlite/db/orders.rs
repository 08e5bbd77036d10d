use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatus, PaymentReference, ShopId, UserId},
    traits::StorageError,
};

/// Inserts the order row and its line items. Not atomic on its own; the caller wraps it in a
/// transaction.
pub(crate) async fn insert_order(
    order: NewOrder,
    status: OrderStatus,
    intent_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Order, StorageError> {
    let mut stored: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                total,
                currency,
                status,
                payment_method,
                intent_id,
                line1,
                line2,
                city,
                postcode,
                latitude,
                longitude,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
        "#,
    )
    .bind(&order.order_id)
    .bind(order.customer_id)
    .bind(order.total)
    .bind(&order.currency)
    .bind(status)
    .bind(order.payment_method)
    .bind(intent_id)
    .bind(&order.delivery_address.line1)
    .bind(&order.delivery_address.line2)
    .bind(&order.delivery_address.city)
    .bind(&order.delivery_address.postcode)
    .bind(order.delivery_address.latitude)
    .bind(order.delivery_address.longitude)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in &order.line_items {
        sqlx::query("INSERT INTO order_items (order_id, menu_item_id, quantity, unit_price) VALUES ($1, $2, $3, $4)")
            .bind(&order.order_id)
            .bind(item.menu_item_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *conn)
            .await?;
    }
    stored.line_items = order.line_items;
    debug!("📝️ Order {} inserted with id {}", stored.order_id, stored.id);
    Ok(stored)
}

pub(crate) async fn fetch_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    match order {
        Some(order) => Ok(Some(attach_line_items(order, conn).await?)),
        None => Ok(None),
    }
}

pub(crate) async fn fetch_orders_for_customer(
    customer: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, StorageError> {
    let orders: Vec<Order> = sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at ASC")
        .bind(customer)
        .fetch_all(&mut *conn)
        .await?;
    attach_all(orders, conn).await
}

pub(crate) async fn fetch_orders_for_shop(
    shop: ShopId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, StorageError> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        SELECT DISTINCT o.* FROM orders o
        JOIN order_items oi ON oi.order_id = o.order_id
        JOIN menu_items mi ON mi.id = oi.menu_item_id
        WHERE mi.shop_id = $1
        ORDER BY o.created_at ASC
        "#,
    )
    .bind(shop)
    .fetch_all(&mut *conn)
    .await?;
    attach_all(orders, conn).await
}

pub(crate) async fn fetch_orders_for_courier(
    courier: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, StorageError> {
    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE assigned_courier_id = $1 ORDER BY created_at ASC")
            .bind(courier)
            .fetch_all(&mut *conn)
            .await?;
    attach_all(orders, conn).await
}

/// `pending -> paid`. The guard on the current status makes a replayed or racing confirmation a
/// no-op that surfaces as a stale transition.
pub(crate) async fn mark_paid(
    order_id: &OrderId,
    reference: &PaymentReference,
    conn: &mut SqliteConnection,
) -> Result<Order, StorageError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = 'paid',
            payment_id = $2,
            payment_signature = $3,
            paid_at = $4,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status = 'pending' AND intent_id = $5
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(&reference.payment_id)
    .bind(&reference.signature)
    .bind(Utc::now())
    .bind(&reference.intent_id)
    .fetch_optional(&mut *conn)
    .await?;
    finish_conditional(order_id, updated, conn).await
}

pub(crate) async fn update_status(
    order_id: &OrderId,
    expected: OrderStatus,
    new_status: OrderStatus,
    eta: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Order, StorageError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = $3,
            estimated_delivery_time = COALESCE($4, estimated_delivery_time),
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(expected)
    .bind(new_status)
    .bind(eta)
    .fetch_optional(&mut *conn)
    .await?;
    finish_conditional(order_id, updated, conn).await
}

/// Sets (or replaces) the courier and auto-advances `paid` to `confirmed` in the same statement.
pub(crate) async fn assign_courier(
    order_id: &OrderId,
    courier: UserId,
    conn: &mut SqliteConnection,
) -> Result<Order, StorageError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            assigned_courier_id = $2,
            status = CASE WHEN status = 'paid' THEN 'confirmed' ELSE status END,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status NOT IN ('delivered', 'cancelled')
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(courier)
    .fetch_optional(&mut *conn)
    .await?;
    finish_conditional(order_id, updated, conn).await
}

/// Stores the OTP/expiry pair. Guarded on the status still permitting OTP issue, so a
/// concurrently cancelled or delivered order cannot pick up a fresh code.
pub(crate) async fn set_delivery_otp(
    order_id: &OrderId,
    otp: &str,
    expiry: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, StorageError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            delivery_otp = $2,
            otp_expiry = $3,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status IN ('confirmed', 'preparing', 'out_for_delivery')
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(otp)
    .bind(expiry)
    .fetch_optional(&mut *conn)
    .await?;
    finish_conditional(order_id, updated, conn).await
}

/// Consumes the OTP: both OTP fields are cleared atomically with the move to `delivered`. The
/// guard on the stored OTP value is what makes a double-verify race single-winner.
pub(crate) async fn complete_delivery(
    order_id: &OrderId,
    otp: &str,
    delivered_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, StorageError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = 'delivered',
            delivered_at = $3,
            delivery_otp = NULL,
            otp_expiry = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND delivery_otp = $2 AND status NOT IN ('delivered', 'cancelled')
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(otp)
    .bind(delivered_at)
    .fetch_optional(&mut *conn)
    .await?;
    finish_conditional(order_id, updated, conn).await
}

/// Does any line item of the order come from a shop owned by `owner`?
pub(crate) async fn owner_supplies_order(
    owner: UserId,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<bool, StorageError> {
    let supplies: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM order_items oi
            JOIN menu_items mi ON mi.id = oi.menu_item_id
            JOIN shops s ON s.id = mi.shop_id
            WHERE oi.order_id = $1 AND s.owner_id = $2
        )
        "#,
    )
    .bind(order_id)
    .bind(owner)
    .fetch_one(&mut *conn)
    .await?;
    Ok(supplies)
}

pub(crate) async fn fetch_line_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<LineItem>, StorageError> {
    let items: Vec<LineItem> =
        sqlx::query_as("SELECT menu_item_id, quantity, unit_price FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(items)
}

async fn attach_line_items(mut order: Order, conn: &mut SqliteConnection) -> Result<Order, StorageError> {
    order.line_items = fetch_line_items(&order.order_id, conn).await?;
    Ok(order)
}

async fn attach_all(orders: Vec<Order>, conn: &mut SqliteConnection) -> Result<Vec<Order>, StorageError> {
    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        result.push(attach_line_items(order, conn).await?);
    }
    Ok(result)
}

/// Resolves the outcome of a conditional update: a row means the transition landed, no row means
/// either the order is gone or its state moved on underneath us.
async fn finish_conditional(
    order_id: &OrderId,
    updated: Option<Order>,
    conn: &mut SqliteConnection,
) -> Result<Order, StorageError> {
    match updated {
        Some(order) => attach_line_items(order, conn).await,
        None => {
            if fetch_order_exists(order_id, conn).await? {
                trace!("📝️ Conditional update on order {order_id} matched no row");
                Err(StorageError::StaleTransition(order_id.clone()))
            } else {
                Err(StorageError::NotFound(format!("order {order_id}")))
            }
        },
    }
}

async fn fetch_order_exists(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, StorageError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_id = $1)")
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}
