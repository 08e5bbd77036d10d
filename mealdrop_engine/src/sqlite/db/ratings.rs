use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{MenuItemId, RatingAggregate, UserId},
    traits::StorageError,
};

pub(crate) async fn has_delivered_order_with_item(
    customer: UserId,
    item: MenuItemId,
    conn: &mut SqliteConnection,
) -> Result<bool, StorageError> {
    let delivered: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM orders o
            JOIN order_items oi ON oi.order_id = o.order_id
            WHERE o.customer_id = $1 AND oi.menu_item_id = $2 AND o.status = 'delivered'
        )
        "#,
    )
    .bind(customer)
    .bind(item)
    .fetch_one(conn)
    .await?;
    Ok(delivered)
}

/// Upserts the customer's rating and recomputes the item aggregate from the ratings table. Runs
/// on a connection the caller has already placed inside a transaction.
pub(crate) async fn upsert_rating(
    item: MenuItemId,
    customer: UserId,
    rating: u8,
    conn: &mut SqliteConnection,
) -> Result<RatingAggregate, StorageError> {
    sqlx::query(
        r#"
        INSERT INTO item_ratings (menu_item_id, customer_id, rating) VALUES ($1, $2, $3)
        ON CONFLICT (menu_item_id, customer_id)
        DO UPDATE SET rating = excluded.rating, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(item)
    .bind(customer)
    .bind(rating as i64)
    .execute(&mut *conn)
    .await?;
    let aggregate: RatingAggregate = sqlx::query_as(
        r#"
        UPDATE menu_items SET
            rating_average = (SELECT ROUND(AVG(rating), 2) FROM item_ratings WHERE menu_item_id = $1),
            rating_count = (SELECT COUNT(*) FROM item_ratings WHERE menu_item_id = $1)
        WHERE id = $1
        RETURNING rating_average AS average, rating_count AS count
        "#,
    )
    .bind(item)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StorageError::NotFound(format!("menu item {item}")))?;
    debug!("⭐️ {item} rated {rating} by {customer}. New aggregate: {:.2} over {}", aggregate.average, aggregate.count);
    Ok(aggregate)
}
