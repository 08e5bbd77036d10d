use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Role, User, UserId},
    traits::StorageError,
};

pub(crate) async fn create_user(
    name: &str,
    email: &str,
    role: Role,
    conn: &mut SqliteConnection,
) -> Result<User, StorageError> {
    let user: User = sqlx::query_as("INSERT INTO users (name, email, role) VALUES ($1, $2, $3) RETURNING *")
        .bind(name)
        .bind(email)
        .bind(role)
        .fetch_one(conn)
        .await?;
    debug!("💻️ Created {} account for {} ({})", user.role, user.name, user.id);
    Ok(user)
}

pub(crate) async fn fetch_user(id: UserId, conn: &mut SqliteConnection) -> Result<Option<User>, StorageError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(user)
}

pub(crate) async fn fetch_user_by_email(
    email: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, StorageError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(conn).await?;
    Ok(user)
}
