// src/services/users.rs

use sqlx::SqlitePool;

use crate::{db::Database, models::user::User, services::error::ServiceError};

/// Read-only view over the 'users' table, used to resolve the owner of an attempt.
#[derive(Clone, Debug)]
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User {} not found", id)))
    }
}
