// src/models/user.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'users' table in the database.
/// The exam core only reads it to resolve identities; credentials stay with the auth service.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,

    pub name: String,

    pub email: String,
}
