//! Repository for the `users` table.

use roomkeep_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list for `users u JOIN roles r` queries.
const COLUMNS: &str =
    "u.id, u.name, u.email, u.phone, u.role_id, r.name AS role, u.is_active, u.created_at, u.updated_at";

pub struct UserRepo;

impl UserRepo {
    /// Insert a user, returning the created row with its role name.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "WITH u AS ( \
                INSERT INTO users (name, email, phone, role_id) \
                VALUES ($1, $2, $3, $4) \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM u JOIN roles r ON r.id = u.role_id"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(input.role_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id WHERE u.id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the given users, ordered by id. Missing ids are simply absent
    /// from the result.
    pub async fn find_many(pool: &PgPool, ids: &[DbId]) -> Result<Vec<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM users u JOIN roles r ON r.id = u.role_id \
             WHERE u.id = ANY($1) ORDER BY u.id"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }
}
