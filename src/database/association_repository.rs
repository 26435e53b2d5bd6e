//! Existence checks for externally-owned entities.
//!
//! Users, orders and appointments live in the wider hospital platform; the
//! payment service only validates that a referenced row exists before it
//! links a transaction to it.

use crate::database::error::DatabaseError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AssociationRepository {
    pool: PgPool,
}

impl AssociationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn user_exists(&self, user_id: Uuid) -> Result<bool, DatabaseError> {
        self.exists("users", user_id).await
    }

    pub async fn order_exists(&self, order_id: Uuid) -> Result<bool, DatabaseError> {
        self.exists("orders", order_id).await
    }

    pub async fn appointment_exists(&self, appointment_id: Uuid) -> Result<bool, DatabaseError> {
        self.exists("appointments", appointment_id).await
    }

    async fn exists(&self, table: &str, id: Uuid) -> Result<bool, DatabaseError> {
        // `table` is one of the three fixed names above, never user input.
        let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table);
        sqlx::query_scalar::<_, bool>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
