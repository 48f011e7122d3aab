//! # Client Repository
//!
//! Read access to school clients, used for buyer contact fields and the
//! recipient of confirmation mails.

use sqlx::SqlitePool;

use crate::error::DbResult;
use boukii_core::Client;

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, first_name, last_name, email, phone, address, zip, city, country
            FROM clients
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    pub async fn insert(&self, client: &Client) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (
                id, first_name, last_name, email, phone, address, zip, city, country
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(client.id)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.zip)
        .bind(&client.city)
        .bind(&client.country)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
