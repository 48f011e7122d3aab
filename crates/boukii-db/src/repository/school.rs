//! # School Repository
//!
//! Schools own the gateway account (instance + key), VAT rate and terms URL.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use boukii_core::School;

const SCHOOL_COLUMNS: &str = r#"
    id, name, currency, payrexx_instance, payrexx_key,
    vat_rate_bps, terms_url, created_at
"#;

/// Repository for school database operations.
#[derive(Debug, Clone)]
pub struct SchoolRepository {
    pool: SqlitePool,
}

impl SchoolRepository {
    /// Creates a new SchoolRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SchoolRepository { pool }
    }

    /// Gets a school by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<School>> {
        let school = sqlx::query_as::<_, School>(&format!(
            "SELECT {} FROM schools WHERE id = ?1",
            SCHOOL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(school)
    }

    /// Inserts a school.
    pub async fn insert(&self, school: &School) -> DbResult<()> {
        debug!(school_id = school.id, name = %school.name, "Inserting school");

        sqlx::query(
            r#"
            INSERT INTO schools (
                id, name, currency, payrexx_instance, payrexx_key,
                vat_rate_bps, terms_url, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(school.id)
        .bind(&school.name)
        .bind(&school.currency)
        .bind(&school.payrexx_instance)
        .bind(&school.payrexx_key)
        .bind(school.vat_rate_bps)
        .bind(&school.terms_url)
        .bind(school.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
