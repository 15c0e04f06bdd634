use async_trait::async_trait;
use sqlx::PgPool;

use super::{AuditRecord, AuditRecorder};
use crate::error::RecordError;

/// Audit log kept in a Postgres table.
///
/// The table name comes from configuration and is validated as a plain
/// identifier before it ever reaches this type.
pub struct PgAuditRecorder {
    pool: PgPool,
    table: String,
    insert_sql: String,
}

impl PgAuditRecorder {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        let table = table.into();
        let insert_sql = format!(
            "INSERT INTO \"{table}\" (id, email, timestamp, email_content, status, error_message)
             VALUES ($1, $2, $3, $4, $5, $6)"
        );
        Self {
            pool,
            table,
            insert_sql,
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL,
                email_content TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT
            )",
            self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditRecorder for PgAuditRecorder {
    async fn record(&self, record: &AuditRecord) -> Result<(), RecordError> {
        sqlx::query(&self.insert_sql)
            .bind(record.id)
            .bind(&record.email)
            .bind(record.timestamp)
            .bind(&record.content)
            .bind(record.status.as_str())
            .bind(record.error_detail.as_deref())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
