//! PostgreSQL store.
//!
//! Writes execute the statements produced by [`SyncSqlGenerator`], one
//! transaction per batch, so a failing batch leaves its table untouched.
//! Reads against a database that was never synced (missing tables or schema)
//! see an empty store.

use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

use crate::error::{MigrateResult, MigrationError};
use crate::sql::{
    BatchSql, CONCEPTS_TABLE, METADATA_TABLE, SyncSqlGenerator, VALUE_SETS_TABLE, VALUES_TABLE,
};
use crate::store::{
    BatchOutcome, ConceptRow, MetadataRow, RegistryStore, StoredValue, ValueRow, ValueSetRow,
};

/// Store backed by a PostgreSQL database.
pub struct PostgresStore {
    client: Mutex<Client>,
    sql: SyncSqlGenerator,
}

impl PostgresStore {
    /// Connect to the database at `url`, using tables in `schema`.
    pub async fn connect(url: &str, schema: &str) -> MigrateResult<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| MigrationError::unavailable(format!("Failed to connect: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        info!(schema = %schema, "Connected to PostgreSQL store");
        Ok(Self {
            client: Mutex::new(client),
            sql: SyncSqlGenerator::new().with_schema(schema),
        })
    }

    /// Create the registry tables if they do not exist.
    pub async fn ensure_tables(&self) -> MigrateResult<()> {
        let client = self.client.lock().await;
        for statement in self.sql.bootstrap() {
            client.batch_execute(&statement).await.map_err(db_error)?;
        }
        debug!("Ensured registry tables");
        Ok(())
    }

    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> MigrateResult<Vec<Row>> {
        debug!(sql = %sql, "Executing query");
        let client = self.client.lock().await;
        match client.query(sql, params).await {
            Ok(rows) => Ok(rows),
            Err(e) if is_undefined_relation(e.code()) => {
                debug!(error = %e, "Registry tables not found; reading an empty store");
                Ok(Vec::new())
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn read_ids(&self, column: &str, table: &str) -> MigrateResult<Vec<String>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE is_active ORDER BY {}",
            column,
            self.sql.table(table),
            column
        );
        let rows = self.query(&sql, &[]).await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(db_error))
            .collect()
    }

    async fn apply_batch(&self, batch: BatchSql) -> MigrateResult<BatchOutcome> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(db_error)?;

        let mut outcome = BatchOutcome::default();
        if let Some(upsert) = &batch.upsert {
            outcome.upserted = row_count(tx.execute(upsert.as_str(), &[]).await.map_err(db_error)?);
        }
        if let Some(deactivate) = &batch.deactivate {
            outcome.deactivated =
                row_count(tx.execute(deactivate.as_str(), &[]).await.map_err(db_error)?);
        }

        tx.commit().await.map_err(db_error)?;
        Ok(outcome)
    }
}

/// Missing table or schema: the store has never been synced.
fn is_undefined_relation(code: Option<&SqlState>) -> bool {
    code.is_some_and(|state| {
        *state == SqlState::UNDEFINED_TABLE || *state == SqlState::INVALID_SCHEMA_NAME
    })
}

fn row_count(affected: u64) -> usize {
    usize::try_from(affected).unwrap_or(usize::MAX)
}

fn db_error(e: tokio_postgres::Error) -> MigrationError {
    if e.is_closed() {
        MigrationError::unavailable(e.to_string())
    } else {
        MigrationError::store(e.to_string())
    }
}

fn decode_metadata(row: &Row) -> Result<MetadataRow, tokio_postgres::Error> {
    Ok(MetadataRow {
        kernel_version: row.try_get("kernel_version")?,
        snapshot_id: row.try_get("snapshot_id")?,
        applied_at: row.try_get("applied_at")?,
        is_current: row.try_get("is_current")?,
    })
}

fn decode_value(row: &Row) -> Result<StoredValue, tokio_postgres::Error> {
    Ok(StoredValue {
        value_id: row.try_get("value_id")?,
        value_key: row.try_get("value_key")?,
        value_set_id: row.try_get("value_set_id")?,
    })
}

#[async_trait::async_trait]
impl RegistryStore for PostgresStore {
    async fn read_metadata(&self) -> MigrateResult<Option<MetadataRow>> {
        let sql = format!(
            "SELECT kernel_version, snapshot_id, applied_at, is_current FROM {} \
             ORDER BY is_current DESC, applied_at DESC LIMIT 1",
            self.sql.table(METADATA_TABLE)
        );
        let rows = self.query(&sql, &[]).await?;
        rows.first()
            .map(decode_metadata)
            .transpose()
            .map_err(db_error)
    }

    async fn read_concept_ids(&self) -> MigrateResult<Vec<String>> {
        self.read_ids("concept_id", CONCEPTS_TABLE).await
    }

    async fn read_value_set_ids(&self) -> MigrateResult<Vec<String>> {
        self.read_ids("value_set_id", VALUE_SETS_TABLE).await
    }

    async fn read_values(&self, value_set_id: Option<&str>) -> MigrateResult<Vec<StoredValue>> {
        let table = self.sql.table(VALUES_TABLE);
        let rows = match value_set_id {
            Some(id) => {
                let sql = format!(
                    "SELECT value_id, value_key, value_set_id FROM {} \
                     WHERE is_active AND value_set_id = $1 ORDER BY value_key",
                    table
                );
                self.query(&sql, &[&id]).await?
            }
            None => {
                let sql = format!(
                    "SELECT value_id, value_key, value_set_id FROM {} \
                     WHERE is_active ORDER BY value_set_id, value_key",
                    table
                );
                self.query(&sql, &[]).await?
            }
        };
        rows.iter()
            .map(decode_value)
            .collect::<Result<_, _>>()
            .map_err(db_error)
    }

    async fn upsert_metadata(&self, row: &MetadataRow) -> MigrateResult<()> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(db_error)?;
        for statement in self.sql.upsert_metadata(row) {
            tx.execute(statement.as_str(), &[]).await.map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        debug!(version = %row.kernel_version, snapshot_id = %row.snapshot_id, "Wrote metadata");
        Ok(())
    }

    async fn upsert_concepts(
        &self,
        batch: &[ConceptRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome> {
        self.apply_batch(self.sql.upsert_concepts(batch, deactivate_missing))
            .await
    }

    async fn upsert_value_sets(
        &self,
        batch: &[ValueSetRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome> {
        self.apply_batch(self.sql.upsert_value_sets(batch, deactivate_missing))
            .await
    }

    async fn upsert_values(
        &self,
        batch: &[ValueRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome> {
        self.apply_batch(self.sql.upsert_values(batch, deactivate_missing))
            .await
    }
}
