//! SQL generation for reconciling a PostgreSQL store with the canonical snapshot.
//!
//! All statements are idempotent: rows are upserted by key, and the optional
//! deactivation statement flags every active row whose key is not part of the
//! batch. Running the same script twice leaves the store unchanged.

use canon_registry::Snapshot;

use crate::store::{ConceptRow, MetadataRow, ValueRow, ValueSetRow};

/// Metadata table name.
pub const METADATA_TABLE: &str = "canon_metadata";
/// Concepts table name.
pub const CONCEPTS_TABLE: &str = "canon_concepts";
/// Value sets table name.
pub const VALUE_SETS_TABLE: &str = "canon_value_sets";
/// Values table name.
pub const VALUES_TABLE: &str = "canon_values";

/// Statements reconciling one entity batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSql {
    /// Upsert of every row in the batch; `None` for an empty batch.
    pub upsert: Option<String>,
    /// Deactivation of rows absent from the batch, if requested.
    pub deactivate: Option<String>,
}

impl BatchSql {
    /// Statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.upsert.iter().chain(self.deactivate.iter()).map(String::as_str)
    }
}

/// A complete reconciliation script.
#[derive(Debug, Clone, Default)]
pub struct SyncSql {
    /// Statements, in execution order.
    pub statements: Vec<String>,
}

impl SyncSql {
    /// Check if the script is empty.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Render the script, wrapped in a transaction.
    pub fn to_script(&self) -> String {
        let mut script = String::from("BEGIN;\n\n");
        for statement in &self.statements {
            script.push_str(statement);
            script.push_str(";\n\n");
        }
        script.push_str("COMMIT;\n");
        script
    }
}

/// SQL generator for PostgreSQL.
#[derive(Debug, Clone, Default)]
pub struct SyncSqlGenerator {
    schema: Option<String>,
}

impl SyncSqlGenerator {
    /// Create a generator for unqualified table names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Qualify tables with a database schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.schema = if schema.is_empty() || schema == "public" {
            None
        } else {
            Some(schema)
        };
        self
    }

    /// Qualified table name.
    pub fn table(&self, name: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(name)),
            None => quote_identifier(name),
        }
    }

    /// Full reconciliation script for a snapshot.
    pub fn generate(&self, snapshot: &Snapshot) -> SyncSql {
        let value_sets: Vec<ValueSetRow> = snapshot.list_value_sets().map(Into::into).collect();
        let concepts: Vec<ConceptRow> = snapshot.list_concepts().map(Into::into).collect();
        let values: Vec<ValueRow> = snapshot.values().iter().map(Into::into).collect();

        let mut statements = self.bootstrap();
        for batch in [
            self.upsert_value_sets(&value_sets, true),
            self.upsert_concepts(&concepts, true),
            self.upsert_values(&values, true),
        ] {
            statements.extend(batch.statements().map(String::from));
        }
        statements.extend(self.upsert_metadata(&MetadataRow::for_snapshot(snapshot)));

        SyncSql { statements }
    }

    /// `CREATE TABLE IF NOT EXISTS` for every table.
    pub fn bootstrap(&self) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(schema) = &self.schema {
            statements.push(format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                quote_identifier(schema)
            ));
        }

        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             kernel_version VARCHAR(64) NOT NULL,\n    \
             snapshot_id VARCHAR(128) NOT NULL,\n    \
             applied_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),\n    \
             is_current BOOLEAN NOT NULL DEFAULT FALSE,\n    \
             PRIMARY KEY (kernel_version, snapshot_id)\n)",
            self.table(METADATA_TABLE)
        ));
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             concept_id VARCHAR(255) PRIMARY KEY,\n    \
             label TEXT NOT NULL,\n    \
             category VARCHAR(32) NOT NULL,\n    \
             domain VARCHAR(32) NOT NULL,\n    \
             description TEXT NOT NULL DEFAULT '',\n    \
             version VARCHAR(64) NOT NULL,\n    \
             is_active BOOLEAN NOT NULL DEFAULT TRUE,\n    \
             updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()\n)",
            self.table(CONCEPTS_TABLE)
        ));
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             value_set_id VARCHAR(255) PRIMARY KEY,\n    \
             code VARCHAR(255) NOT NULL,\n    \
             concept_id VARCHAR(255),\n    \
             jurisdiction VARCHAR(64),\n    \
             domain VARCHAR(32) NOT NULL,\n    \
             description TEXT NOT NULL DEFAULT '',\n    \
             is_active BOOLEAN NOT NULL DEFAULT TRUE,\n    \
             updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()\n)",
            self.table(VALUE_SETS_TABLE)
        ));
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             value_id VARCHAR(512) PRIMARY KEY,\n    \
             value_key VARCHAR(255) NOT NULL,\n    \
             value_set_id VARCHAR(255) NOT NULL,\n    \
             label TEXT NOT NULL,\n    \
             description TEXT,\n    \
             sort_order INTEGER NOT NULL DEFAULT 0,\n    \
             metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,\n    \
             is_active BOOLEAN NOT NULL DEFAULT TRUE,\n    \
             updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()\n)",
            self.table(VALUES_TABLE)
        ));

        statements
    }

    /// Make `row` the only current metadata row.
    pub fn upsert_metadata(&self, row: &MetadataRow) -> Vec<String> {
        let table = self.table(METADATA_TABLE);
        vec![
            format!("UPDATE {} SET is_current = FALSE WHERE is_current", table),
            format!(
                "INSERT INTO {} (kernel_version, snapshot_id, applied_at, is_current)\n\
                 VALUES ({}, {}, {}, {})\n\
                 ON CONFLICT (kernel_version, snapshot_id) DO UPDATE SET\n    \
                 applied_at = EXCLUDED.applied_at,\n    \
                 is_current = EXCLUDED.is_current",
                table,
                quote_literal(&row.kernel_version),
                quote_literal(&row.snapshot_id),
                quote_literal(&row.applied_at.to_rfc3339()),
                row.is_current.to_string().to_uppercase(),
            ),
        ]
    }

    /// Upsert a concept batch.
    pub fn upsert_concepts(&self, batch: &[ConceptRow], deactivate_missing: bool) -> BatchSql {
        let rows: Vec<String> = batch
            .iter()
            .map(|r| {
                format!(
                    "({}, {}, {}, {}, {}, {})",
                    quote_literal(&r.concept_id),
                    quote_literal(&r.label),
                    quote_literal(r.category.as_str()),
                    quote_literal(r.domain.as_str()),
                    quote_literal(&r.description),
                    quote_literal(&r.version),
                )
            })
            .collect();
        let ids: Vec<&str> = batch.iter().map(|r| r.concept_id.as_str()).collect();

        self.batch(
            CONCEPTS_TABLE,
            "concept_id",
            &["label", "category", "domain", "description", "version"],
            &rows,
            &ids,
            deactivate_missing,
        )
    }

    /// Upsert a value set batch.
    pub fn upsert_value_sets(&self, batch: &[ValueSetRow], deactivate_missing: bool) -> BatchSql {
        let rows: Vec<String> = batch
            .iter()
            .map(|r| {
                format!(
                    "({}, {}, {}, {}, {}, {})",
                    quote_literal(&r.value_set_id),
                    quote_literal(&r.code),
                    quote_optional(r.concept_id.as_deref()),
                    quote_optional(r.jurisdiction.as_deref()),
                    quote_literal(r.domain.as_str()),
                    quote_literal(&r.description),
                )
            })
            .collect();
        let ids: Vec<&str> = batch.iter().map(|r| r.value_set_id.as_str()).collect();

        self.batch(
            VALUE_SETS_TABLE,
            "value_set_id",
            &["code", "concept_id", "jurisdiction", "domain", "description"],
            &rows,
            &ids,
            deactivate_missing,
        )
    }

    /// Upsert a value batch.
    pub fn upsert_values(&self, batch: &[ValueRow], deactivate_missing: bool) -> BatchSql {
        let rows: Vec<String> = batch
            .iter()
            .map(|r| {
                let metadata = serde_json::to_string(&r.metadata).unwrap_or_else(|_| "{}".into());
                format!(
                    "({}, {}, {}, {}, {}, {}, {}::jsonb)",
                    quote_literal(&r.value_id),
                    quote_literal(&r.value_key),
                    quote_literal(&r.value_set_id),
                    quote_literal(&r.label),
                    quote_optional(r.description.as_deref()),
                    r.sort_order,
                    quote_literal(&metadata),
                )
            })
            .collect();
        let ids: Vec<&str> = batch.iter().map(|r| r.value_id.as_str()).collect();

        self.batch(
            VALUES_TABLE,
            "value_id",
            &[
                "value_key",
                "value_set_id",
                "label",
                "description",
                "sort_order",
                "metadata",
            ],
            &rows,
            &ids,
            deactivate_missing,
        )
    }

    fn batch(
        &self,
        table_name: &str,
        key: &str,
        columns: &[&str],
        rows: &[String],
        ids: &[&str],
        deactivate_missing: bool,
    ) -> BatchSql {
        let table = self.table(table_name);

        let upsert = (!rows.is_empty()).then(|| {
            let all_columns = std::iter::once(key)
                .chain(columns.iter().copied())
                .collect::<Vec<_>>()
                .join(", ");
            let updates = columns
                .iter()
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect::<Vec<_>>()
                .join(",\n    ");
            let current = columns
                .iter()
                .map(|c| format!("{table}.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            let incoming = columns
                .iter()
                .map(|c| format!("EXCLUDED.{c}"))
                .collect::<Vec<_>>()
                .join(", ");

            format!(
                "INSERT INTO {table} ({all_columns})\nVALUES\n    {}\n\
                 ON CONFLICT ({key}) DO UPDATE SET\n    {updates},\n    \
                 is_active = TRUE,\n    updated_at = NOW()\n\
                 WHERE NOT {table}.is_active OR ({current}) IS DISTINCT FROM ({incoming})",
                rows.join(",\n    "),
            )
        });

        let deactivate = deactivate_missing.then(|| {
            if ids.is_empty() {
                format!(
                    "UPDATE {table} SET is_active = FALSE, updated_at = NOW() WHERE is_active"
                )
            } else {
                let list = ids
                    .iter()
                    .map(|id| quote_literal(id))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "UPDATE {table} SET is_active = FALSE, updated_at = NOW()\n\
                     WHERE is_active AND {key} NOT IN ({list})"
                )
            }
        });

        BatchSql { upsert, deactivate }
    }
}

/// Quote an identifier.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quote_optional(value: Option<&str>) -> String {
    value.map(quote_literal).unwrap_or_else(|| "NULL".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_registry::{Category, Concept, Domain, RegistryBuilder, Value, ValueSet, Version};

    fn snapshot() -> Snapshot {
        let mut builder = RegistryBuilder::new(Version::new(1, 2, 0)).with_snapshot_id("snap_sql");
        builder
            .register_concept(Concept::new(
                "VENDOR",
                "Vendor's record",
                Category::Entity,
                Domain::Procurement,
                "1.0.0",
            ))
            .unwrap();
        builder
            .register_value_set(ValueSet::new("VAT", Domain::Tax).in_jurisdiction("DE"))
            .unwrap();
        builder.add_value(
            Value::new("VAT@DE", "STANDARD", "Standard rate").with_metadata("source", "bzst"),
        );
        builder.build().unwrap()
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_identifier("my\"table"), "\"my\"\"table\"");
    }

    #[test]
    fn test_table_qualification() {
        assert_eq!(SyncSqlGenerator::new().table("t"), "\"t\"");
        assert_eq!(
            SyncSqlGenerator::new().with_schema("public").table("t"),
            "\"t\""
        );
        assert_eq!(
            SyncSqlGenerator::new().with_schema("registry").table("t"),
            "\"registry\".\"t\""
        );
    }

    #[test]
    fn test_concept_upsert_and_deactivate() {
        let snapshot = snapshot();
        let rows: Vec<ConceptRow> = snapshot.list_concepts().map(Into::into).collect();
        let sql = SyncSqlGenerator::new().upsert_concepts(&rows, true);

        let upsert = sql.upsert.as_deref().unwrap();
        assert!(upsert.contains("INSERT INTO \"canon_concepts\""));
        assert!(upsert.contains("ON CONFLICT (concept_id) DO UPDATE"));
        assert!(upsert.contains("'Vendor''s record'"));
        assert!(upsert.contains("IS DISTINCT FROM"));

        let deactivate = sql.deactivate.as_deref().unwrap();
        assert!(deactivate.contains("concept_id NOT IN ('VENDOR')"));
    }

    #[test]
    fn test_empty_batch_deactivates_everything() {
        let sql = SyncSqlGenerator::new().upsert_concepts(&[], true);
        assert!(sql.upsert.is_none());
        assert!(sql.deactivate.unwrap().ends_with("WHERE is_active"));
    }

    #[test]
    fn test_no_deactivation_when_not_requested() {
        let sql = SyncSqlGenerator::new().upsert_concepts(&[], false);
        assert_eq!(sql.statements().count(), 0);
    }

    #[test]
    fn test_value_upsert_includes_metadata_and_nulls() {
        let snapshot = snapshot();
        let rows: Vec<ValueRow> = snapshot.values().iter().map(Into::into).collect();
        let sql = SyncSqlGenerator::new().upsert_values(&rows, false);
        let upsert = sql.upsert.unwrap();
        assert!(upsert.contains("'VAT@DE:STANDARD'"));
        assert!(upsert.contains("'{\"source\":\"bzst\"}'::jsonb"));
        assert!(upsert.contains("NULL"));
    }

    #[test]
    fn test_full_script() {
        let sql = SyncSqlGenerator::new().generate(&snapshot());
        let script = sql.to_script();

        assert!(script.starts_with("BEGIN;"));
        assert!(script.trim_end().ends_with("COMMIT;"));
        assert!(script.contains("CREATE TABLE IF NOT EXISTS \"canon_values\""));
        assert!(script.contains("'snap_sql'"));

        // Value sets are written before the values that reference them.
        let sets = script.find("INSERT INTO \"canon_value_sets\"").unwrap();
        let values = script.find("INSERT INTO \"canon_values\"").unwrap();
        assert!(sets < values);
    }
}
