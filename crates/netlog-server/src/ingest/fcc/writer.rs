// FCC licence storage layer
//
// One multi-row `INSERT ... ON CONFLICT DO UPDATE` per batch. When the batch
// statement fails, rows are retried one at a time with the same conflict
// policy; a row that still fails at the database level is logged and
// dropped so a single bad record cannot stall the import.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

use super::models::{EntityRecord, LicenseRecord};
use super::parser::UlsRecord;
use super::Result;

/// Settings key stamped when a full import completes
pub const LAST_UPDATED_SETTING: &str = "fcc_last_updated";

/// Rows per statement are bounded by the Postgres bind limit (65535) divided
/// by the widest row (entity: 23 columns).
pub const MAX_BATCH_SIZE: usize = 2000;

/// Result of writing one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub written: usize,
    pub dropped: usize,
}

/// Table mapping for a ULS record type
pub trait UpsertTable: UlsRecord {
    const TABLE: &'static str;
    /// Conflict target, bound first by `bind_row`
    const KEY_COLUMNS: &'static [&'static str];
    /// Columns overwritten on conflict, bound after the keys in this order
    const VALUE_COLUMNS: &'static [&'static str];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

/// Sink for deduplicated batches of one record type
#[async_trait]
pub trait BatchWriter<R: Sync>: Send + Sync {
    async fn write_batch(&self, batch: &[R]) -> Result<WriteOutcome>;
}

/// Destination tables of the import
#[async_trait]
pub trait LicenseStore: BatchWriter<LicenseRecord> + BatchWriter<EntityRecord> {
    /// Empty both destination tables in one transaction.
    ///
    /// Called for every fresh job, so an `AM`-only or `EN`-only import also
    /// leaves the other table empty.
    async fn clear_all(&self) -> Result<()>;

    /// Record the completion time of the last full import
    async fn mark_last_updated(&self, at: DateTime<Utc>) -> Result<()>;
}

/// Postgres-backed licence store
#[derive(Clone)]
pub struct PgLicenseStore {
    db: PgPool,
}

impl PgLicenseStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn upsert_rows<R: UpsertTable>(&self, rows: &[R]) -> std::result::Result<(), sqlx::Error> {
        let mut query_builder = upsert_query(rows);
        query_builder.build().execute(&self.db).await?;
        Ok(())
    }

    /// Row-at-a-time fallback after a failed batch statement
    async fn write_rows_individually<R: UpsertTable>(&self, batch: &[R]) -> Result<WriteOutcome> {
        let mut outcome = WriteOutcome::default();

        for record in batch {
            match self.upsert_rows(std::slice::from_ref(record)).await {
                Ok(()) => outcome.written += 1,
                Err(e) if is_row_error(&e) => {
                    warn!(
                        table = R::TABLE,
                        key = ?record.natural_key(),
                        error = %e,
                        "Dropping row after fallback insert failed"
                    );
                    outcome.dropped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(outcome)
    }
}

/// Errors caused by the row's content rather than the connection
fn is_row_error(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(_) | sqlx::Error::Encode(_))
}

/// Build `INSERT INTO t (...) VALUES (...), ... ON CONFLICT (keys) DO UPDATE SET ...`
fn upsert_query<'args, R: UpsertTable>(rows: &'args [R]) -> QueryBuilder<'args, Postgres> {
    let columns: Vec<&str> = R::KEY_COLUMNS
        .iter()
        .chain(R::VALUE_COLUMNS.iter())
        .copied()
        .collect();

    let mut query_builder =
        QueryBuilder::new(format!("INSERT INTO {} ({}) ", R::TABLE, columns.join(", ")));

    query_builder.push_values(rows, |mut b, record| {
        record.bind_row(&mut b);
    });

    let updates: Vec<String> = R::VALUE_COLUMNS
        .iter()
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect();

    query_builder.push(format!(
        " ON CONFLICT ({}) DO UPDATE SET {}, updated_at = NOW()",
        R::KEY_COLUMNS.join(", "),
        updates.join(", ")
    ));

    query_builder
}

#[async_trait]
impl<R: UpsertTable> BatchWriter<R> for PgLicenseStore {
    async fn write_batch(&self, batch: &[R]) -> Result<WriteOutcome> {
        if batch.is_empty() {
            return Ok(WriteOutcome::default());
        }

        match self.upsert_rows(batch).await {
            Ok(()) => {
                debug!(table = R::TABLE, rows = batch.len(), "Batch upserted");
                Ok(WriteOutcome {
                    written: batch.len(),
                    dropped: 0,
                })
            }
            Err(e) => {
                warn!(
                    table = R::TABLE,
                    rows = batch.len(),
                    error = %e,
                    "Batch upsert failed, falling back to per-row inserts"
                );
                self.write_rows_individually(batch).await
            }
        }
    }
}

#[async_trait]
impl LicenseStore for PgLicenseStore {
    async fn clear_all(&self) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("TRUNCATE TABLE fcc_amateur_licenses, fcc_entities RESTART IDENTITY")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Cleared FCC licence tables");
        Ok(())
    }

    async fn mark_last_updated(&self, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(LAST_UPDATED_SETTING)
        .bind(at.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Table mappings
// ============================================================================

impl UpsertTable for LicenseRecord {
    const TABLE: &'static str = "fcc_amateur_licenses";
    const KEY_COLUMNS: &'static [&'static str] = &["call_sign"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "operator_class",
        "group_code",
        "region_code",
        "trustee_call_sign",
        "trustee_indicator",
        "physician_certification",
        "ve_signature",
        "systematic_call_sign_change",
        "vanity_call_sign_change",
        "vanity_relationship",
        "previous_call_sign",
        "previous_operator_class",
        "trustee_name",
    ];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(&self.call_sign)
            .push_bind(&self.operator_class)
            .push_bind(&self.group_code)
            .push_bind(&self.region_code)
            .push_bind(&self.trustee_call_sign)
            .push_bind(&self.trustee_indicator)
            .push_bind(&self.physician_certification)
            .push_bind(&self.ve_signature)
            .push_bind(&self.systematic_call_sign_change)
            .push_bind(&self.vanity_call_sign_change)
            .push_bind(&self.vanity_relationship)
            .push_bind(&self.previous_call_sign)
            .push_bind(&self.previous_operator_class)
            .push_bind(&self.trustee_name);
    }
}

impl UpsertTable for EntityRecord {
    const TABLE: &'static str = "fcc_entities";
    const KEY_COLUMNS: &'static [&'static str] = &["call_sign", "licensee_id", "entity_type"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "entity_name",
        "first_name",
        "mi",
        "last_name",
        "suffix",
        "phone",
        "fax",
        "email",
        "street_address",
        "city",
        "state",
        "zip_code",
        "po_box",
        "attention_line",
        "sgin",
        "frn",
        "applicant_type_code",
        "applicant_type_other",
        "status_code",
        "status_date",
    ];

    fn bind_row<'args>(&'args self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        // Key columns are NOT NULL DEFAULT '' so the unique constraint holds
        row.push_bind(&self.call_sign)
            .push_bind(self.licensee_id.as_deref().unwrap_or(""))
            .push_bind(self.entity_type.as_deref().unwrap_or(""))
            .push_bind(&self.entity_name)
            .push_bind(&self.first_name)
            .push_bind(&self.mi)
            .push_bind(&self.last_name)
            .push_bind(&self.suffix)
            .push_bind(&self.phone)
            .push_bind(&self.fax)
            .push_bind(&self.email)
            .push_bind(&self.street_address)
            .push_bind(&self.city)
            .push_bind(&self.state)
            .push_bind(&self.zip_code)
            .push_bind(&self.po_box)
            .push_bind(&self.attention_line)
            .push_bind(&self.sgin)
            .push_bind(&self.frn)
            .push_bind(&self.applicant_type_code)
            .push_bind(&self.applicant_type_other)
            .push_bind(&self.status_code)
            .push_bind(self.status_date);
    }
}
