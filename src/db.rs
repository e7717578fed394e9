use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;
use tracing::debug;

use crate::aggregate::{DateRange, RecordFilter};
use crate::models::{RegistrationRecord, VehicleCategory};
use crate::period::PeriodKey;
use crate::store::{ensure_within, RecordStore, StoreStats};

pub type DbConn = Surreal<Db>;

/// Initialize database connection with RocksDB backend
pub async fn connect(path: &str) -> Result<DbConn> {
    let db = Surreal::new::<RocksDb>(path)
        .await
        .with_context(|| format!("opening SurrealDB at {}", path))?;
    db.use_ns("vehicles").use_db("registrations").await?;
    Ok(db)
}

/// Initialize database schema
pub async fn init_schema(db: &DbConn) -> Result<()> {
    db.query(
        r#"
        -- Registration counts (schemaless, dates kept as ISO strings)
        DEFINE TABLE IF NOT EXISTS registration SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_date ON registration FIELDS date;
        DEFINE INDEX IF NOT EXISTS idx_category ON registration FIELDS category;
        DEFINE INDEX IF NOT EXISTS idx_manufacturer ON registration FIELDS manufacturer;
        "#,
    )
    .await?
    .check()?;

    Ok(())
}

/// Row layout in the `registration` table. Period fields are re-derived on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    date: String,
    category: VehicleCategory,
    manufacturer: Option<String>,
    region: Option<String>,
    count: u64,
}

impl From<&RegistrationRecord> for StoredRecord {
    fn from(r: &RegistrationRecord) -> Self {
        Self {
            date: r.date.to_string(),
            category: r.category,
            manufacturer: r.manufacturer.clone(),
            region: r.region.clone(),
            count: r.count,
        }
    }
}

impl StoredRecord {
    fn into_record(self) -> Result<RegistrationRecord> {
        let date: NaiveDate = self
            .date
            .parse()
            .with_context(|| format!("stored date {:?} is not ISO formatted", self.date))?;
        Ok(RegistrationRecord::new(
            date,
            self.category,
            self.manufacturer,
            self.region,
            self.count,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: usize,
}

#[derive(Debug, Deserialize)]
struct DateRow {
    date: String,
}

/// SurrealDB-backed store.
///
/// RocksDB holds an exclusive lock on its directory, so one process keeps a
/// single connection and shares the store behind an `Arc`.
pub struct SurrealStore {
    db: DbConn,
}

impl SurrealStore {
    pub async fn open(path: &str) -> Result<Self> {
        let db = connect(path).await?;
        init_schema(&db).await?;
        Ok(Self { db })
    }
}

#[async_trait]
impl RecordStore for SurrealStore {
    async fn fetch_records(&self, range: &DateRange, filter: &RecordFilter) -> Result<Vec<RegistrationRecord>> {
        let mut clauses = Vec::new();
        if range.start.is_some() {
            clauses.push("date >= $start");
        }
        if range.end.is_some() {
            clauses.push("date <= $end");
        }
        let mut sql = String::from("SELECT date, category, manufacturer, region, count FROM registration");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY date");

        let mut query = self.db.query(sql);
        if let Some(start) = range.start {
            query = query.bind(("start", start.to_string()));
        }
        if let Some(end) = range.end {
            query = query.bind(("end", end.to_string()));
        }
        let rows: Vec<StoredRecord> = query.await?.take(0)?;

        // Dimension filters run in process so null handling matches MemoryStore
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_record()?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn replace_period(&self, period: PeriodKey, records: Vec<RegistrationRecord>) -> Result<()> {
        ensure_within(period, &records)?;
        let (start, end) = period
            .bounds()
            .with_context(|| format!("period {} has no calendar bounds", period))?;

        let rows: Vec<StoredRecord> = records.iter().map(StoredRecord::from).collect();
        let sql = if rows.is_empty() {
            r#"
            BEGIN TRANSACTION;
            DELETE registration WHERE date >= $start AND date <= $end;
            COMMIT TRANSACTION;
            "#
        } else {
            r#"
            BEGIN TRANSACTION;
            DELETE registration WHERE date >= $start AND date <= $end;
            INSERT INTO registration $rows;
            COMMIT TRANSACTION;
            "#
        };

        debug!("Replacing {} with {} rows", period, rows.len());
        self.db
            .query(sql)
            .bind(("start", start.to_string()))
            .bind(("end", end.to_string()))
            .bind(("rows", rows))
            .await?
            .check()
            .with_context(|| format!("replacing period {}", period))?;

        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let mut response = self
            .db
            .query(
                r#"
                SELECT count() AS total FROM registration GROUP ALL;
                SELECT count() AS total FROM registration WHERE type::is::string(manufacturer) GROUP ALL;
                SELECT date FROM registration ORDER BY date ASC LIMIT 1;
                SELECT date FROM registration ORDER BY date DESC LIMIT 1;
                "#,
            )
            .await?;

        let total: Option<CountRow> = response.take(0)?;
        let attributed: Option<CountRow> = response.take(1)?;
        let first: Option<DateRow> = response.take(2)?;
        let latest: Option<DateRow> = response.take(3)?;

        let total = total.map_or(0, |r| r.total);
        let manufacturer_rows = attributed.map_or(0, |r| r.total);
        Ok(StoreStats {
            category_rows: total.saturating_sub(manufacturer_rows),
            manufacturer_rows,
            first_date: first.and_then(|r| r.date.parse().ok()),
            latest_date: latest.and_then(|r| r.date.parse().ok()),
        })
    }
}
