//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::intake::model::{Branch, IntakeRecord, Locale};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // RFC 3339 is what we write
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

const RECORD_COLUMNS: &str = "id, session_id, locale, first_name, last_name, phone, \
     email, date_of_birth, location, insurance, issue_category, branch, details, \
     more_info, notes, lead_score, created_at";

/// Map a libsql Row to an IntakeRecord.
///
/// Column order matches RECORD_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<IntakeRecord, libsql::Error> {
    let id_str: String = row.get(0)?;
    let locale_str: String = row.get(2)?;
    let branch_str: String = row.get(11)?;
    let details_str: String = row.get(12)?;
    let score: i64 = row.get(15)?;
    let created_str: String = row.get(16)?;

    let details: BTreeMap<String, String> = serde_json::from_str(&details_str).unwrap_or_else(|e| {
        warn!(record_id = %id_str, "Unreadable details column: {e}");
        BTreeMap::new()
    });

    Ok(IntakeRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        session_id: row.get(1)?,
        locale: locale_str.parse().unwrap_or(Locale::En),
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone: row.get(5)?,
        email: row.get(6).ok(),
        date_of_birth: row.get(7).ok(),
        location: row.get(8).ok(),
        insurance: row.get(9).ok(),
        issue_category: row.get(10)?,
        branch: branch_str.parse().unwrap_or(Branch::Unset),
        details,
        more_info: row.get(13)?,
        notes: row.get(14)?,
        lead_score: u32::try_from(score).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
    })
}

// ── Database trait implementation ───────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Intake records ──────────────────────────────────────────────

    async fn insert_record(&self, record: &IntakeRecord) -> Result<Uuid, DatabaseError> {
        let details = serde_json::to_string(&record.details)
            .map_err(|e| DatabaseError::Serialization(format!("insert_record details: {e}")))?;

        let inserted = self
            .conn()
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO intake_records ({RECORD_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
                ),
                params![
                    record.id.to_string(),
                    record.session_id.clone(),
                    record.locale.as_str(),
                    record.first_name.clone(),
                    record.last_name.clone(),
                    record.phone.clone(),
                    record.email.clone(),
                    record.date_of_birth.clone(),
                    record.location.clone(),
                    record.insurance.clone(),
                    record.issue_category.clone(),
                    record.branch.as_str(),
                    details,
                    record.more_info.clone(),
                    record.notes.clone(),
                    i64::from(record.lead_score),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_record: {e}")))?;

        if inserted == 0 {
            debug!(record_id = %record.id, "Record already stored");
        }
        Ok(record.id)
    }

    async fn get_record(&self, id: Uuid) -> Result<Option<IntakeRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM intake_records WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_record: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let record = row_to_record(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_record row parse: {e}")))?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_record: {e}"))),
        }
    }

    async fn list_records(&self) -> Result<Vec<IntakeRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM intake_records ORDER BY created_at DESC, rowid DESC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_records: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_record(&row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping record row: {e}");
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::model::{Session, field};

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_record(session_id: &str, score: u32) -> IntakeRecord {
        let mut s = Session::new(session_id, Locale::En);
        s.branch = Branch::Swelling;
        s.set_field(field::ISSUE_CATEGORY, "Swelling / infection");
        s.set_field(field::FEVER, "Yes");
        s.set_field(field::FIRST_NAME, "Lina");
        s.set_field(field::LAST_NAME, "Nasser");
        s.set_field(field::PHONE, "0501112222");
        s.set_field(field::MORE_INFO, "");
        IntakeRecord::from_session(&s, score)
    }

    #[tokio::test]
    async fn insert_and_get_by_id() {
        let db = test_db().await;
        let record = make_record("s-1", 50);

        let id = db.insert_record(&record).await.unwrap();
        assert_eq!(id, record.id);

        let fetched = db.get_record(id).await.unwrap().unwrap();
        assert_eq!(fetched.session_id, "s-1");
        assert_eq!(fetched.branch, Branch::Swelling);
        assert_eq!(fetched.lead_score, 50);
        assert_eq!(fetched.details.get(field::FEVER).map(String::as_str), Some("Yes"));
        assert!(fetched.email.is_none());
    }

    #[tokio::test]
    async fn get_by_id_not_found() {
        let db = test_db().await;
        assert!(db.get_record(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_id() {
        let db = test_db().await;
        let record = make_record("s-1", 50);
        db.insert_record(&record).await.unwrap();
        db.insert_record(&record).await.unwrap();
        assert_eq!(db.list_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let db = test_db().await;
        let mut older = make_record("old", 10);
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        let newer = make_record("new", 20);

        db.insert_record(&older).await.unwrap();
        db.insert_record(&newer).await.unwrap();

        let ids: Vec<String> = db
            .list_records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.session_id)
            .collect();
        assert_eq!(ids, vec!["new".to_string(), "old".to_string()]);
    }

    #[tokio::test]
    async fn extended_identity_round_trips() {
        let db = test_db().await;
        let mut record = make_record("s-2", 0);
        record.email = Some("lina@example.com".into());
        record.insurance = Some("Bupa".into());
        db.insert_record(&record).await.unwrap();

        let fetched = db.get_record(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.email.as_deref(), Some("lina@example.com"));
        assert_eq!(fetched.insurance.as_deref(), Some("Bupa"));
        assert!(fetched.location.is_none());
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("intake.db");
        let record = make_record("s-3", 5);
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.insert_record(&record).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(db.get_record(record.id).await.unwrap().is_some());
    }
}
