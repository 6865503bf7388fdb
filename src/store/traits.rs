//! `Database` trait: single async interface for completed intake records.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::intake::model::IntakeRecord;

/// Backend-agnostic record storage.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Intake records ──────────────────────────────────────────────

    /// Persist a completed record. Inserting the same record id twice is a
    /// no-op, so a retried save never duplicates.
    async fn insert_record(&self, record: &IntakeRecord) -> Result<Uuid, DatabaseError>;

    /// Get a record by id.
    async fn get_record(&self, id: Uuid) -> Result<Option<IntakeRecord>, DatabaseError>;

    /// All records, newest first.
    async fn list_records(&self) -> Result<Vec<IntakeRecord>, DatabaseError>;
}
