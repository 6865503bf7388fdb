//! Intake engine: serializes messages per session, runs the router, and
//! owns the single point where a completed record is persisted.
//!
//! The per-session gate covers reading and writing session state. The
//! database insert runs outside it; messages that arrive meanwhile get a
//! "saving" reply.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::flow::FlowConfig;
use super::model::{IntakeRecord, Locale, Reply, Session, field};
use super::prompts;
use super::router::{self, Transition};
use super::scoring::lead_score;
use crate::error::IntakeError;
use crate::session::SessionStore;
use crate::store::Database;

type Gate = Arc<Mutex<()>>;

/// Conversation engine shared by all request handlers.
pub struct IntakeEngine {
    sessions: Arc<dyn SessionStore>,
    db: Arc<dyn Database>,
    flow: FlowConfig,
    /// One gate per session with a transition in flight or recently run.
    /// The map lock is only held to look up or prune entries.
    gates: Mutex<HashMap<String, Gate>>,
    /// Sessions whose record is being written. The gate is not held while
    /// the database call is awaited.
    saving: Mutex<HashSet<String>>,
}

impl IntakeEngine {
    pub fn new(sessions: Arc<dyn SessionStore>, db: Arc<dyn Database>, flow: FlowConfig) -> Self {
        Self {
            sessions,
            db,
            flow,
            gates: Mutex::new(HashMap::new()),
            saving: Mutex::new(HashSet::new()),
        }
    }

    pub fn flow(&self) -> &FlowConfig {
        &self.flow
    }

    /// Process one inbound message and return the reply to send.
    ///
    /// `locale` only matters when the message creates the session.
    pub async fn advance(
        &self,
        session_id: &str,
        message: &str,
        locale: Option<Locale>,
    ) -> Result<Reply, IntakeError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(IntakeError::MissingSession);
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(IntakeError::EmptyInput);
        }

        let gate = self.gate(session_id).await;
        let guard = gate.lock().await;

        let mut session = match self.sessions.get(session_id).await? {
            Some(session) => session,
            None => {
                let locale = self.flow.session_locale(locale);
                debug!(session_id = %session_id, locale = %locale, "New session");
                Session::new(session_id, locale)
            }
        };

        if self.saving.lock().await.contains(session_id) {
            debug!(session_id = %session_id, "Record save in flight");
            return Ok(Reply::text(prompts::saving(session.locale)));
        }

        match router::advance(&mut session, message, &self.flow) {
            Transition::Prompt(reply) => {
                session.touch();
                debug!(
                    session_id = %session_id,
                    step = session.step,
                    branch = %session.branch,
                    "Session advanced"
                );
                self.sessions.put(session).await?;
                Ok(reply)
            }
            Transition::Restart(reply) => Ok(reply),
            Transition::Finalize => {
                session.touch();
                let record = self.prepare_record(&mut session).await;
                self.saving.lock().await.insert(session_id.to_string());
                drop(guard);

                let result = self.finalize(&session, &record).await;

                let guard = gate.lock().await;
                self.saving.lock().await.remove(session_id);
                if result.is_ok() {
                    if let Err(e) = self.sessions.delete(session_id).await {
                        warn!(session_id = %session_id, error = %e, "Failed to drop completed session");
                    }
                }
                drop(guard);
                if result.is_ok() {
                    self.release_gate(session_id, &gate).await;
                }
                result
            }
        }
    }

    /// Reserve the record id and park the session at its terminal step, so
    /// the save can run without the gate and a failed save can be retried.
    async fn prepare_record(&self, session: &mut Session) -> IntakeRecord {
        let score = lead_score(session.branch, &session.fields);
        session.record_id.get_or_insert_with(Uuid::new_v4);
        if let Err(e) = self.sessions.put(session.clone()).await {
            warn!(session_id = %session.session_id, error = %e, "Failed to store session before save");
        }
        IntakeRecord::from_session(session, score)
    }

    /// The single point where a completed record is written. On failure the
    /// session stays at its terminal step with every answer intact.
    async fn finalize(
        &self,
        session: &Session,
        record: &IntakeRecord,
    ) -> Result<Reply, IntakeError> {
        match self.db.insert_record(record).await {
            Ok(record_id) => {
                info!(
                    session_id = %session.session_id,
                    record_id = %record_id,
                    branch = %record.branch,
                    lead_score = record.lead_score,
                    "Intake record saved"
                );
                let first_name = session.field(field::FIRST_NAME).unwrap_or_default();
                Ok(Reply::text(prompts::thank_you(session.locale, first_name)).finished())
            }
            Err(source) => {
                warn!(
                    session_id = %session.session_id,
                    step = session.step,
                    error = %source,
                    "Failed to save intake record, will retry on next message"
                );
                Err(IntakeError::PersistenceFailed {
                    session_id: session.session_id.clone(),
                    source,
                })
            }
        }
    }

    /// Drop sessions idle longer than `ttl`. Sessions with a transition in
    /// flight are skipped. Returns the number evicted.
    pub async fn evict_idle(&self, ttl: Duration) -> Result<usize, IntakeError> {
        let candidates = self.sessions.expired(ttl).await?;
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return Ok(0);
        };
        let mut evicted = 0;

        for session_id in candidates {
            let gate = self.gate(&session_id).await;
            let Ok(guard) = gate.try_lock() else {
                continue;
            };
            if self.saving.lock().await.contains(&session_id) {
                continue;
            }
            // Re-check under the gate; a message may have landed since the scan.
            let still_idle = match self.sessions.get(&session_id).await? {
                Some(session) => session.last_activity < cutoff,
                None => false,
            };
            if still_idle && self.sessions.delete(&session_id).await? {
                debug!(session_id = %session_id, "Evicted idle session");
                evicted += 1;
            }
            drop(guard);
            self.release_gate(&session_id, &gate).await;
        }

        if evicted > 0 {
            info!(count = evicted, "Evicted idle sessions");
        }
        Ok(evicted)
    }

    /// Number of sessions currently held.
    pub async fn active_sessions(&self) -> Result<usize, IntakeError> {
        Ok(self.sessions.len().await?)
    }

    async fn gate(&self, session_id: &str) -> Gate {
        let mut gates = self.gates.lock().await;
        gates
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget a gate nobody else is holding or waiting on.
    async fn release_gate(&self, session_id: &str, gate: &Gate) {
        let mut gates = self.gates.lock().await;
        // One reference in the map, one held by the caller.
        if Arc::strong_count(gate) <= 2 {
            gates.remove(session_id);
        }
    }

    #[cfg(test)]
    async fn gate_count(&self) -> usize {
        self.gates.lock().await.len()
    }
}

/// Spawn a background task that periodically evicts idle sessions.
pub fn spawn_eviction_task(
    engine: Arc<IntakeEngine>,
    interval: Duration,
    ttl: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.evict_idle(ttl).await {
                warn!(error = %e, "Session eviction failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::{DatabaseError, SessionError};
    use crate::intake::model::Branch;
    use crate::session::MemorySessionStore;
    use crate::store::LibSqlBackend;

    /// Records every insert and can be switched to fail or slowed down.
    #[derive(Default)]
    struct RecordingDb {
        inserts: AtomicUsize,
        fail: AtomicBool,
        delay: Option<Duration>,
        records: Mutex<Vec<IntakeRecord>>,
    }

    #[async_trait]
    impl Database for RecordingDb {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn insert_record(&self, record: &IntakeRecord) -> Result<Uuid, DatabaseError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(DatabaseError::Query("disk full".to_string()));
            }
            self.records.lock().await.push(record.clone());
            Ok(record.id)
        }

        async fn get_record(&self, id: Uuid) -> Result<Option<IntakeRecord>, DatabaseError> {
            Ok(self.records.lock().await.iter().find(|r| r.id == id).cloned())
        }

        async fn list_records(&self) -> Result<Vec<IntakeRecord>, DatabaseError> {
            Ok(self.records.lock().await.clone())
        }
    }

    /// Memory store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakySessions {
        inner: MemorySessionStore,
        fail_puts: AtomicBool,
    }

    #[async_trait]
    impl SessionStore for FlakySessions {
        async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
            self.inner.get(id).await
        }

        async fn put(&self, session: Session) -> Result<(), SessionError> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(SessionError::Unavailable("store offline".to_string()));
            }
            self.inner.put(session).await
        }

        async fn delete(&self, id: &str) -> Result<bool, SessionError> {
            self.inner.delete(id).await
        }

        async fn expired(&self, idle: Duration) -> Result<Vec<String>, SessionError> {
            self.inner.expired(idle).await
        }

        async fn len(&self) -> Result<usize, SessionError> {
            self.inner.len().await
        }
    }

    const PAIN_CONVERSATION: &[&str] = &[
        "hi",
        "Tooth pain / sensitivity",
        "Left",
        "Upper",
        "8",
        "Maya",
        "Haddad",
        "0551234567",
        "No",
    ];

    fn engine_with(db: Arc<dyn Database>) -> (IntakeEngine, Arc<MemorySessionStore>) {
        let sessions = Arc::new(MemorySessionStore::new());
        let engine = IntakeEngine::new(sessions.clone(), db, FlowConfig::default());
        (engine, sessions)
    }

    async fn run(engine: &IntakeEngine, id: &str, messages: &[&str]) -> Vec<Reply> {
        let mut replies = Vec::new();
        for m in messages {
            replies.push(engine.advance(id, m, None).await.unwrap());
        }
        replies
    }

    #[tokio::test]
    async fn pain_conversation_saves_exactly_once() {
        let db = Arc::new(RecordingDb::default());
        let (engine, sessions) = engine_with(db.clone());

        let replies = run(&engine, "s-1", PAIN_CONVERSATION).await;
        let last = replies.last().unwrap();
        assert!(last.done);
        assert!(last.reply.contains("Maya"));
        assert!(replies[..replies.len() - 1].iter().all(|r| !r.done));

        assert_eq!(db.inserts.load(Ordering::SeqCst), 1);
        let records = db.list_records().await.unwrap();
        assert_eq!(records[0].branch, Branch::Pain);
        assert!(records[0].lead_score >= 20);
        assert_eq!(records[0].more_info, "");
        assert!(sessions.get("s-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn category_reply_lists_side_options() {
        let (engine, _) = engine_with(Arc::new(RecordingDb::default()));
        let replies = run(&engine, "s", &["hello", "Tooth pain / sensitivity"]).await;
        assert_eq!(replies[0].options.as_ref().map(Vec::len), Some(5));
        assert_eq!(replies[1].options.as_ref().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn empty_input_and_missing_session_are_rejected() {
        let (engine, sessions) = engine_with(Arc::new(RecordingDb::default()));
        assert!(matches!(
            engine.advance("  ", "hi", None).await,
            Err(IntakeError::MissingSession)
        ));
        assert!(matches!(
            engine.advance("s", "   ", None).await,
            Err(IntakeError::EmptyInput)
        ));
        // Nothing was created for the empty message.
        assert!(sessions.get("s").await.unwrap().is_none());

        run(&engine, "s", &["hi"]).await;
        assert!(matches!(
            engine.advance("s", "", None).await,
            Err(IntakeError::EmptyInput)
        ));
        assert_eq!(sessions.get("s").await.unwrap().unwrap().step, 2);
    }

    #[tokio::test]
    async fn failed_save_keeps_session_and_retries_without_reasking() {
        let db = Arc::new(RecordingDb::default());
        db.fail.store(true, Ordering::SeqCst);
        let (engine, sessions) = engine_with(db.clone());

        run(&engine, "s-2", &PAIN_CONVERSATION[..PAIN_CONVERSATION.len() - 1]).await;
        let err = engine.advance("s-2", "No", None).await.unwrap_err();
        assert!(matches!(err, IntakeError::PersistenceFailed { .. }));

        let kept = sessions.get("s-2").await.unwrap().unwrap();
        assert_eq!(kept.field(field::FIRST_NAME), Some("Maya"));
        let reserved = kept.record_id;
        assert!(reserved.is_some());

        db.fail.store(false, Ordering::SeqCst);
        let reply = engine.advance("s-2", "hello?", None).await.unwrap();
        assert!(reply.done);
        assert_eq!(db.inserts.load(Ordering::SeqCst), 2);

        let records = db.list_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(Some(records[0].id), reserved);
    }

    #[tokio::test]
    async fn failed_save_reports_persistence_even_if_session_write_fails() {
        let db = Arc::new(RecordingDb::default());
        let sessions = Arc::new(FlakySessions::default());
        let engine = IntakeEngine::new(sessions.clone(), db.clone(), FlowConfig::default());

        run(&engine, "s-5", &PAIN_CONVERSATION[..PAIN_CONVERSATION.len() - 1]).await;
        db.fail.store(true, Ordering::SeqCst);
        sessions.fail_puts.store(true, Ordering::SeqCst);

        let err = engine.advance("s-5", "No", None).await.unwrap_err();
        assert!(matches!(err, IntakeError::PersistenceFailed { .. }));
        assert_eq!(db.inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn save_does_not_hold_the_session_gate() {
        let db = Arc::new(RecordingDb {
            delay: Some(Duration::from_millis(400)),
            ..RecordingDb::default()
        });
        let (engine, sessions) = engine_with(db.clone());
        let engine = Arc::new(engine);
        run(&engine, "slow", &PAIN_CONVERSATION[..PAIN_CONVERSATION.len() - 1]).await;

        let finishing = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.advance("slow", "No", None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = tokio::time::Instant::now();
        let reply = engine.advance("slow", "hello?", None).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(reply.reply, prompts::saving(Locale::En));
        assert!(!reply.done);

        let last = finishing.await.unwrap().unwrap();
        assert!(last.done);
        assert_eq!(db.inserts.load(Ordering::SeqCst), 1);
        assert!(sessions.get("slow").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extended_identity_answers_land_in_record() {
        let db = Arc::new(RecordingDb::default());
        let flow = FlowConfig {
            extended_identity: true,
            ..FlowConfig::default()
        };
        let engine = IntakeEngine::new(Arc::new(MemorySessionStore::new()), db.clone(), flow);

        let replies = run(
            &engine,
            "ext-1",
            &[
                "hi",
                "swollen gums",
                "Gum",
                "Yes",
                "Less than 24 hours",
                "Lina",
                "Saleh",
                "0551112222",
                "l@x.io",
                "1990-04-12",
                "Riyadh",
                "Bupa",
                "No",
            ],
        )
        .await;
        assert_eq!(replies[7].reply, prompts::EMAIL.prompt.en);
        assert_eq!(replies[10].reply, prompts::INSURANCE.prompt.en);
        assert!(replies.last().unwrap().done);

        let records = db.list_records().await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.branch, Branch::Swelling);
        assert_eq!(record.email.as_deref(), Some("l@x.io"));
        assert_eq!(record.date_of_birth.as_deref(), Some("1990-04-12"));
        assert_eq!(record.location.as_deref(), Some("Riyadh"));
        assert_eq!(record.insurance.as_deref(), Some("Bupa"));
        assert_eq!(record.lead_score, 50);
    }

    #[tokio::test]
    async fn completed_session_id_starts_fresh() {
        let (engine, _) = engine_with(Arc::new(RecordingDb::default()));
        run(&engine, "s-3", PAIN_CONVERSATION).await;

        let reply = engine.advance("s-3", "hi again", None).await.unwrap();
        assert_eq!(reply.reply, prompts::CATEGORY.prompt.en);
        assert!(!reply.done);
        assert_eq!(engine.gate_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_messages_on_one_session_are_serialized() {
        let (engine, sessions) = engine_with(Arc::new(RecordingDb::default()));
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.advance("busy", "routine cleaning", None).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // Greeting, category, last visit: one step each, none lost.
        let session = sessions.get("busy").await.unwrap().unwrap();
        assert_eq!(session.step, 4);
        assert_eq!(session.branch, Branch::Routine);
        assert_eq!(session.field(field::LAST_VISIT), Some("routine cleaning"));
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let (engine, sessions) = engine_with(Arc::new(RecordingDb::default()));
        run(&engine, "a", &["hi", "my tooth is broken"]).await;
        run(&engine, "b", &["hi", "swollen gums"]).await;

        assert_eq!(sessions.get("a").await.unwrap().unwrap().branch, Branch::Broken);
        assert_eq!(sessions.get("b").await.unwrap().unwrap().branch, Branch::Swelling);
    }

    #[tokio::test]
    async fn bilingual_session_keeps_requested_locale() {
        let sessions = Arc::new(MemorySessionStore::new());
        let flow = FlowConfig {
            bilingual: true,
            ..FlowConfig::default()
        };
        let engine = IntakeEngine::new(sessions.clone(), Arc::new(RecordingDb::default()), flow);

        let reply = engine.advance("ar-1", "مرحبا", Some(Locale::Ar)).await.unwrap();
        assert_eq!(reply.reply, prompts::CATEGORY.prompt.ar);
        // The locale is fixed at creation.
        let reply = engine.advance("ar-1", "عندي ألم", Some(Locale::En)).await.unwrap();
        assert_eq!(reply.reply, prompts::PAIN_SIDE.prompt.ar);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let (engine, sessions) = engine_with(Arc::new(RecordingDb::default()));
        run(&engine, "fresh", &["hi"]).await;

        let mut stale = Session::new("stale", Locale::En);
        stale.last_activity = Utc::now() - chrono::Duration::hours(1);
        sessions.put(stale).await.unwrap();

        let evicted = engine.evict_idle(Duration::from_secs(30 * 60)).await.unwrap();
        assert_eq!(evicted, 1);
        assert!(sessions.get("stale").await.unwrap().is_none());
        assert!(sessions.get("fresh").await.unwrap().is_some());
        assert_eq!(engine.active_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn saves_to_libsql_backend() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let (engine, _) = engine_with(db.clone());
        run(&engine, "s-4", PAIN_CONVERSATION).await;

        let records = db.list_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first_name, "Maya");
        assert_eq!(records[0].details.get(field::PAIN_SCALE).map(String::as_str), Some("8"));
    }
}
