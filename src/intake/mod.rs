//! Conversational intake: a branching questionnaire that ends in one
//! scored, persisted record per completed conversation.
//!
//! Layers, bottom up:
//! - `model`, `prompts`: data types and localized strings
//! - `flow`: which question belongs to which `(branch, step)`
//! - `classify`, `scoring`: pure answer canonicalisation and lead scoring
//! - `router`: the pure per-message step transition
//! - `engine`: per-session serialization, session storage, persistence
//! - `routes`: the HTTP surface

pub mod classify;
pub mod engine;
pub mod flow;
pub mod model;
pub mod prompts;
pub mod router;
pub mod routes;
pub mod scoring;

pub use engine::{IntakeEngine, spawn_eviction_task};
pub use flow::FlowConfig;
pub use model::{Branch, IntakeRecord, Locale, Reply, Session};
pub use routes::{AppState, intake_routes};
