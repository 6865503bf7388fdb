//! Dental intake assistant: a conversational intake service for a dental clinic.

pub mod admin;
pub mod config;
pub mod error;
pub mod intake;
pub mod llm;
pub mod session;
pub mod store;
