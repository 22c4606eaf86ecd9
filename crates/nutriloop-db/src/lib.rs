//! SQLite persistence for nutriloop.
//!
//! Provides the connection pool, embedded migrations, row models for
//! consultations and their workflow events, and the query functions the
//! orchestrator and CLI use.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
