//! # Classbook Database Crate
//!
//! This crate acts as a high-level, application-specific interface to the
//! PostgreSQL database that holds the class journal: accounts, journals,
//! lessons, assignments, marks and everything hanging off them.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL lives here. Callers see typed rows and typed errors.
//! - **Asynchronous & Pooled:** Every operation borrows a connection from a
//!   shared `PgPool` and gives it back on every exit path.
//! - **Bounded:** Every SQL call runs under a [`Deadline`]; expiry surfaces as
//!   [`DbError::Timeout`].
//!
//! ## Public API
//!
//! - `connect` / `connect_lazy`: build the connection pool from configuration.
//! - `run_migrations`: apply the embedded schema migrations.
//! - `Models`: the registry of repositories handed to the web layer.
//! - `DbError`: the error type returned by every repository method.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod deadline;
pub mod error;
pub mod password;
pub mod repository;
pub mod token;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_lazy, run_migrations};
pub use deadline::Deadline;
pub use error::DbError;
pub use repository::Models;
