//! # MarketLens Database Crate
//!
//! This crate holds the two persistent halves of an analysis job: the small,
//! frequently polled job metadata record and the larger, write-once result
//! document.
//!
//! ## Architectural Principles
//!
//! - **Layer 3 Adapter:** This crate encapsulates all storage-specific logic. The
//!   rest of the application talks to the `JobStore` and `ResultStore` traits and
//!   never sees SQL.
//! - **Split Stores:** Status polling reads only job metadata. The result payload
//!   is loaded only when a client asks for it.
//! - **Atomic Transitions:** Every job mutation is a single conditional write
//!   against a `RUNNING` job, so a terminal job can never be modified.
//! - **Two Backends:** `DbRepository` implements both traits over a PostgreSQL
//!   pool with embedded migrations. `InMemoryJobStore` and `InMemoryResultStore`
//!   implement the same contract in process for the CLI and tests.
//!
//! ## Public API
//!
//! - `connect`: Establishes the connection pool from `DatabaseSettings`.
//! - `run_migrations`: Applies the embedded migrations.
//! - `JobStore` / `ResultStore`: The store contracts.
//! - `DbRepository`: The PostgreSQL implementation of both stores.
//! - `InMemoryJobStore` / `InMemoryResultStore`: The process-local implementations.
//! - `AnalysisResult`: The stored output of a completed job.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::{InMemoryJobStore, InMemoryResultStore};
pub use models::AnalysisResult;
pub use repository::DbRepository;
pub use store::{JobStore, ResultStore};
