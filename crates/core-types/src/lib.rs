//! # MarketLens Core Types
//!
//! The shared vocabulary of the analysis pipeline. Every other crate in the
//! workspace speaks in terms of these types.
//!
//! As a Layer 0 crate it has no knowledge of storage, HTTP or the market data
//! provider. It owns two things:
//!
//! - **Input validation:** `Symbol` and `AnalysisRange` can only be constructed
//!   from validated input, so a value of either type is always well-formed.
//! - **The job state machine:** `Job` enforces `RUNNING -> COMPLETED | FAILED`,
//!   monotonic progress and write-once terminal states.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AnalysisRange, JobStatus};
pub use error::CoreError;
pub use structs::{Job, PricePoint, Symbol};
