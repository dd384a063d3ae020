//! # MarketLens Analytics Engine
//!
//! This crate turns a daily close series into the numbers and charts of an
//! analysis report.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of external systems.
//!   It depends only on `core-types` (Layer 0).
//! - **Stateless Calculation:** The `AnalyticsEngine` is a stateless calculator. It takes
//!   a chronological price series as input and produces an `AnalyticsSummary` and a
//!   `ChartSeries` as output. This makes it deterministic and easy to test.
//! - **Short Histories Are Not Errors:** Indicators that need a warm-up window return
//!   empty series when the history is too short. Only an empty or corrupt price list
//!   is rejected.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: validates the input and assembles the report pieces.
//! - `indicators`: the individual formulas (returns, drawdown, volatility, RSI).
//! - `AnalyticsSummary` / `ChartSeries`: the standardized output structs.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod indicators;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use report::{AnalyticsSummary, ChartSeries, SeriesPoint};
