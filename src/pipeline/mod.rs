//! Well data pipeline.
//!
//! ```text
//! walker (+ readings) → aggregate → upsert
//! ```
//!
//! `runner` strings the stages together through their CSV artifacts.

pub mod readings;
pub mod walker;
pub mod aggregate;
pub mod upsert;
pub mod runner;
