//! Crucible Core
//!
//! Core domain types, traits, and error handling for Crucible.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates: actions and the command contract, container
//! environments, execution plans, builders, build requests, workers, and
//! branch classification.

pub mod action;
pub mod branch;
pub mod builder;
pub mod container;
pub mod error;
pub mod ids;
pub mod plan;
pub mod ports;
pub mod request;
pub mod worker;

pub use error::{Error, Result};
pub use ids::*;
