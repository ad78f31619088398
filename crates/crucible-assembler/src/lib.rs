//! Crucible Assembler
//!
//! Turns a builder's logical action sequences into a provisioned execution
//! plan: container fetch/tag/checkpoint/cleanup and workspace creation
//! around the active actions, expressed as an ordered list of independent,
//! pure passes over an immutable plan-builder value.

pub mod flags;
pub mod infra;
pub mod materialize;
pub mod passes;

pub use materialize::{materialize, render};
pub use passes::{PlanBuilder, assemble};
