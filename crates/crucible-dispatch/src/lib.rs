//! Crucible Dispatch
//!
//! Decides which pending build may start on which worker and in what
//! order: the per-dispatch admission test, the priority selection over
//! pending requests, the host-scoped resource-lock overlay, and builder
//! registration binding it all together.

pub mod admission;
pub mod locks;
pub mod priority;
pub mod registry;
pub mod scheduler;

pub use admission::can_start_build;
pub use priority::next_build;
pub use registry::{DispatchConfig, RuntimeEnv, register};
pub use scheduler::{Dispatch, Dispatcher};
