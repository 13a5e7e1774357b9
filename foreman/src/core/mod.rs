//! Pure, deterministic plan logic: validation, mutation, patching, readiness.
//!
//! Nothing in this module performs I/O; all state comes in as arguments
//! (including `now`), which keeps every rule testable in isolation.

pub mod mutate;
pub mod patch;
pub mod ready;
pub mod validate;
