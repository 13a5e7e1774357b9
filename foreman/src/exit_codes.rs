//! Stable exit codes for foreman CLI commands.

/// Command succeeded; for `run`, the loop paused or completed cleanly.
pub const OK: i32 = 0;
/// Command failed: invalid plan/config/arguments or an agent error.
pub const INVALID: i32 = 1;
/// `validate` found structural problems in the plan.
pub const PLAN_INVALID: i32 = 2;
/// `run`/`resume` paused waiting on a human (questions, decision, review).
pub const NEEDS_HUMAN: i32 = 3;
