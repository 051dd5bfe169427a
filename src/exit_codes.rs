//! Stable exit codes for the planforge CLI.

/// The workflow completed every requested stage.
pub const OK: i32 = 0;
/// Invalid CLI arguments, configuration, or an internal failure.
pub const INVALID: i32 = 1;
/// Validation did not converge within the retry budget, or promotion failed.
pub const EXHAUSTED: i32 = 2;
/// An environment was unreachable; the run stopped without retrying.
pub const UNREACHABLE: i32 = 3;
