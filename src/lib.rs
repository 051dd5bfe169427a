//! Bounded generate-validate-promote orchestration for remediation plans.
//!
//! A plan artifact is produced by an external generator, pushed through an
//! ordered chain of validation gates on each staging environment in turn,
//! and finally promoted to a target environment. Failed gates feed their
//! diagnostics back into regeneration, bounded by a per-environment retry
//! budget. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, transcript
//!   analysis, status alignment, budgets). No I/O, fully testable in
//!   isolation.
//! - **[`io`]**: Side-effecting operations (plan storage, configuration,
//!   collaborator processes). Each collaborator sits behind a trait so tests
//!   can script it.
//!
//! Orchestration modules ([`gates`], [`workflow`]) coordinate core logic with
//! I/O to implement the state machine.

pub mod core;
pub mod exit_codes;
pub mod gates;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
