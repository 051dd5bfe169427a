//! Side-effecting adapters: files, configuration, and external collaborator
//! processes. Each collaborator sits behind a trait so the workflow can be
//! driven by scripted doubles in tests.

pub mod artifact;
pub mod config;
pub mod evaluator;
pub mod generator;
pub mod process;
pub mod runner;
pub mod syntax;
