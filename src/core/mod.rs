//! Pure, deterministic workflow logic. No I/O lives here.

pub mod alignment;
pub mod budget;
pub mod classifier;
pub mod transcript;
pub mod types;
