//! Deterministic syntax checking of the plan file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::io::process::{command_from_vec, run_with_timeout};

/// Outcome of a syntax check. Diagnostics are the raw checker output, which
/// doubles as repair advice for the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxOutcome {
    pub passed: bool,
    pub diagnostics: String,
}

/// Checks a plan file for well-formedness without executing it. The
/// environment is for connection-shape checks only; nothing runs remotely.
pub trait SyntaxChecker {
    fn check(&mut self, plan_path: &Path, environment: &str) -> Result<SyntaxOutcome>;
}

/// Syntax checker backed by a configured command, invoked as
/// `<command...> <environment> <plan_path>`; a zero exit means the plan
/// parsed.
pub struct CommandSyntaxChecker {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandSyntaxChecker {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }
}

impl SyntaxChecker for CommandSyntaxChecker {
    fn check(&mut self, plan_path: &Path, environment: &str) -> Result<SyntaxOutcome> {
        let mut cmd = command_from_vec(&self.command)?;
        cmd.arg(environment).arg(plan_path);
        info!(plan = %plan_path.display(), environment, "running syntax check");
        let output = run_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)
            .context("run syntax checker")?;

        if output.timed_out {
            return Ok(SyntaxOutcome {
                passed: false,
                diagnostics: format!(
                    "syntax check timed out after {}s",
                    self.timeout.as_secs()
                ),
            });
        }
        Ok(SyntaxOutcome {
            passed: output.status.success(),
            diagnostics: output.combined_lossy(),
        })
    }
}
