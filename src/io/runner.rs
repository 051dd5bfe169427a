//! Remote execution of the plan against an environment.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::io::process::{command_from_vec, run_with_timeout};

/// Raw result of one plan execution. Interpretation (connectivity detection,
/// bug scanning, recap parsing) happens in the execution gate; this adapter
/// only captures what the runner did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub exit_code: Option<i32>,
    pub transcript: String,
    pub timed_out: bool,
}

/// Executes a plan file against a named environment.
pub trait PlanRunner {
    fn run(&mut self, plan_path: &Path, environment: &str) -> Result<ExecutionReport>;
}

/// Runner backed by a configured command, invoked as
/// `<command...> <environment> <plan_path>`.
pub struct CommandPlanRunner {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandPlanRunner {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }
}

impl PlanRunner for CommandPlanRunner {
    fn run(&mut self, plan_path: &Path, environment: &str) -> Result<ExecutionReport> {
        let mut cmd = command_from_vec(&self.command)?;
        cmd.arg(environment).arg(plan_path);
        info!(environment, plan = %plan_path.display(), "executing plan");
        let output = run_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)
            .context("run plan")?;

        let mut transcript = output.combined_lossy();
        if output.timed_out {
            transcript.push_str(&format!(
                "\n[execution timed out after {}s]",
                self.timeout.as_secs()
            ));
        }
        Ok(ExecutionReport {
            exit_code: output.status.code(),
            transcript,
            timed_out: output.timed_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_receives_environment_and_path() {
        let mut runner = CommandPlanRunner::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo \"env=$1 plan=$2\"".to_string(),
                "runner".to_string(),
            ],
            Duration::from_secs(5),
            10_000,
        );
        let report = runner
            .run(Path::new("plan.txt"), "staging-a")
            .expect("run");
        assert_eq!(report.exit_code, Some(0));
        assert!(report.transcript.contains("env=staging-a"));
        assert!(report.transcript.contains("plan=plan.txt"));
    }

    #[test]
    fn exit_code_and_transcript_captured_on_failure() {
        let mut runner = CommandPlanRunner::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo 'fatal: [env]: FAILED!'; exit 2".to_string(),
            ],
            Duration::from_secs(5),
            10_000,
        );
        let report = runner.run(Path::new("plan.txt"), "env").expect("run");
        assert_eq!(report.exit_code, Some(2));
        assert!(report.transcript.contains("FAILED!"));
    }

    #[test]
    fn timeout_flagged_in_report() {
        let mut runner = CommandPlanRunner::new(
            vec!["sh".to_string(), "-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(50),
            10_000,
        );
        let report = runner.run(Path::new("plan.txt"), "env").expect("run");
        assert!(report.timed_out);
        assert!(report.transcript.contains("timed out"));
    }
}
