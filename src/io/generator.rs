//! Plan generation through an external generator command.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, warn};

use crate::io::process::{command_from_vec, run_with_timeout};

/// Everything the generator needs to produce (or repair) a plan.
///
/// Serialized as JSON on the generator's stdin. `feedback` carries the most
/// recent failing gate's diagnostic; `previous_plan` is present on retries so
/// the generator can repair instead of starting over.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationRequest {
    pub objective: String,
    pub requirements: Vec<String>,
    pub environment: String,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Produces plan text from a generation request.
pub trait Generator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String>;
}

/// Generator backed by a configured command. The request goes to stdin as
/// JSON; the plan comes back on stdout.
pub struct CommandGenerator {
    command: Vec<String>,
    timeout: Duration,
    /// Nested retries for timeouts only. Other failures surface immediately;
    /// they are not transient.
    retries: u32,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn new(
        command: Vec<String>,
        timeout: Duration,
        retries: u32,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            command,
            timeout,
            retries: retries.max(1),
            output_limit_bytes,
        }
    }
}

impl Generator for CommandGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String> {
        let input = serde_json::to_vec(request).context("serialize generation request")?;

        for round in 1..=self.retries {
            let cmd = command_from_vec(&self.command)?;
            info!(attempt = request.attempt, round, "invoking generator");
            let output = run_with_timeout(
                cmd,
                Some(&input),
                self.timeout,
                self.output_limit_bytes,
            )
            .context("run generator")?;

            if output.timed_out {
                warn!(round, max_rounds = self.retries, "generator timed out");
                continue;
            }
            if !output.status.success() {
                return Err(anyhow!(
                    "generator exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                ));
            }
            let plan = output.stdout_lossy();
            if plan.trim().is_empty() {
                return Err(anyhow!("generator produced an empty plan"));
            }
            return Ok(plan);
        }

        Err(anyhow!(
            "generator timed out on all {} rounds",
            self.retries
        ))
    }
}
