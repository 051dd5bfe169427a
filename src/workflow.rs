//! The bounded generate-validate-promote state machine.
//!
//! One plan artifact moves through an ordered list of staging environments.
//! On each environment the plan must clear the full gate chain within a
//! bounded number of generate-validate cycles; advancing to the next
//! environment resets the budget but keeps the artifact. Once every staging
//! environment has passed, the plan is promoted to the target in a single
//! shot. The plan file is left on disk on every exit path so a failed run can
//! be inspected or resumed.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::core::budget::RetryBudget;
use crate::core::types::{Feedback, GateKind, GateResult};
use crate::gates::{
    GateContext, execution_gate, output_analysis_gate, structure_gate, syntax_gate,
};
use crate::io::artifact::ArtifactStore;
use crate::io::evaluator::Evaluator;
use crate::io::generator::{GenerationRequest, Generator};
use crate::io::runner::PlanRunner;
use crate::io::syntax::SyntaxChecker;

/// One full workflow invocation.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub objective: String,
    pub requirements: Vec<String>,
    /// Environment the plan is ultimately applied to.
    pub target: String,
    /// Ordered staging environments the plan must clear first.
    pub staging: Vec<String>,
    pub plan_path: PathBuf,
    /// Explicit retry ceiling per environment. When absent, derived from the
    /// requirement count.
    pub max_attempts: Option<u32>,
    pub procedure: Option<String>,
    pub example_output: Option<String>,
    /// Promote an existing, previously validated plan without re-validation.
    pub skip_staging: bool,
    /// Validate only; do not touch the target.
    pub skip_promotion: bool,
}

/// Terminal outcome of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Every requested stage passed.
    Success,
    /// Validation did not converge; `last` is the final failing gate result.
    Exhausted { last: GateResult },
    /// An environment could not be reached. Never retried: regeneration
    /// cannot fix connectivity.
    Unreachable { environment: String, detail: String },
}

/// First failing gate of one cycle.
#[derive(Debug, Clone)]
struct GateFailure {
    gate: GateKind,
    result: GateResult,
    connectivity: bool,
}

impl GateFailure {
    fn new(gate: GateKind, result: GateResult) -> Self {
        Self {
            gate,
            result,
            connectivity: false,
        }
    }
}

/// The state machine, generic over its four collaborators.
pub struct Workflow<'a, G, S, R, E> {
    generator: &'a mut G,
    syntax: &'a mut S,
    runner: &'a mut R,
    evaluator: &'a mut E,
}

impl<'a, G, S, R, E> Workflow<'a, G, S, R, E>
where
    G: Generator,
    S: SyntaxChecker,
    R: PlanRunner,
    E: Evaluator,
{
    pub fn new(
        generator: &'a mut G,
        syntax: &'a mut S,
        runner: &'a mut R,
        evaluator: &'a mut E,
    ) -> Self {
        Self {
            generator,
            syntax,
            runner,
            evaluator,
        }
    }

    pub fn run(&mut self, request: &WorkflowRequest) -> Result<WorkflowOutcome> {
        if request.skip_staging && request.skip_promotion {
            return Err(anyhow!("nothing to do: staging and promotion both skipped"));
        }

        let mut artifact = ArtifactStore::new(&request.plan_path);
        let loaded = artifact.load_existing()?;

        if request.skip_staging {
            if !loaded {
                return Err(anyhow!(
                    "cannot skip staging: no existing plan at {}",
                    request.plan_path.display()
                ));
            }
            info!(target = %request.target, "skipping staging, promoting existing plan");
            return self.promote(&request.target, &artifact);
        }

        // With no staging environments the gate chain runs directly against
        // the target; a separate promotion pass would re-run the same plan.
        let (validation_envs, promote_after) = if request.staging.is_empty() {
            (std::slice::from_ref(&request.target), false)
        } else {
            (request.staging.as_slice(), !request.skip_promotion)
        };

        let mut budget = match request.max_attempts {
            Some(max) => RetryBudget::new(max),
            None => RetryBudget::derived(request.requirements.len()),
        };
        let mut feedback: Option<Feedback> = None;

        for environment in validation_envs {
            budget.reset();
            info!(
                environment = %environment,
                max_attempts = budget.max_attempts(),
                "validating on environment"
            );

            match self.validate_on(request, environment, &mut artifact, &mut budget, &mut feedback)? {
                WorkflowOutcome::Success => {
                    artifact.mark_unmodified();
                }
                terminal => return Ok(terminal),
            }
        }

        if promote_after {
            return self.promote(&request.target, &artifact);
        }
        info!("workflow complete without promotion");
        Ok(WorkflowOutcome::Success)
    }

    /// Run the generate-validate cycle on one environment until the gate
    /// chain passes or the budget runs out.
    fn validate_on(
        &mut self,
        request: &WorkflowRequest,
        environment: &str,
        artifact: &mut ArtifactStore,
        budget: &mut RetryBudget,
        feedback: &mut Option<Feedback>,
    ) -> Result<WorkflowOutcome> {
        loop {
            info!(
                environment,
                attempt = budget.attempt(),
                max_attempts = budget.max_attempts(),
                "starting cycle"
            );

            // A carried-over plan with no pending feedback is reused as-is.
            if artifact.is_empty() || feedback.is_some() {
                let generation = GenerationRequest {
                    objective: request.objective.clone(),
                    requirements: request.requirements.clone(),
                    environment: environment.to_string(),
                    attempt: budget.attempt(),
                    procedure: request.procedure.clone(),
                    example_output: request.example_output.clone(),
                    previous_plan: (!artifact.is_empty())
                        .then(|| artifact.content().to_string()),
                    feedback: feedback.take().map(|f| f.render()),
                };
                let plan = self.generator.generate(&generation)?;
                artifact.replace(plan);
            } else {
                debug!("reusing existing plan, skipping generation");
            }

            artifact.save()?;

            let Some(failure) = self.gate_chain(request, environment, artifact)? else {
                info!(environment, "all gates passed");
                return Ok(WorkflowOutcome::Success);
            };
            let GateFailure {
                gate,
                result,
                connectivity,
            } = failure;

            if connectivity {
                return Ok(WorkflowOutcome::Unreachable {
                    environment: environment.to_string(),
                    detail: result.message,
                });
            }

            warn!(
                environment,
                gate = %gate,
                attempt = budget.attempt(),
                "gate failed: {}",
                result.message
            );

            if !budget.can_retry() {
                warn!(environment, "retry budget exhausted");
                return Ok(WorkflowOutcome::Exhausted { last: result });
            }
            *feedback = Some(Feedback::from_gate(gate, &result));
            budget.increment();
        }
    }

    /// Run the four gates in order; returns the first failure, if any.
    fn gate_chain(
        &mut self,
        request: &WorkflowRequest,
        environment: &str,
        artifact: &ArtifactStore,
    ) -> Result<Option<GateFailure>> {
        let context = GateContext {
            objective: &request.objective,
            requirements: &request.requirements,
            plan: artifact.content(),
            procedure: request.procedure.as_deref(),
        };

        // Syntax and structure judge the plan text, which is unchanged since
        // its last validation when the artifact is clean.
        if artifact.is_modified() {
            let result = syntax_gate(self.syntax, artifact.path(), environment)?;
            if !result.passed {
                return Ok(Some(GateFailure::new(GateKind::Syntax, result)));
            }
            let result = structure_gate(self.evaluator, &context)?;
            if !result.passed {
                return Ok(Some(GateFailure::new(GateKind::Structure, result)));
            }
        } else {
            debug!("plan unchanged, skipping syntax and structure gates");
        }

        let outcome = execution_gate(self.runner, artifact.path(), environment)?;
        if !outcome.result.passed {
            return Ok(Some(GateFailure {
                gate: GateKind::Execution,
                result: outcome.result,
                connectivity: outcome.connectivity_failure,
            }));
        }

        let result = output_analysis_gate(self.evaluator, &context, &outcome.transcript)?;
        if !result.passed {
            return Ok(Some(GateFailure::new(GateKind::OutputAnalysis, result)));
        }
        Ok(None)
    }

    /// Single-shot application to the target. No retry loop: the plan has
    /// already been validated, and a failure here needs human eyes.
    fn promote(&mut self, target: &str, artifact: &ArtifactStore) -> Result<WorkflowOutcome> {
        info!(target, "promoting plan to target");
        let outcome = execution_gate(self.runner, artifact.path(), target)?;
        if outcome.connectivity_failure {
            return Ok(WorkflowOutcome::Unreachable {
                environment: target.to_string(),
                detail: outcome.result.message,
            });
        }
        if !outcome.result.passed {
            return Ok(WorkflowOutcome::Exhausted {
                last: GateResult::fail(
                    format!("promotion to {target} failed: {}", outcome.result.message),
                    outcome.result.advice,
                ),
            });
        }
        info!(target, "promotion succeeded");
        Ok(WorkflowOutcome::Success)
    }
}
