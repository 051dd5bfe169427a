//! CLI entry point: wires configuration and collaborator commands into the
//! workflow and maps its outcome onto stable exit codes.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use planforge::exit_codes;
use planforge::io::config::load_config;
use planforge::io::evaluator::CommandEvaluator;
use planforge::io::generator::CommandGenerator;
use planforge::io::runner::CommandPlanRunner;
use planforge::io::syntax::CommandSyntaxChecker;
use planforge::logging;
use planforge::workflow::{Workflow, WorkflowOutcome, WorkflowRequest};

#[derive(Parser)]
#[command(
    name = "planforge",
    version,
    about = "Generate, validate, and promote remediation plans through staged environments"
)]
struct Cli {
    /// What the plan must accomplish.
    #[arg(long)]
    objective: String,

    /// A requirement the plan must satisfy; repeat for each one.
    #[arg(long = "requirement")]
    requirements: Vec<String>,

    /// Environment the validated plan is finally applied to.
    #[arg(long)]
    target: String,

    /// Ordered staging environments, validated left to right.
    #[arg(long, value_delimiter = ',')]
    staging: Vec<String>,

    /// Where the plan artifact is written (and resumed from).
    #[arg(long, default_value = "plan.txt")]
    output: PathBuf,

    /// Retry ceiling per environment. Defaults to 1.5x the requirement count.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Collaborator commands and timeouts.
    #[arg(long, default_value = "planforge.toml")]
    config: PathBuf,

    /// Optional procedure document handed to the generator.
    #[arg(long)]
    procedure_file: Option<PathBuf>,

    /// Optional example of expected output handed to the generator.
    #[arg(long)]
    example_output_file: Option<PathBuf>,

    /// Promote the existing plan without re-validating it.
    #[arg(long)]
    skip_staging: bool,

    /// Validate only; never touch the target.
    #[arg(long)]
    skip_promotion: bool,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    if !cli.skip_staging && cli.requirements.is_empty() {
        bail!("at least one --requirement is needed to validate a plan");
    }

    let config = load_config(&cli.config)?;
    let request = build_request(&cli)?;

    let mut generator = CommandGenerator::new(
        config.generator.command.clone(),
        Duration::from_secs(config.generation_timeout_secs),
        config.generation_retries,
        config.output_limit_bytes,
    );
    let mut syntax = CommandSyntaxChecker::new(
        config.syntax.command.clone(),
        Duration::from_secs(config.syntax_timeout_secs),
        config.output_limit_bytes,
    );
    let mut runner = CommandPlanRunner::new(
        config.runner.command.clone(),
        Duration::from_secs(config.execution_timeout_secs),
        config.output_limit_bytes,
    );
    let mut evaluator = CommandEvaluator::new(
        config.evaluator.command.clone(),
        Duration::from_secs(config.evaluation_timeout_secs),
        config.output_limit_bytes,
    );

    let outcome = Workflow::new(&mut generator, &mut syntax, &mut runner, &mut evaluator)
        .run(&request)?;

    Ok(report(&outcome))
}

fn build_request(cli: &Cli) -> Result<WorkflowRequest> {
    let procedure = read_optional(cli.procedure_file.as_deref())?;
    let example_output = read_optional(cli.example_output_file.as_deref())?;
    Ok(WorkflowRequest {
        objective: cli.objective.clone(),
        requirements: cli.requirements.clone(),
        target: cli.target.clone(),
        staging: cli.staging.clone(),
        plan_path: cli.output.clone(),
        max_attempts: cli.max_attempts,
        procedure,
        example_output,
        skip_staging: cli.skip_staging,
        skip_promotion: cli.skip_promotion,
    })
}

fn read_optional(path: Option<&std::path::Path>) -> Result<Option<String>> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))
            .map(Some),
        None => Ok(None),
    }
}

fn report(outcome: &WorkflowOutcome) -> i32 {
    match outcome {
        WorkflowOutcome::Success => {
            println!("success");
            exit_codes::OK
        }
        WorkflowOutcome::Exhausted { last } => {
            eprintln!("workflow failed: {}", last.message);
            if !last.advice.is_empty() {
                eprintln!("{}", last.advice);
            }
            exit_codes::EXHAUSTED
        }
        WorkflowOutcome::Unreachable {
            environment,
            detail,
        } => {
            eprintln!("environment {environment} unreachable: {detail}");
            exit_codes::UNREACHABLE
        }
    }
}
