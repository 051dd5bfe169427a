//! Workflow configuration (TOML).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Workflow configuration.
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Ceiling on a single generator invocation, in seconds.
    pub generation_timeout_secs: u64,

    /// Nested retry count for generator timeouts only. Does not consume the
    /// outer gate-retry budget.
    pub generation_retries: u32,

    /// Ceiling on a syntax check, in seconds.
    pub syntax_timeout_secs: u64,

    /// Ceiling on a remote execution, in seconds.
    pub execution_timeout_secs: u64,

    /// Ceiling on a single evaluator invocation, in seconds.
    pub evaluation_timeout_secs: u64,

    /// Truncate collaborator stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    pub generator: CollaboratorConfig,
    pub syntax: CollaboratorConfig,
    pub runner: CollaboratorConfig,
    pub evaluator: CollaboratorConfig,
}

/// Command vector for one external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub command: Vec<String>,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self { command: Vec::new() }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            generation_timeout_secs: 30 * 60,
            generation_retries: 3,
            syntax_timeout_secs: 30,
            execution_timeout_secs: 120,
            evaluation_timeout_secs: 5 * 60,
            output_limit_bytes: 100_000,
            generator: CollaboratorConfig::default(),
            syntax: CollaboratorConfig::default(),
            runner: CollaboratorConfig::default(),
            evaluator: CollaboratorConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.generation_timeout_secs == 0 {
            return Err(anyhow!("generation_timeout_secs must be > 0"));
        }
        if self.syntax_timeout_secs == 0 {
            return Err(anyhow!("syntax_timeout_secs must be > 0"));
        }
        if self.execution_timeout_secs == 0 {
            return Err(anyhow!("execution_timeout_secs must be > 0"));
        }
        if self.evaluation_timeout_secs == 0 {
            return Err(anyhow!("evaluation_timeout_secs must be > 0"));
        }
        if self.generation_retries == 0 {
            return Err(anyhow!("generation_retries must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        for (name, collaborator) in [
            ("generator", &self.generator),
            ("syntax", &self.syntax),
            ("runner", &self.runner),
            ("evaluator", &self.evaluator),
        ] {
            if collaborator.command.is_empty()
                || collaborator.command[0].trim().is_empty()
            {
                return Err(anyhow!("{name}.command must be a non-empty array"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file. A missing file is an error: every
/// collaborator command must be configured explicitly.
pub fn load_config(path: &Path) -> Result<WorkflowConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WorkflowConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WorkflowConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> WorkflowConfig {
        let collaborator = |name: &str| CollaboratorConfig {
            command: vec![name.to_string()],
        };
        WorkflowConfig {
            generator: collaborator("gen"),
            syntax: collaborator("check"),
            runner: collaborator("run"),
            evaluator: collaborator("judge"),
            ..WorkflowConfig::default()
        }
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = configured();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn load_missing_file_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_config(&temp.path().join("missing.toml")).is_err());
    }

    #[test]
    fn validate_rejects_empty_collaborator_command() {
        let mut cfg = configured();
        cfg.runner.command.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("runner.command"));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut cfg = configured();
        cfg.syntax_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
