/// Sandboxed Process Runner
///
/// **Core Responsibility:**
/// Execute one command (compile or run) against a workspace inside an isolated
/// environment with hard memory, time and process-count ceilings, and report
/// what happened as a `RawExecutionResult`.
///
/// **Critical Architectural Boundary:**
/// - The runner knows HOW to isolate (Docker today)
/// - The runner does NOT classify outcomes or compare outputs
/// - A misbehaving program is a result, never an error; `Err` means the
///   sandbox itself could not be set up
mod docker;
mod output;

pub use docker::DockerSandbox;
pub use output::OutputBuffer;

use crate::error::Result;
use crate::workspace::Workspace;
use async_trait::async_trait;
use codesphere_common::types::Language;
use std::fmt;
use std::time::Duration;

/// Which step of a job a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compile => f.write_str("compile"),
            Stage::Run => f.write_str("run"),
        }
    }
}

/// One command to execute inside a workspace
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxCommand {
    pub stage: Stage,
    pub language: Language,
    /// Shell script run with `sh -c`, working directory = workspace
    pub script: String,
    pub memory_limit_mb: u64,
    pub timeout: Duration,
}

/// What the sandbox observed, before classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExecutionResult {
    /// Absent when the process never reported one (killed at the deadline)
    pub exit_code: Option<i64>,
    pub timed_out: bool,
    pub oom_killed: bool,
    /// Interleaved stdout and stderr, bounded
    pub output: String,
    pub output_truncated: bool,
    pub elapsed_ms: u64,
}

impl RawExecutionResult {
    pub fn exited(exit_code: i64, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn timed_out(output: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn oom_killed() -> Self {
        Self {
            exit_code: Some(137),
            oom_killed: true,
            ..Default::default()
        }
    }
}

/// Isolation backend seam.
///
/// Production uses [`DockerSandbox`]; tests substitute scripted fakes.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(&self, workspace: &Workspace, command: &SandboxCommand) -> Result<RawExecutionResult>;
}
