/// Job Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Own the sandbox, the workspace manager and the job permits, and run the
/// compile/run steps every job is made of.
///
/// **Architecture:**
/// 1. Acquire a workspace per job (workspace.rs)
/// 2. Look up the language recipe (recipe.rs)
/// 3. Run steps through the sandbox (sandbox/)
/// 4. Classify raw results (classifier.rs)
/// 5. Release the workspace on every path
///
/// `run_code` lives here; `judge_submission` builds on the same steps in judge.rs.
use crate::classifier::classify;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::recipe::{recipe, INPUT_FILE_NAME};
use crate::sandbox::{Sandbox, SandboxCommand, Stage};
use crate::workspace::{Workspace, WorkspaceManager};
use codesphere_common::config::{MAX_SOURCE_CODE_BYTES, MAX_TEST_INPUT_BYTES};
use codesphere_common::types::{ExecutionRequest, Language, Limits, Outcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, error, info, warn};

/// What callers see when the harness itself failed; details stay in the logs
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error while executing code";

pub struct Engine {
    sandbox: Arc<dyn Sandbox>,
    workspaces: WorkspaceManager,
    compile_timeout: Duration,
    compile_memory_limit_mb: u64,
    permits: Semaphore,
}

impl Engine {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: &EngineConfig) -> Self {
        Self {
            sandbox,
            workspaces: WorkspaceManager::new(config.workspace_root.clone()),
            compile_timeout: Duration::from_millis(config.compile_timeout_ms),
            compile_memory_limit_mb: config.compile_memory_limit_mb,
            permits: Semaphore::new(config.max_concurrent_jobs),
        }
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Wait for a job slot
    pub(crate) async fn permit(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| EngineError::SandboxUnavailable("engine is shutting down".to_string()))
    }

    /// Compile the workspace's source if the language needs it.
    ///
    /// Interpreted languages yield `Success` without touching the sandbox.
    pub(crate) async fn compile(&self, workspace: &Workspace, language: Language) -> Result<Outcome> {
        let Some(script) = recipe(language).compile_command else {
            return Ok(Outcome::Success(String::new()));
        };

        let command = SandboxCommand {
            stage: Stage::Compile,
            language,
            script: script.to_string(),
            memory_limit_mb: self.compile_memory_limit_mb,
            timeout: self.compile_timeout,
        };

        let raw = self.sandbox.execute(workspace, &command).await?;
        let outcome = classify(Stage::Compile, &raw);

        match &outcome {
            Outcome::Success(_) => debug!(elapsed_ms = raw.elapsed_ms, "Compilation succeeded"),
            Outcome::TimeLimitExceeded => warn!(
                stage = %Stage::Compile,
                timeout_ms = self.compile_timeout.as_millis() as u64,
                "Compilation timed out"
            ),
            Outcome::MemoryLimitExceeded => warn!(stage = %Stage::Compile, "Compiler exceeded its memory ceiling"),
            _ => info!(
                elapsed_ms = raw.elapsed_ms,
                error_preview = raw.output.lines().next().unwrap_or(""),
                "Compilation failed"
            ),
        }

        Ok(outcome)
    }

    /// Run the (compiled) program once against the workspace's current input
    pub(crate) async fn run_step(&self, workspace: &Workspace, language: Language, limits: Limits) -> Result<Outcome> {
        let recipe = recipe(language);
        let command = SandboxCommand {
            stage: Stage::Run,
            language,
            script: recipe.run_script(limits.memory_limit_mb),
            memory_limit_mb: limits.memory_limit_mb,
            timeout: Duration::from_millis(limits.time_limit_ms),
        };

        let mut raw = self.sandbox.execute(workspace, &command).await?;

        // A managed heap can run dry before the cgroup ceiling is reached
        if recipe.reports_memory_exhaustion(raw.exit_code) {
            raw.oom_killed = true;
        }
        let outcome = classify(Stage::Run, &raw);

        match &outcome {
            Outcome::TimeLimitExceeded => warn!(
                stage = %Stage::Run,
                time_limit_ms = limits.time_limit_ms,
                "Execution timed out"
            ),
            Outcome::MemoryLimitExceeded => warn!(
                stage = %Stage::Run,
                memory_limit_mb = limits.memory_limit_mb,
                "Execution exceeded memory limit"
            ),
            Outcome::RuntimeError(_) => debug!(exit_code = ?raw.exit_code, "Execution had runtime error"),
            _ => debug!(elapsed_ms = raw.elapsed_ms, "Execution completed"),
        }

        Ok(outcome)
    }

    /// Compile and execute one program against one input.
    ///
    /// Returns `Err` only when the request is rejected up front (oversized
    /// input). Every other failure, including harness faults, is an `Outcome`;
    /// harness faults are logged here and surface as a generic `InternalError`.
    #[tracing::instrument(skip(self, request), fields(job_id = %request.id, language = %request.language))]
    pub async fn run_code(&self, request: &ExecutionRequest) -> Result<Outcome> {
        validate_sizes(&request.source_code, std::iter::once(request.stdin.as_str()))?;

        let outcome = match self.run_once(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %request.id, error = %e, "Run failed inside the harness");
                Outcome::InternalError(INTERNAL_ERROR_MESSAGE.to_string())
            }
        };

        info!(status = ?outcome.status(), "Run completed");
        Ok(outcome)
    }

    async fn run_once(&self, request: &ExecutionRequest) -> Result<Outcome> {
        let _permit = self.permit().await?;
        let workspace = self.workspaces.acquire().await?;

        let outcome = self.compile_and_run(&workspace, request).await;

        workspace.release().await;
        outcome
    }

    async fn compile_and_run(&self, workspace: &Workspace, request: &ExecutionRequest) -> Result<Outcome> {
        workspace
            .materialize(recipe(request.language).source_file, &request.source_code)
            .await?;
        workspace.materialize(INPUT_FILE_NAME, &request.stdin).await?;

        let compiled = self.compile(workspace, request.language).await?;
        if !compiled.is_success() {
            return Ok(compiled);
        }

        self.run_step(workspace, request.language, request.limits).await
    }
}

/// Reject pathological inputs before anything touches the filesystem
pub(crate) fn validate_sizes<'a>(source_code: &str, inputs: impl IntoIterator<Item = &'a str>) -> Result<()> {
    if source_code.len() > MAX_SOURCE_CODE_BYTES {
        return Err(EngineError::InputTooLarge {
            what: "source code",
            limit: MAX_SOURCE_CODE_BYTES,
        });
    }
    if inputs.into_iter().any(|input| input.len() > MAX_TEST_INPUT_BYTES) {
        return Err(EngineError::InputTooLarge {
            what: "test input",
            limit: MAX_TEST_INPUT_BYTES,
        });
    }
    Ok(())
}
