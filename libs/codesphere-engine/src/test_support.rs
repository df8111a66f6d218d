// Scripted sandbox for engine unit tests
use crate::config::EngineConfig;
use crate::error::Result;
use crate::executor::Engine;
use crate::recipe::INPUT_FILE_NAME;
use crate::sandbox::{RawExecutionResult, Sandbox, SandboxCommand, Stage};
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Script = dyn Fn(&Path, &SandboxCommand) -> Result<RawExecutionResult> + Send + Sync;

/// Sandbox whose behaviour is a closure over (workspace dir, command).
///
/// Records every command and the workspace it ran in.
pub(crate) struct ScriptedSandbox {
    script: Box<Script>,
    pub calls: Mutex<Vec<SandboxCommand>>,
    pub workspaces: Mutex<Vec<PathBuf>>,
}

impl ScriptedSandbox {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Path, &SandboxCommand) -> Result<RawExecutionResult> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            workspaces: Mutex::new(Vec::new()),
        })
    }

    /// Compiles cleanly and runs as `cat input.txt`
    pub fn echo() -> Arc<Self> {
        Self::new(|dir, cmd| match cmd.stage {
            Stage::Compile => Ok(RawExecutionResult::exited(0, "")),
            Stage::Run => Ok(RawExecutionResult::exited(0, read_input(dir))),
        })
    }

    pub fn stage_count(&self, stage: Stage) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.stage == stage).count()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn execute(&self, workspace: &Workspace, command: &SandboxCommand) -> Result<RawExecutionResult> {
        self.calls.lock().unwrap().push(command.clone());
        self.workspaces.lock().unwrap().push(workspace.path().to_path_buf());
        (self.script)(workspace.path(), command)
    }
}

pub(crate) fn read_input(dir: &Path) -> String {
    std::fs::read_to_string(dir.join(INPUT_FILE_NAME)).unwrap_or_default()
}

/// Engine over the given sandbox with a private workspace root
pub(crate) fn engine_with(sandbox: Arc<ScriptedSandbox>) -> Engine {
    let config = EngineConfig {
        workspace_root: std::env::temp_dir().join(format!("codesphere-engine-test-{}", uuid::Uuid::new_v4())),
        ..EngineConfig::default()
    };
    Engine::new(sandbox, &config)
}

/// Number of job directories left behind under the engine's workspace root
pub(crate) fn leftover_workspaces(engine: &Engine) -> usize {
    match std::fs::read_dir(engine.workspaces().root()) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
