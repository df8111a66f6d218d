// Docker-backed sandbox using Bollard
use super::{OutputBuffer, RawExecutionResult, Sandbox, SandboxCommand, Stage};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::workspace::Workspace;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, HostConfigLogConfig};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Mount point of the workspace inside every container
const WORKDIR: &str = "/app";

/// Container cleanup guard - guarantees container removal on drop
/// This ensures containers are cleaned up even if execution panics or is cancelled
struct ContainerGuard {
    docker: Docker,
    container_id: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(docker: &Docker, container_id: String) -> Self {
        Self {
            docker: docker.clone(),
            container_id,
            armed: true,
        }
    }

    /// Remove the container now and disarm the drop fallback
    async fn remove(mut self) {
        self.armed = false;
        remove_container(&self.docker, &self.container_id).await;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // Cannot be async in Drop: hand the removal to the runtime
        let docker = self.docker.clone();
        let container_id = self.container_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    remove_container(&docker, &container_id).await;
                });
            }
            Err(_) => warn!(container_id = %container_id, "No runtime to remove container; it will leak"),
        }
    }
}

async fn remove_container(docker: &Docker, container_id: &str) {
    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };

    if let Err(e) = docker.remove_container(container_id, Some(options)).await {
        warn!(container_id = %container_id, error = %e, "Failed to cleanup container");
    }
}

/// Docker-based sandbox for real isolated execution
///
/// **Docker Execution Rules:**
/// 1. One short-lived container per compile or run step
/// 2. Workspace bind-mounted at /app (read-only for run steps)
/// 3. Network disabled, capabilities dropped, no privilege escalation
/// 4. Memory ceiling with swap disabled, so a breach is an OOM kill
/// 5. PID limit against fork bombs
/// 6. Hard wall-clock deadline; the whole container is killed on expiry
/// 7. Container removed after every step
pub struct DockerSandbox {
    docker: Docker,
    config: EngineConfig,
}

impl DockerSandbox {
    /// Create a sandbox talking to the local Docker daemon
    pub fn connect(config: EngineConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::with_client(docker, config))
    }

    pub fn with_client(docker: Docker, config: EngineConfig) -> Self {
        Self { docker, config }
    }

    /// Check the daemon is reachable and every configured image is present
    pub async fn prepare(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| EngineError::SandboxUnavailable(format!("docker daemon unreachable: {}", e)))?;

        for image in self.config.all_images() {
            self.ensure_image(&image).await?;
        }
        Ok(())
    }

    /// Ensure Docker image is available (pull if needed)
    ///
    /// **Image Cache Health Check:**
    /// - Verifies image exists locally before execution
    /// - Pulls synchronously if missing
    /// - Logs cache hits/misses for observability
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image = %image, "Image cache hit");
            return Ok(());
        }

        warn!(image = %image, "Image cache miss, pulling now");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress?;
        }

        info!(image = %image, "Image pulled successfully");
        Ok(())
    }

    /// Host path of the workspace as the daemon sees it
    async fn bind_source(&self, workspace: &Workspace) -> Result<PathBuf> {
        match &self.config.bind_root {
            Some(bind_root) => {
                let relative = workspace
                    .path()
                    .strip_prefix(&self.config.workspace_root)
                    .map_err(|_| {
                        EngineError::SandboxUnavailable(format!(
                            "workspace {} is outside the configured workspace root",
                            workspace.id()
                        ))
                    })?;
                Ok(bind_root.join(relative))
            }
            None => tokio::fs::canonicalize(workspace.path())
                .await
                .map_err(|e| EngineError::workspace(workspace.path(), e)),
        }
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    /// Execute one step in a fresh container with hardened safety guarantees
    ///
    /// **Safety Guarantees:**
    /// - Hard timeout: enforced via tokio::time::timeout, kills container on timeout
    /// - Guaranteed cleanup: container removed even on panic/cancellation via Drop guard
    /// - OOM detection: read from the container state, not guessed from output
    /// - Partial output capture: output collected so far survives a timeout
    #[tracing::instrument(
        skip(self, workspace, command),
        fields(workspace_id = %workspace.id(), stage = %command.stage, language = %command.language)
    )]
    async fn execute(&self, workspace: &Workspace, command: &SandboxCommand) -> Result<RawExecutionResult> {
        let source = self.bind_source(workspace).await?;
        let container_name = format!("codesphere-{}-{}", command.stage, uuid::Uuid::new_v4());
        let user = resolve_user(self.config.sandbox_user.as_deref(), workspace.path()).await?;
        let config = container_config(&self.config, command, &source, user);

        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self.docker.create_container(Some(create_options), config).await?;
        let container_id = container.id;

        // Set up cleanup guard immediately after container creation
        let guard = ContainerGuard::new(&self.docker, container_id.clone());

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await?;

        // The deadline starts once the process is running, not while docker sets up
        let start_time = Instant::now();
        let mut output = OutputBuffer::new(self.config.output_limit_bytes);

        let execution = async {
            let logs_options = Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: true,
                ..Default::default()
            });

            let mut logs = self.docker.logs(&container_id, logs_options);
            while let Some(chunk) = logs.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message })
                    | Ok(LogOutput::StdErr { message })
                    | Ok(LogOutput::Console { message }) => output.push(&message),
                    Ok(LogOutput::StdIn { .. }) => {}
                    Err(e) => {
                        warn!(error = %e, "Error reading container logs");
                        break;
                    }
                }
            }

            let wait_options = WaitContainerOptions {
                condition: "not-running",
            };
            let mut wait = self.docker.wait_container(&container_id, Some(wait_options));
            match wait.next().await {
                // Bollard reports a non-zero exit as a wait error; the real status comes from inspect
                Some(Ok(_)) | Some(Err(bollard::errors::Error::DockerContainerWaitError { .. })) | None => Ok(()),
                Some(Err(e)) => Err(EngineError::from(e)),
            }
        };

        let waited = tokio::time::timeout(command.timeout, execution).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        let result = match waited {
            Ok(Ok(())) => {
                let inspect = self
                    .docker
                    .inspect_container(&container_id, None::<InspectContainerOptions>)
                    .await?;
                let state = inspect.state.unwrap_or_default();

                RawExecutionResult {
                    exit_code: state.exit_code,
                    timed_out: false,
                    oom_killed: state.oom_killed.unwrap_or(false),
                    output_truncated: output.is_truncated(),
                    output: output.into_text(),
                    elapsed_ms,
                }
            }
            Ok(Err(e)) => {
                guard.remove().await;
                return Err(e);
            }
            Err(_) => {
                // Killing the container takes its whole PID namespace with it
                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(container_id = %container_id, error = %e, "Failed to kill timed-out container");
                }

                RawExecutionResult {
                    exit_code: None,
                    timed_out: true,
                    oom_killed: false,
                    output_truncated: output.is_truncated(),
                    output: output.into_text(),
                    elapsed_ms,
                }
            }
        };

        guard.remove().await;

        debug!(
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            oom_killed = result.oom_killed,
            elapsed_ms = result.elapsed_ms,
            output_truncated = result.output_truncated,
            "Sandbox step finished"
        );

        Ok(result)
    }
}

/// User the step runs as: the configured one, else the workspace owner.
///
/// With every capability dropped, container root cannot write into a directory
/// it does not own, and the compile step must write its artifact there.
async fn resolve_user(configured: Option<&str>, workspace: &Path) -> Result<Option<String>> {
    if let Some(user) = configured {
        return Ok(Some(user.to_string()));
    }
    workspace_owner(workspace).await
}

#[cfg(unix)]
async fn workspace_owner(path: &Path) -> Result<Option<String>> {
    use std::os::unix::fs::MetadataExt;

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| EngineError::workspace(path, e))?;
    Ok(Some(format!("{}:{}", metadata.uid(), metadata.gid())))
}

#[cfg(not(unix))]
async fn workspace_owner(_path: &Path) -> Result<Option<String>> {
    Ok(None)
}

/// Container configuration for one step
fn container_config(
    config: &EngineConfig,
    command: &SandboxCommand,
    bind_source: &Path,
    user: Option<String>,
) -> Config<String> {
    let mount_mode = match command.stage {
        Stage::Compile => "rw",
        Stage::Run => "ro",
    };
    let memory = (command.memory_limit_mb as i64) * 1024 * 1024;

    // Docker's own log file must not grow unbounded either
    let log_max_kb = (config.output_limit_bytes * 2) / 1024 + 1;
    let log_config = HostConfigLogConfig {
        typ: Some("json-file".to_string()),
        config: Some(HashMap::from([("max-size".to_string(), format!("{}k", log_max_kb))])),
    };

    Config {
        image: Some(config.image_for(command.language).to_string()),
        cmd: Some(vec!["sh".to_string(), "-c".to_string(), command.script.clone()]),
        entrypoint: Some(vec![]),
        working_dir: Some(WORKDIR.to_string()),
        user,
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        network_disabled: Some(true), // SECURITY: No network access
        host_config: Some(HostConfig {
            binds: Some(vec![format!("{}:{}:{}", bind_source.display(), WORKDIR, mount_mode)]),
            memory: Some(memory),
            memory_swap: Some(memory),
            nano_cpus: Some((config.cpu_limit * 1_000_000_000.0) as i64),
            pids_limit: Some(config.pids_limit),
            network_mode: Some("none".to_string()),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            log_config: Some(log_config),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesphere_common::types::Language;
    use std::time::Duration;

    fn command(stage: Stage, language: Language) -> SandboxCommand {
        SandboxCommand {
            stage,
            language,
            script: "./main.out < input.txt".to_string(),
            memory_limit_mb: 256,
            timeout: Duration::from_millis(2000),
        }
    }

    #[test]
    fn test_run_step_mounts_workspace_read_only() {
        let config = EngineConfig::default();
        let cfg = container_config(&config, &command(Stage::Run, Language::Cpp), Path::new("/jobs/abc"), None);
        let host = cfg.host_config.unwrap();
        assert_eq!(host.binds.unwrap(), vec!["/jobs/abc:/app:ro".to_string()]);
    }

    #[test]
    fn test_compile_step_mounts_workspace_read_write() {
        let config = EngineConfig::default();
        let cfg = container_config(&config, &command(Stage::Compile, Language::Cpp), Path::new("/jobs/abc"), None);
        let host = cfg.host_config.unwrap();
        assert_eq!(host.binds.unwrap(), vec!["/jobs/abc:/app:rw".to_string()]);
    }

    #[test]
    fn test_resource_ceilings() {
        let config = EngineConfig {
            pids_limit: 32,
            cpu_limit: 0.5,
            ..EngineConfig::default()
        };
        let cfg = container_config(&config, &command(Stage::Run, Language::Python), Path::new("/jobs/x"), None);
        let host = cfg.host_config.unwrap();

        assert_eq!(host.memory, Some(256 * 1024 * 1024));
        assert_eq!(host.memory_swap, host.memory, "swap must be disabled");
        assert_eq!(host.pids_limit, Some(32));
        assert_eq!(host.nano_cpus, Some(500_000_000));
        assert_eq!(host.network_mode.as_deref(), Some("none"));
        assert_eq!(host.cap_drop, Some(vec!["ALL".to_string()]));
        assert_eq!(cfg.network_disabled, Some(true));
    }

    #[test]
    fn test_command_runs_through_shell_in_workdir() {
        let config = EngineConfig::default();
        let cfg = container_config(&config, &command(Stage::Run, Language::C), Path::new("/jobs/x"), None);
        assert_eq!(
            cfg.cmd.unwrap(),
            vec!["sh".to_string(), "-c".to_string(), "./main.out < input.txt".to_string()]
        );
        assert_eq!(cfg.working_dir.as_deref(), Some("/app"));
    }

    #[test]
    fn test_user_is_passed_through() {
        let config = EngineConfig::default();
        let cfg = container_config(
            &config,
            &command(Stage::Compile, Language::C),
            Path::new("/jobs/x"),
            Some("1000:1000".to_string()),
        );
        assert_eq!(cfg.user.as_deref(), Some("1000:1000"));
    }

    #[tokio::test]
    async fn test_configured_user_wins() {
        let user = resolve_user(Some("65534:65534"), Path::new("/does/not/exist")).await.unwrap();
        assert_eq!(user.as_deref(), Some("65534:65534"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_default_user_owns_the_workspace() {
        use crate::workspace::WorkspaceManager;
        use std::os::unix::fs::MetadataExt;

        let manager = WorkspaceManager::new(
            std::env::temp_dir().join(format!("codesphere-docker-user-{}", uuid::Uuid::new_v4())),
        );
        let workspace = manager.acquire().await.unwrap();
        workspace.materialize("main.c", "int main(){}").await.unwrap();

        // The engine's own uid:gid, as seen on a file it just wrote
        let written = std::fs::metadata(workspace.path().join("main.c")).unwrap();
        let expected = format!("{}:{}", written.uid(), written.gid());

        let user = resolve_user(None, workspace.path()).await.unwrap();
        assert_eq!(user, Some(expected.clone()));

        let cfg = container_config(
            &EngineConfig::default(),
            &command(Stage::Compile, Language::Cpp),
            workspace.path(),
            user,
        );
        assert_eq!(cfg.user, Some(expected));

        workspace.release().await;
        std::fs::remove_dir_all(manager.root()).unwrap();
    }

    #[test]
    fn test_image_selection_honours_overrides() {
        let mut config = EngineConfig::default();
        config.images.insert(Language::Java, "judge-java:17".to_string());

        let java = container_config(&config, &command(Stage::Run, Language::Java), Path::new("/x"), None);
        let c = container_config(&config, &command(Stage::Run, Language::C), Path::new("/x"), None);
        assert_eq!(java.image.as_deref(), Some("judge-java:17"));
        assert_eq!(c.image.as_deref(), Some(config.image.as_str()));
    }
}
