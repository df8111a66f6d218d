// Engine configuration: sandbox image, resource ceilings and workspace placement
use crate::error::{EngineError, Result};
use codesphere_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.json";
pub const CONFIG_PATH_ENV: &str = "CODESPHERE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Image holding every toolchain (gcc, g++, javac, python3)
    pub image: String,
    /// Per-language image overrides
    pub images: HashMap<Language, String>,
    /// Directory under which job workspaces are created
    pub workspace_root: PathBuf,
    /// Path of `workspace_root` as seen by the docker daemon.
    ///
    /// Only needed when the engine itself runs inside a container that shares
    /// the host's docker socket.
    pub bind_root: Option<PathBuf>,
    /// Wall-clock ceiling for the compile step, independent of the submission
    pub compile_timeout_ms: u64,
    pub compile_memory_limit_mb: u64,
    pub cpu_limit: f64,
    pub pids_limit: i64,
    /// Combined stdout/stderr captured per step before truncation
    pub output_limit_bytes: usize,
    pub max_concurrent_jobs: usize,
    /// `user[:group]` the sandboxed processes run as; defaults to the workspace owner
    pub sandbox_user: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            image: "codesphere-sandbox:latest".to_string(),
            images: HashMap::new(),
            workspace_root: std::env::temp_dir().join("codesphere"),
            bind_root: None,
            compile_timeout_ms: 10_000,
            compile_memory_limit_mb: 512,
            cpu_limit: 1.0,
            pids_limit: 64,
            output_limit_bytes: 1024 * 1024,
            max_concurrent_jobs: 4,
            sandbox_user: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", config_path.display(), e))
        })?;

        let config: EngineConfig = serde_json::from_str(&content).map_err(|e| {
            EngineError::Config(format!("failed to parse {}: {}", config_path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `$CODESPHERE_CONFIG` or `config/engine.json`, then apply
    /// environment overrides. A missing default file means built-in defaults.
    pub fn load_default() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `CODESPHERE_*` overrides from the given lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(image) = lookup("CODESPHERE_IMAGE") {
            self.image = image;
        }
        if let Some(root) = lookup("CODESPHERE_WORKSPACE_ROOT") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(root) = lookup("CODESPHERE_BIND_ROOT") {
            self.bind_root = Some(PathBuf::from(root));
        }
        if let Some(jobs) = lookup("CODESPHERE_MAX_JOBS") {
            self.max_concurrent_jobs = jobs
                .parse()
                .map_err(|_| EngineError::Config(format!("CODESPHERE_MAX_JOBS is not a number: {}", jobs)))?;
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(EngineError::Config("image must not be empty".to_string()));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(EngineError::Config("max_concurrent_jobs must be at least 1".to_string()));
        }
        if self.pids_limit < 1 {
            return Err(EngineError::Config("pids_limit must be at least 1".to_string()));
        }
        if self.cpu_limit <= 0.0 {
            return Err(EngineError::Config("cpu_limit must be positive".to_string()));
        }
        if self.output_limit_bytes == 0 {
            return Err(EngineError::Config("output_limit_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Get the Docker image for a language
    pub fn image_for(&self, language: Language) -> &str {
        self.images.get(&language).unwrap_or(&self.image)
    }

    /// Every distinct image the configured languages need
    pub fn all_images(&self) -> Vec<String> {
        let mut images: Vec<String> = Language::ALL
            .iter()
            .map(|lang| self.image_for(*lang).to_string())
            .collect();
        images.sort();
        images.dedup();
        images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pids_limit, 64);
        assert_eq!(config.output_limit_bytes, 1024 * 1024);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"image": "judge:1", "images": {"java": "judge-java:1"}, "pids_limit": 32}"#,
        )
        .unwrap();

        assert_eq!(config.image_for(Language::Cpp), "judge:1");
        assert_eq!(config.image_for(Language::Java), "judge-java:1");
        assert_eq!(config.pids_limit, 32);
        assert_eq!(config.compile_timeout_ms, 10_000);
        assert_eq!(config.all_images(), vec!["judge-java:1".to_string(), "judge:1".to_string()]);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("codesphere-config-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{"max_concurrent_jobs": 8}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.max_concurrent_jobs, 8);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = std::env::temp_dir().join(format!("codesphere-config-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{"max_concurrent_jobs": 0}"#).unwrap();

        assert!(matches!(EngineConfig::load(&path), Err(EngineError::Config(_))));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_overrides(env(&[
                ("CODESPHERE_IMAGE", "custom:2"),
                ("CODESPHERE_WORKSPACE_ROOT", "/srv/jobs"),
                ("CODESPHERE_BIND_ROOT", "/host/srv/jobs"),
                ("CODESPHERE_MAX_JOBS", "16"),
            ]))
            .unwrap();

        assert_eq!(config.image, "custom:2");
        assert_eq!(config.workspace_root, PathBuf::from("/srv/jobs"));
        assert_eq!(config.bind_root, Some(PathBuf::from("/host/srv/jobs")));
        assert_eq!(config.max_concurrent_jobs, 16);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = EngineConfig::default();
        let result = config.apply_overrides(env(&[("CODESPHERE_MAX_JOBS", "lots")]));
        assert!(result.is_err());
    }
}
