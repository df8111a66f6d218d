//! Workspace Manager - per-job scratch directories
//!
//! Each job gets an exclusively-owned directory named by a fresh UUID under the
//! configured root. It holds the source file, the current stdin file and any
//! compile artifacts, and is bind-mounted into that job's containers only.
//!
//! Removal is guaranteed: `release()` on the normal path, and a `Drop` guard
//! that deletes the directory synchronously if the owner unwinds, returns early
//! or has its future cancelled.

use crate::error::{EngineError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, empty, uniquely-named workspace
    pub async fn acquire(&self) -> Result<Workspace> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| EngineError::workspace(&self.root, e))?;

        let id = Uuid::new_v4();
        let path = self.root.join(id.to_string());

        // create_dir (not create_dir_all) so a collision fails instead of sharing
        tokio::fs::create_dir(&path)
            .await
            .map_err(|e| EngineError::workspace(&path, e))?;

        debug!(workspace_id = %id, path = %path.display(), "Workspace acquired");

        Ok(Workspace {
            id,
            path,
            released: false,
        })
    }
}

#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a text file into the workspace, replacing any previous content
    pub async fn materialize(&self, file_name: &str, contents: &str) -> Result<()> {
        if !is_plain_file_name(file_name) {
            return Err(EngineError::workspace(
                self.path.join(file_name),
                std::io::Error::new(ErrorKind::InvalidInput, "file name must not contain path components"),
            ));
        }

        let target = self.path.join(file_name);
        tokio::fs::write(&target, contents)
            .await
            .map_err(|e| EngineError::workspace(&target, e))
    }

    /// Delete the workspace and everything in it.
    ///
    /// Failures are logged, never returned: a leaked directory is a resource
    /// leak, not a judging error.
    pub async fn release(mut self) {
        self.released = true;

        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(workspace_id = %self.id, "Workspace released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                workspace_id = %self.id,
                path = %self.path.display(),
                error = %e,
                "Failed to remove workspace"
            ),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // Cannot be async in Drop; a blocking removal keeps cleanup deterministic
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(workspace_id = %self.id, "Workspace removed by drop guard"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                workspace_id = %self.id,
                path = %self.path.display(),
                error = %e,
                "Failed to remove workspace in drop guard"
            ),
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_manager() -> WorkspaceManager {
        WorkspaceManager::new(std::env::temp_dir().join(format!("codesphere-ws-test-{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_acquire_creates_empty_unique_directories() {
        let manager = temp_manager();
        let a = manager.acquire().await.unwrap();
        let b = manager.acquire().await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert_eq!(std::fs::read_dir(a.path()).unwrap().count(), 0);
        assert!(a.path().starts_with(manager.root()));

        a.release().await;
        b.release().await;
        std::fs::remove_dir_all(manager.root()).unwrap();
    }

    #[tokio::test]
    async fn test_materialize_writes_and_overwrites() {
        let manager = temp_manager();
        let ws = manager.acquire().await.unwrap();

        ws.materialize("input.txt", "1 2\n").await.unwrap();
        ws.materialize("input.txt", "3\n").await.unwrap();

        let content = std::fs::read_to_string(ws.path().join("input.txt")).unwrap();
        assert_eq!(content, "3\n");

        ws.release().await;
        std::fs::remove_dir_all(manager.root()).unwrap();
    }

    #[tokio::test]
    async fn test_materialize_rejects_path_components() {
        let manager = temp_manager();
        let ws = manager.acquire().await.unwrap();

        for name in ["../escape.txt", "a/b.txt", "..", ""] {
            let result = ws.materialize(name, "x").await;
            assert!(matches!(result, Err(EngineError::Workspace { .. })), "{name:?} must be rejected");
        }

        ws.release().await;
        std::fs::remove_dir_all(manager.root()).unwrap();
    }

    #[tokio::test]
    async fn test_release_removes_directory() {
        let manager = temp_manager();
        let ws = manager.acquire().await.unwrap();
        ws.materialize("main.py", "print(1)").await.unwrap();
        let path = ws.path().to_path_buf();

        ws.release().await;

        assert!(!path.exists());
        std::fs::remove_dir_all(manager.root()).unwrap();
    }

    #[tokio::test]
    async fn test_drop_guard_removes_directory() {
        let manager = temp_manager();
        let path = {
            let ws = manager.acquire().await.unwrap();
            ws.materialize("main.c", "int main(){}").await.unwrap();
            ws.path().to_path_buf()
        };

        assert!(!path.exists());
        std::fs::remove_dir_all(manager.root()).unwrap();
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_directory() {
        let manager = temp_manager();
        let ws = manager.acquire().await.unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();

        // Must not panic or error
        ws.release().await;
        std::fs::remove_dir_all(manager.root()).unwrap();
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("Main.java"));
        assert!(is_plain_file_name("input.txt"));
        assert!(!is_plain_file_name("../x"));
        assert!(!is_plain_file_name("dir/x"));
        assert!(!is_plain_file_name("."));
    }
}
