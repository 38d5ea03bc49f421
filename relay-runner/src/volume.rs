//! Shared volume lifecycle
//!
//! Every stage's run step mounts one host-backed volume, so stages can leave
//! files for each other. The volume is bound to `<base_dir>/output`, which is
//! wiped and recreated on setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::engine::{CommandRunner, Invocation};
use crate::error::VolumeError;

/// Name of the host directory backing the shared volume
pub const OUTPUT_DIR: &str = "output";

/// Permissions of the output directory; containers may run as any user
pub const OUTPUT_DIR_MODE: u32 = 0o777;

/// Handle to a created shared volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedVolume {
    pub name: String,
    /// Host directory the volume is bound to
    pub output_path: PathBuf,
}

/// Creates and removes shared volumes through the container engine
#[derive(Clone)]
pub struct VolumeManager {
    runner: Arc<dyn CommandRunner>,
    engine: String,
}

impl VolumeManager {
    pub fn new(runner: Arc<dyn CommandRunner>, engine: impl Into<String>) -> Self {
        Self {
            runner,
            engine: engine.into(),
        }
    }

    /// Recreates the output directory under `base_dir` and binds a volume named `name` to it
    pub async fn setup(
        &self,
        base_dir: &Path,
        name: &str,
        cancel: &CancelToken,
    ) -> Result<SharedVolume, VolumeError> {
        let output_path = std::path::absolute(base_dir.join(OUTPUT_DIR)).map_err(|source| {
            VolumeError::CreateOutput {
                path: base_dir.join(OUTPUT_DIR).display().to_string(),
                source,
            }
        })?;
        let output_display = output_path.display().to_string();

        debug!("Recreating output folder {}", output_display);

        match tokio::fs::remove_dir_all(&output_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(VolumeError::RemoveOutput {
                    path: output_display,
                    source,
                });
            }
        }

        tokio::fs::create_dir(&output_path)
            .await
            .map_err(|source| VolumeError::CreateOutput {
                path: output_display.clone(),
                source,
            })?;

        set_output_permissions(&output_path)
            .await
            .map_err(|source| VolumeError::CreateOutput {
                path: output_display.clone(),
                source,
            })?;

        let invocation = Invocation::new(
            &self.engine,
            [
                "volume".to_string(),
                "create".to_string(),
                "--driver".to_string(),
                "local".to_string(),
                "--opt".to_string(),
                "type=none".to_string(),
                "--opt".to_string(),
                format!("device={}", output_display),
                "--opt".to_string(),
                "o=bind".to_string(),
                format!("--name={}", name),
            ],
        );

        self.engine_call(&invocation, cancel)
            .await
            .map_err(|reason| VolumeError::Create {
                name: name.to_string(),
                reason,
            })?;

        info!("Created shared volume {} at {}", name, output_display);

        Ok(SharedVolume {
            name: name.to_string(),
            output_path,
        })
    }

    /// Removes the volume; the output directory and its contents stay on the host
    pub async fn teardown(
        &self,
        volume: &SharedVolume,
        cancel: &CancelToken,
    ) -> Result<(), VolumeError> {
        let invocation = Invocation::new(
            &self.engine,
            ["volume", "rm", "-f", volume.name.as_str()],
        );

        self.engine_call(&invocation, cancel)
            .await
            .map_err(|reason| VolumeError::Remove {
                name: volume.name.clone(),
                reason,
            })?;

        info!("Removed shared volume {}", volume.name);
        Ok(())
    }

    /// Runs an engine command that must exit 0
    async fn engine_call(
        &self,
        invocation: &Invocation,
        cancel: &CancelToken,
    ) -> Result<(), String> {
        let output = self
            .runner
            .execute(invocation, cancel)
            .await
            .map_err(|e| e.to_string())?;

        if !output.success() {
            return Err(format!(
                "exit status {}: {}",
                output.exit_code,
                output.stderr.trim()
            ));
        }

        Ok(())
    }
}

#[cfg(unix)]
async fn set_output_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(OUTPUT_DIR_MODE)).await
}

#[cfg(not(unix))]
async fn set_output_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedRunner};

    #[tokio::test]
    async fn test_setup_recreates_output_and_creates_volume() {
        let base = tempfile::tempdir().unwrap();
        let stale = base.path().join(OUTPUT_DIR).join("stale.csv");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();

        let runner = Arc::new(ScriptedRunner::succeeding());
        let manager = VolumeManager::new(runner.clone(), "docker");

        let volume = manager
            .setup(base.path(), "relay-test", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(volume.name, "relay-test");
        assert!(volume.output_path.is_dir());
        assert!(!stale.exists());

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].command_line(),
            format!(
                "docker volume create --driver local --opt type=none --opt device={} --opt o=bind --name=relay-test",
                volume.output_path.display()
            )
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_setup_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let base = tempfile::tempdir().unwrap();
        let manager = VolumeManager::new(Arc::new(ScriptedRunner::succeeding()), "docker");

        let volume = manager
            .setup(base.path(), "relay-test", &CancelToken::new())
            .await
            .unwrap();

        let mode = std::fs::metadata(&volume.output_path)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, OUTPUT_DIR_MODE);
    }

    #[tokio::test]
    async fn test_setup_fails_when_base_missing() {
        let base = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::succeeding());
        let manager = VolumeManager::new(runner.clone(), "docker");

        let err = manager
            .setup(&base.path().join("missing"), "relay-test", &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VolumeError::CreateOutput { .. }));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_setup_fails_on_engine_exit() {
        let base = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|_| Reply::exit(1, "", "volume exists")));
        let manager = VolumeManager::new(runner, "docker");

        let err = manager
            .setup(base.path(), "relay-test", &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, VolumeError::Create { .. }));
        assert!(err.to_string().contains("volume exists"));
    }

    #[tokio::test]
    async fn test_teardown() {
        let runner = Arc::new(ScriptedRunner::succeeding());
        let manager = VolumeManager::new(runner.clone(), "podman");
        let volume = SharedVolume {
            name: "relay-test".to_string(),
            output_path: PathBuf::from("/tmp/output"),
        };

        manager.teardown(&volume, &CancelToken::new()).await.unwrap();

        assert_eq!(
            runner.calls()[0].command_line(),
            "podman volume rm -f relay-test"
        );
    }

    #[tokio::test]
    async fn test_teardown_failure() {
        let runner = Arc::new(ScriptedRunner::new(|_| Reply::NotStarted));
        let manager = VolumeManager::new(runner, "docker");
        let volume = SharedVolume {
            name: "relay-test".to_string(),
            output_path: PathBuf::from("/tmp/output"),
        };

        let err = manager
            .teardown(&volume, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VolumeError::Remove { .. }));
    }
}
