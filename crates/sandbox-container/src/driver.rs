use crate::config::ContainerConfig;
use crate::exec::run_oneshot;
use crate::hook;
use crate::{MANAGED_BY_LABEL, MANAGED_BY_VALUE, USER_ID_LABEL};
use bollard::container::{
    Config as BollardConfig, CreateContainerOptions, InspectContainerOptions,
    ListContainersOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::models::{
    ContainerStateStatusEnum, HostConfig, RestartPolicy, RestartPolicyNameEnum,
};
use bollard::Docker;
use futures_util::StreamExt;
use sandbox_types::{Result, SandboxError, UserId};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Opaque handle to a managed container. Carries both the runtime id and the
/// deterministic name, since most bollard calls key off a name or id string
/// and the two are used in different contexts (labels vs. logs/exec).
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
}

/// One row of [`ContainerDriver::list_managed`].
#[derive(Debug, Clone)]
pub struct ManagedContainer {
    pub container_id: String,
    pub user_id: UserId,
}

/// Talks to the local container runtime on behalf of every component that
/// needs a live container: the session manager (lifecycle), the materializer
/// (archive I/O), and the PTY bridge (exec streams).
///
/// Cheap to clone: [`Docker`] wraps its transport in an `Arc` internally.
#[derive(Clone)]
pub struct ContainerDriver {
    docker: Docker,
    config: ContainerConfig,
}

impl ContainerDriver {
    /// Connects to the runtime using its local defaults (unix socket / named pipe).
    pub fn connect(config: ContainerConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::Transport(format!("docker connect: {e}")))?;
        Ok(Self { docker, config })
    }

    pub fn container_name(user_id: &UserId) -> String {
        format!("terminal-{user_id}")
    }

    /// §4.1 `ensure_container`: reuse a running container, heal a stopped one,
    /// or create a fresh one. Fails with [`SandboxError::ContainerUnavailable`]
    /// if every path is exhausted.
    pub async fn ensure_container(&self, user_id: &UserId) -> Result<ContainerHandle> {
        let name = Self::container_name(user_id);

        match self.inspect(&name).await {
            Some((id, status)) if status == ContainerStateStatusEnum::RUNNING => {
                return Ok(ContainerHandle { id, name });
            }
            Some((id, _)) => {
                // Exists but not running: attempt to start and heal.
                if self.start_and_wait(&name).await {
                    return Ok(ContainerHandle { id, name });
                }
                warn!("container {} unhealthy after start, removing", name);
                self.force_remove(&name).await;
            }
            None => {}
        }

        self.create_and_start(user_id, &name).await
    }

    /// §4.4 `cleanup_user` / reaper support: unconditionally removes the
    /// user's managed container, ignoring "already gone" errors.
    pub async fn delete_container(&self, user_id: &UserId) -> Result<()> {
        let name = Self::container_name(user_id);
        self.force_remove(&name).await;
        Ok(())
    }

    /// Lists every container carrying the `managed_by=terminal` label.
    pub async fn list_managed(&self) -> Result<Vec<ManagedContainer>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("{MANAGED_BY_LABEL}={MANAGED_BY_VALUE}")],
        );

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| SandboxError::Transport(e.to_string()))?;

        let mut out = Vec::with_capacity(containers.len());
        for c in containers {
            let Some(id) = c.id else { continue };
            let user_id = c
                .labels
                .unwrap_or_default()
                .get(USER_ID_LABEL)
                .cloned()
                .unwrap_or_default();
            if user_id.is_empty() {
                continue;
            }
            out.push(ManagedContainer {
                container_id: id,
                user_id,
            });
        }
        Ok(out)
    }

    pub(crate) fn docker(&self) -> &Docker {
        &self.docker
    }

    pub(crate) fn config(&self) -> &ContainerConfig {
        &self.config
    }

    async fn inspect(&self, name: &str) -> Option<(String, ContainerStateStatusEnum)> {
        let info = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .ok()?;
        let id = info.id?;
        let status = info
            .state
            .and_then(|s| s.status)
            .unwrap_or(ContainerStateStatusEnum::EMPTY);
        Some((id, status))
    }

    /// Starts a container and polls for responsiveness for up to
    /// `start_timeout_secs`, probing with `echo test` through a shell exec.
    async fn start_and_wait(&self, name: &str) -> bool {
        if self
            .docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .is_err()
        {
            return false;
        }
        self.wait_responsive(name).await
    }

    async fn wait_responsive(&self, name: &str) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.config.start_timeout_secs);
        while tokio::time::Instant::now() < deadline {
            if let Ok((code, out)) =
                run_oneshot(&self.docker, name, &["sh", "-c", "echo test"]).await
            {
                if code == 0 && String::from_utf8_lossy(&out).contains("test") {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        false
    }

    async fn force_remove(&self, name: &str) {
        let _ = self
            .docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;
    }

    async fn collect_logs(&self, name: &str) -> String {
        let mut stream = self.docker.logs(
            name,
            Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                tail: "200".to_string(),
                ..Default::default()
            }),
        );
        let mut out = String::new();
        while let Some(Ok(chunk)) = stream.next().await {
            out.push_str(&chunk.to_string());
        }
        out
    }

    async fn create_and_start(&self, user_id: &UserId, name: &str) -> Result<ContainerHandle> {
        let mut labels = HashMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
        labels.insert(USER_ID_LABEL.to_string(), user_id.clone());

        let host_config = HostConfig {
            memory: Some(self.config.memory_bytes),
            cpu_quota: Some(self.config.cpu_quota_us),
            cpu_period: Some(self.config.cpu_period_us),
            network_mode: Some("bridge".to_string()),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::ON_FAILURE),
                maximum_retry_count: Some(3),
            }),
            ..Default::default()
        };

        let container_config = BollardConfig {
            image: Some(self.config.image.clone()),
            tty: Some(true),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            working_dir: Some(sandbox_types::WORKSPACE_ROOT.to_string()),
            network_disabled: Some(false),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.to_string(),
                    platform: None,
                }),
                container_config,
            )
            .await
            .map_err(|e| SandboxError::Transport(format!("create_container: {e}")))?;

        if !self.start_and_wait(name).await {
            let logs = self.collect_logs(name).await;
            self.force_remove(name).await;
            return Err(SandboxError::ContainerUnavailable(format!(
                "container {name} never became responsive; logs: {logs}"
            )));
        }

        info!("created and started container {}", name);

        if let Err(e) = self.install_hook(user_id, name).await {
            warn!("shell hook install failed for {}: {} (non-fatal)", name, e);
        }

        Ok(ContainerHandle {
            id: created.id,
            name: name.to_string(),
        })
    }

    async fn install_hook(&self, user_id: &UserId, name: &str) -> Result<()> {
        let snippet = hook::build_snippet(user_id, &self.config.ide_api_base);
        let escaped = snippet.replace('\'', "'\\''");
        let cmd = format!("printf '%s' '{escaped}' >> ~/.bashrc");
        let (code, _) = run_oneshot(&self.docker, name, &["sh", "-c", &cmd]).await?;
        if code != 0 {
            return Err(SandboxError::Internal(format!(
                "hook install exited with status {code}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_is_deterministic() {
        assert_eq!(
            ContainerDriver::container_name(&"alice".to_string()),
            "terminal-alice"
        );
    }
}
