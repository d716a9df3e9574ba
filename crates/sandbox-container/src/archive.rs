use crate::driver::ContainerHandle;
use crate::ContainerDriver;
use bollard::container::UploadToContainerOptions;
use sandbox_types::{Result, SandboxError};

impl ContainerDriver {
    /// §4.1 `put_archive`: extracts `tar_bytes` into `dst_dir` inside the
    /// container via the runtime's archive API (never `docker cp`, per the
    /// spec's Open Question resolution — see the workspace `DESIGN.md`).
    pub async fn put_archive(
        &self,
        handle: &ContainerHandle,
        dst_dir: &str,
        tar_bytes: Vec<u8>,
    ) -> Result<()> {
        self.docker()
            .upload_to_container(
                &handle.name,
                Some(UploadToContainerOptions {
                    path: dst_dir.to_string(),
                    no_overwrite_dir_non_dir: "false".to_string(),
                }),
                tar_bytes.into(),
            )
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError { status_code, .. }
                    if status_code == 404 =>
                {
                    SandboxError::ContainerUnavailable(format!("{} is gone", handle.name))
                }
                other => SandboxError::Transport(other.to_string()),
            })
    }
}
