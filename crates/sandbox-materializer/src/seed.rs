use crate::archive::single_file_tar;
use sandbox_container::{ContainerDriver, ContainerHandle};
use sandbox_store::TreeNode;
use sandbox_types::{Result, SandboxError, UserId, WorkspacePath};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// A starter file provisioned when a user's tree is empty, matching the
/// original implementation's "hello banner" seed.
const STARTER_FILE_NAME: &str = "main.py";
const STARTER_FILE_CONTENT: &str = "print(\"Hello from your sandbox!\")\n";

/// §4.3 `seed`: project the user's full tree into `/workspace`.
///
/// Walks the tree depth-first: each directory node triggers a recursive
/// `mkdir -p` inside the container, each file node is pushed through
/// [`push_file`]. If the user has no nodes at all yet, a starter file is
/// created in the store first and the tree is re-seeded from it.
pub async fn seed(
    pool: &SqlitePool,
    user_id: &UserId,
    driver: &ContainerDriver,
    handle: &ContainerHandle,
) -> Result<()> {
    let mut nodes = sandbox_store::tree(pool, user_id).await?;

    if nodes.is_empty() {
        info!("user {} has an empty tree, provisioning starter file", user_id);
        sandbox_store::create_node(
            pool,
            user_id,
            None,
            STARTER_FILE_NAME,
            false,
            Some(STARTER_FILE_CONTENT),
        )
        .await?;
        nodes = sandbox_store::tree(pool, user_id).await?;
    }

    for node in &nodes {
        walk(driver, handle, &[], node).await?;
    }

    info!("seeded {} into container {}", user_id, handle.name);
    Ok(())
}

async fn walk(
    driver: &ContainerDriver,
    handle: &ContainerHandle,
    parents: &[&str],
    node: &TreeNode,
) -> Result<()> {
    let mut segments: Vec<&str> = parents.to_vec();
    segments.push(&node.name);

    if node.is_dir {
        let path = WorkspacePath::from_segments(segments.iter().copied());
        mkdir_p(driver, handle, path.as_str()).await?;
        for child in &node.children {
            walk(driver, handle, &segments, child).await?;
        }
    } else {
        let path = WorkspacePath::from_segments(segments.iter().copied());
        let content = node.content.clone().unwrap_or_default();
        write_file(driver, handle, path.as_str(), content.as_bytes()).await?;
    }

    Ok(())
}

async fn mkdir_p(driver: &ContainerDriver, handle: &ContainerHandle, workspace_path: &str) -> Result<()> {
    let (code, _) = driver
        .exec_oneshot(handle, &["mkdir", "-p", workspace_path])
        .await?;
    if code != 0 {
        return Err(SandboxError::Internal(format!(
            "mkdir -p {workspace_path} exited with status {code}"
        )));
    }
    Ok(())
}

/// §4.3 `push_file`: overwrite a single file's bytes inside the container
/// through a single-file tar archive extracted at `/`. Missing parent
/// directories are created first.
pub async fn push_file(
    driver: &ContainerDriver,
    handle: &ContainerHandle,
    workspace_path: &str,
    content: &[u8],
) -> Result<()> {
    if let Some(parent) = parent_dir(workspace_path) {
        mkdir_p(driver, handle, parent).await?;
    }
    write_file(driver, handle, workspace_path, content).await
}

/// The containing directory of a workspace path, or `None` for a root-level file.
fn parent_dir(workspace_path: &str) -> Option<&str> {
    workspace_path.rsplit_once('/').map(|(parent, _)| parent).filter(|p| !p.is_empty())
}

async fn write_file(
    driver: &ContainerDriver,
    handle: &ContainerHandle,
    workspace_path: &str,
    content: &[u8],
) -> Result<()> {
    // `upload_to_container` extracts relative to `path`; extracting at `/`
    // means the archive's entry name must carry the full path minus the
    // leading slash.
    let archive_entry = workspace_path.trim_start_matches('/');
    let tar_bytes = single_file_tar(archive_entry, content);
    driver.put_archive(handle, "/", tar_bytes).await?;
    debug!("wrote {} bytes to {}:{}", content.len(), handle.name, workspace_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_of_nested_path() {
        assert_eq!(parent_dir("/workspace/src/main.py"), Some("/workspace/src"));
    }

    #[test]
    fn parent_dir_of_root_level_file() {
        assert_eq!(parent_dir("/workspace/main.py"), Some("/workspace"));
    }

    #[test]
    fn parent_dir_of_bare_name_is_none() {
        assert_eq!(parent_dir("main.py"), None);
    }
}
