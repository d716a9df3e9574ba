//! FS-event intake (C6): turns an intercepted shell command into a tree
//! mutation and a notification.

use crate::error::ApiError;
use crate::notify::FileUpdateEvent;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use sandbox_types::{NodeId, Result, SandboxError, UserId, WORKSPACE_ROOT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct FsEventRequest {
    pub user_id: UserId,
    pub cmd: String,
    pub cwd: String,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// `POST /api/fs-event`
pub async fn fs_event_handler(
    State(state): State<AppState>,
    Json(req): Json<FsEventRequest>,
) -> std::result::Result<Json<OkResponse>, ApiError> {
    handle_fs_event(&state, req).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Resolves `arg` against `cwd` (absolute if it starts with `/`), normalizes
/// `.`/`..` components, and requires the result to lie under [`WORKSPACE_ROOT`].
pub fn normalize_under_workspace(cwd: &str, arg: &str) -> Result<String> {
    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{cwd}/{arg}")
    };

    let mut components: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            seg => components.push(seg),
        }
    }

    let normalized = format!("/{}", components.join("/"));
    let root_prefix = format!("{WORKSPACE_ROOT}/");
    if normalized != WORKSPACE_ROOT && !normalized.starts_with(&root_prefix) {
        return Err(SandboxError::Validation(format!(
            "path {normalized} escapes {WORKSPACE_ROOT}"
        )));
    }
    Ok(normalized)
}

/// Strips the `/workspace` (and leading `/`) prefix, leaving the path the
/// tree store expects (e.g. `/workspace/a/b.txt` -> `a/b.txt`, `/workspace` -> ``).
fn workspace_relative(path: &str) -> String {
    path.strip_prefix(WORKSPACE_ROOT)
        .unwrap_or(path)
        .trim_start_matches('/')
        .to_string()
}

/// §4.6 step 1+2: tokenize with POSIX shell-quoting rules, drop flags, and
/// normalize every positional path argument. Returns `(verb, [normalized paths])`.
fn tokenize(cmd: &str, cwd: &str) -> Result<(String, Vec<String>)> {
    let tokens = shlex::split(cmd)
        .ok_or_else(|| SandboxError::Validation(format!("unparsable shell command: {cmd}")))?;

    let mut iter = tokens.into_iter();
    let verb = iter
        .next()
        .ok_or_else(|| SandboxError::Validation("empty command".to_string()))?;

    let mut paths = Vec::new();
    for arg in iter {
        if arg.starts_with('-') {
            continue;
        }
        paths.push(normalize_under_workspace(cwd, &arg)?);
    }
    Ok((verb, paths))
}

/// §4.6: the full intake algorithm. Returns `Ok(())` for every verb that
/// succeeds or is idempotently absorbed; propagates everything else.
pub async fn handle_fs_event(state: &AppState, req: FsEventRequest) -> Result<()> {
    if !state.sessions.has_session_for_user(&req.user_id) {
        return Err(SandboxError::NotFound(format!(
            "no container for user {}",
            req.user_id
        )));
    }

    let (verb, paths) = tokenize(&req.cmd, &req.cwd)?;
    if paths.is_empty() {
        return Ok(());
    }

    match verb.as_str() {
        "touch" => touch(state, &req.user_id, &paths[0]).await,
        "mkdir" => mkdir(state, &req.user_id, &paths[0]).await,
        "rm" => rm(state, &req.user_id, &paths[0]).await,
        "mv" => {
            if paths.len() < 2 {
                return Ok(());
            }
            mv(state, &req.user_id, &paths[0], &paths[1]).await
        }
        "cp" | "cd" => Ok(()),
        _ => Ok(()),
    }
}

async fn touch(state: &AppState, user_id: &UserId, abs_path: &str) -> Result<()> {
    let rel = workspace_relative(abs_path);
    let (parent, leaf) = split_parent_leaf(&rel);
    let parent_id = ensure_dir_path(state, user_id, parent).await?;

    match sandbox_store::create_node(&state.pool, user_id, parent_id, leaf, false, Some("")).await {
        Ok(_) => {}
        Err(SandboxError::DuplicateName(_)) => {
            let (_, is_dir) = sandbox_store::resolve(&state.pool, user_id, &rel)
                .await?
                .ok_or_else(|| SandboxError::Internal("duplicate vanished on recheck".to_string()))?;
            if is_dir {
                return Err(SandboxError::Conflict(format!("{abs_path} is a directory")));
            }
        }
        Err(e) => return Err(e),
    }

    state
        .notify
        .publish(user_id, FileUpdateEvent::new("create", abs_path.to_string()));
    Ok(())
}

async fn mkdir(state: &AppState, user_id: &UserId, abs_path: &str) -> Result<()> {
    let rel = workspace_relative(abs_path);
    let (parent, leaf) = split_parent_leaf(&rel);
    let parent_id = ensure_dir_path(state, user_id, parent).await?;

    match sandbox_store::create_node(&state.pool, user_id, parent_id, leaf, true, None).await {
        Ok(_) => {}
        Err(SandboxError::DuplicateName(_)) => {
            let (_, is_dir) = sandbox_store::resolve(&state.pool, user_id, &rel)
                .await?
                .ok_or_else(|| SandboxError::Internal("duplicate vanished on recheck".to_string()))?;
            if !is_dir {
                return Err(SandboxError::Conflict(format!("{abs_path} is a file")));
            }
        }
        Err(e) => return Err(e),
    }

    state
        .notify
        .publish(user_id, FileUpdateEvent::new("create", abs_path.to_string()));
    Ok(())
}

async fn rm(state: &AppState, user_id: &UserId, abs_path: &str) -> Result<()> {
    let rel = workspace_relative(abs_path);
    let (id, _) = sandbox_store::resolve(&state.pool, user_id, &rel)
        .await?
        .ok_or_else(|| SandboxError::NotFound(format!("no node at {abs_path}")))?;

    sandbox_store::delete_node(&state.pool, user_id, id).await?;
    state
        .notify
        .publish(user_id, FileUpdateEvent::new("delete", abs_path.to_string()));
    Ok(())
}

async fn mv(state: &AppState, user_id: &UserId, src_abs: &str, dst_abs: &str) -> Result<()> {
    let src_rel = workspace_relative(src_abs);
    if dst_abs == src_abs || dst_abs.starts_with(&format!("{src_abs}/")) {
        return Err(SandboxError::Validation(format!(
            "cannot move {src_abs} into itself"
        )));
    }

    let (src_id, _) = sandbox_store::resolve(&state.pool, user_id, &src_rel)
        .await?
        .ok_or_else(|| SandboxError::NotFound(format!("no node at {src_abs}")))?;

    let dst_rel = workspace_relative(dst_abs);
    let dst_existing = sandbox_store::resolve(&state.pool, user_id, &dst_rel).await?;

    let (new_parent_rel, new_name) = match dst_existing {
        Some((_, true)) => (dst_rel.as_str(), leaf_name(&src_rel)),
        _ => {
            let (parent, leaf) = split_parent_leaf(&dst_rel);
            (parent, leaf)
        }
    };

    let new_parent_id = ensure_dir_path(state, user_id, new_parent_rel).await?;
    sandbox_store::move_node(&state.pool, user_id, src_id, new_parent_id, new_name).await?;

    let final_rel = if new_parent_rel.is_empty() {
        new_name.to_string()
    } else {
        format!("{new_parent_rel}/{new_name}")
    };
    let final_abs = format!("{WORKSPACE_ROOT}/{final_rel}");

    state
        .notify
        .publish(user_id, FileUpdateEvent::new("move", final_abs));
    Ok(())
}

fn leaf_name(rel_path: &str) -> &str {
    rel_path.rsplit('/').next().unwrap_or(rel_path)
}

fn split_parent_leaf(rel_path: &str) -> (&str, &str) {
    match rel_path.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", rel_path),
    }
}

/// Walks `rel_dir`'s segments from the root, creating each missing directory
/// (a duplicate-name insert is treated as "already there" and resolved by
/// lookup, per the spec's "retried as a lookup" note). Empty input means the
/// workspace root, i.e. no parent id.
async fn ensure_dir_path(state: &AppState, user_id: &UserId, rel_dir: &str) -> Result<Option<NodeId>> {
    if rel_dir.is_empty() {
        return Ok(None);
    }

    let mut parent_id: Option<NodeId> = None;
    let mut walked = String::new();

    for segment in rel_dir.split('/') {
        if !walked.is_empty() {
            walked.push('/');
        }
        walked.push_str(segment);

        match sandbox_store::create_node(&state.pool, user_id, parent_id, segment, true, None).await {
            Ok(node) => parent_id = Some(node.id),
            Err(SandboxError::DuplicateName(_)) => {
                let (id, is_dir) = sandbox_store::resolve(&state.pool, user_id, &walked)
                    .await?
                    .ok_or_else(|| SandboxError::Internal("duplicate vanished on recheck".to_string()))?;
                if !is_dir {
                    return Err(SandboxError::NotADirectory(walked.clone()));
                }
                parent_id = Some(id);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(parent_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relative_path_against_cwd() {
        assert_eq!(
            normalize_under_workspace("/workspace", "a.txt").unwrap(),
            "/workspace/a.txt"
        );
    }

    #[test]
    fn normalizes_nested_mkdir_path() {
        assert_eq!(
            normalize_under_workspace("/workspace", "a/b/c").unwrap(),
            "/workspace/a/b/c"
        );
    }

    #[test]
    fn rejects_path_escaping_workspace() {
        let err = normalize_under_workspace("/workspace", "../etc/passwd").unwrap_err();
        assert!(matches!(err, SandboxError::Validation(_)));
    }

    #[test]
    fn accepts_absolute_path_under_workspace() {
        assert_eq!(
            normalize_under_workspace("/workspace/sub", "/workspace/other/x.txt").unwrap(),
            "/workspace/other/x.txt"
        );
    }

    #[test]
    fn tokenize_drops_flags() {
        let (verb, paths) = tokenize("mkdir -p a/b/c", "/workspace").unwrap();
        assert_eq!(verb, "mkdir");
        assert_eq!(paths, vec!["/workspace/a/b/c".to_string()]);
    }

    #[test]
    fn tokenize_with_no_arguments_returns_empty_paths() {
        let (verb, paths) = tokenize("cd", "/workspace").unwrap();
        assert_eq!(verb, "cd");
        assert!(paths.is_empty());
    }

    #[test]
    fn workspace_relative_strips_prefix() {
        assert_eq!(workspace_relative("/workspace/a/b.txt"), "a/b.txt");
        assert_eq!(workspace_relative("/workspace"), "");
    }

    #[test]
    fn split_parent_leaf_handles_root_level_name() {
        assert_eq!(split_parent_leaf("a.txt"), ("", "a.txt"));
        assert_eq!(split_parent_leaf("a/b/c.txt"), ("a/b", "c.txt"));
    }
}
