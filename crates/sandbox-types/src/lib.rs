//! Shared error taxonomy and identifiers used across the sandbox backend crates.
//!
//! Every crate boundary that can fail (tree store, container driver, session
//! manager, HTTP/WS API) reports errors through [`SandboxError`], which
//! carries the classification from the specification's error design: the
//! HTTP layer maps each variant to a status code via [`SandboxError::http_status`].

use std::fmt;

/// Opaque user identifier presented by the (out-of-scope) authentication layer.
pub type UserId = String;

/// A freshly minted, unpersisted session token authorizing one terminal WebSocket.
pub type SessionId = String;

/// Surrogate id of a row in the `fs_nodes` table.
pub type NodeId = i64;

/// Unified error type for the sandbox backend.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("access denied")]
    AccessDenied,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("container unavailable: {0}")]
    ContainerUnavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SandboxError {
    /// Maps the error to the HTTP status code prescribed by the error taxonomy.
    pub fn http_status(&self) -> u16 {
        match self {
            SandboxError::Validation(_) => 400,
            SandboxError::NotFound(_) => 404,
            SandboxError::DuplicateName(_) | SandboxError::Conflict(_) => 409,
            SandboxError::NotADirectory(_) => 409,
            SandboxError::AccessDenied => 403,
            SandboxError::ContainerUnavailable(_) => 503,
            SandboxError::Transport(_) => 502,
            SandboxError::Store(_) => 502,
            SandboxError::Internal(_) => 500,
        }
    }

    /// Whether the failing operation may succeed if retried once more.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SandboxError::Transport(_) | SandboxError::Store(_))
    }
}

/// Convenience alias for `Result<T, SandboxError>`.
pub type Result<T> = std::result::Result<T, SandboxError>;

/// A node's path, always rooted at [`WORKSPACE_ROOT`] and `/`-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePath(String);

/// The fixed workspace root inside every managed container.
pub const WORKSPACE_ROOT: &str = "/workspace";

impl WorkspacePath {
    /// Builds a workspace path from path segments (no leading/trailing slash, no `.`/`..`).
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = String::from(WORKSPACE_ROOT);
        for seg in segments {
            out.push('/');
            out.push_str(seg.as_ref());
        }
        WorkspacePath(out)
    }

    pub fn root() -> Self {
        WorkspacePath(WORKSPACE_ROOT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_matches_taxonomy() {
        assert_eq!(SandboxError::Validation("x".into()).http_status(), 400);
        assert_eq!(SandboxError::NotFound("x".into()).http_status(), 404);
        assert_eq!(SandboxError::DuplicateName("x".into()).http_status(), 409);
        assert_eq!(SandboxError::ContainerUnavailable("x".into()).http_status(), 503);
        assert_eq!(SandboxError::Transport("x".into()).http_status(), 502);
        assert_eq!(SandboxError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn workspace_path_joins_segments() {
        let p = WorkspacePath::from_segments(["a", "b", "c.txt"]);
        assert_eq!(p.as_str(), "/workspace/a/b/c.txt");
        assert_eq!(WorkspacePath::root().as_str(), "/workspace");
    }
}
