//! Editor file read/write — part of C8's HTTP surface.

use crate::error::ApiError;
use crate::notify::FileUpdateEvent;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use sandbox_types::{NodeId, SandboxError, WORKSPACE_ROOT};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct FileContentResponse {
    pub content: String,
}

/// `GET /api/files/{sid}/{name}`: `name` is the workspace-relative file path.
pub async fn get_file(
    State(state): State<AppState>,
    Path((sid, name)): Path<(String, String)>,
) -> Result<Json<FileContentResponse>, ApiError> {
    let session = state
        .sessions
        .lookup(&sid)
        .ok_or_else(|| SandboxError::NotFound(format!("session {sid}")))?;

    let (id, is_dir) = sandbox_store::resolve(&state.pool, &session.user_id, &name)
        .await?
        .ok_or_else(|| SandboxError::NotFound(format!("no file at {name}")))?;
    if is_dir {
        return Err(SandboxError::NotADirectory(name).into());
    }

    let content = fetch_content(&state, &session.user_id, id).await?;
    Ok(Json(FileContentResponse { content }))
}

async fn fetch_content(state: &AppState, user_id: &str, id: NodeId) -> Result<String, ApiError> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT content FROM fs_nodes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&state.pool)
            .await
            .map_err(|e| SandboxError::Store(e.to_string()))?;

    Ok(row.and_then(|(c,)| c).unwrap_or_default())
}

#[derive(Deserialize)]
pub struct PutFileRequest {
    pub content: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "filePath")]
    #[allow(dead_code)]
    pub file_path: Option<String>,
}

#[derive(Serialize)]
pub struct PutFileResponse {
    pub status: &'static str,
}

/// `PUT /api/files/{file_id}`. The source trusted `userId` from the request
/// body outright; here it is cross-checked against a currently tracked
/// session before the write is honored (see `DESIGN.md`).
pub async fn put_file(
    State(state): State<AppState>,
    Path(file_id): Path<NodeId>,
    Json(req): Json<PutFileRequest>,
) -> Result<Json<PutFileResponse>, ApiError> {
    if !state.sessions.has_session_for_user(&req.user_id) {
        return Err(SandboxError::NotFound(format!("no container for user {}", req.user_id)).into());
    }

    let node = sandbox_store::update_content(&state.pool, &req.user_id, file_id, &req.content).await?;
    let rel = sandbox_store::path_of(&state.pool, &req.user_id, file_id).await?;
    let abs = format!("{WORKSPACE_ROOT}/{rel}");

    if let Some(session) = state.sessions.sessions_for_user(&req.user_id).into_iter().next() {
        let handle = session.handle();
        if let Err(e) = sandbox_materializer::push_file(
            state.sessions.driver(),
            &handle,
            &abs,
            node.content.as_deref().unwrap_or("").as_bytes(),
        )
        .await
        {
            tracing::warn!("push_file failed for {abs}: {e}");
        }
    }

    state.notify.publish(&req.user_id, FileUpdateEvent::new("create", abs));
    Ok(Json(PutFileResponse { status: "success" }))
}
