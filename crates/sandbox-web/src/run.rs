//! `POST /run` — execute a workspace file inside the user's container and
//! report its exit status and combined output. The seeded starter file is
//! `main.py` (see `sandbox-materializer`'s `seed`), so this runs everything
//! through `python3`, matching the original source's Python-only runner.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use sandbox_types::{SandboxError, WORKSPACE_ROOT};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct RunRequest {
    pub user_id: String,
    pub file_path: String,
    pub working_dir: Option<String>,
}

#[derive(Serialize)]
pub struct RunResponse {
    pub exit_code: i64,
    pub output: String,
}

pub async fn run_file(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let session = state
        .sessions
        .sessions_for_user(&req.user_id)
        .into_iter()
        .next()
        .ok_or_else(|| SandboxError::NotFound(format!("no container for user {}", req.user_id)))?;

    let working_dir = req.working_dir.unwrap_or_else(|| WORKSPACE_ROOT.to_string());
    let script = format!(
        "cd '{}' && python3 '{}' 2>&1",
        working_dir.replace('\'', "'\\''"),
        req.file_path.replace('\'', "'\\''")
    );

    let handle = session.handle();
    let (exit_code, output) = state
        .sessions
        .driver()
        .exec_oneshot(&handle, &["sh", "-c", &script])
        .await?;

    Ok(Json(RunResponse {
        exit_code,
        output: String::from_utf8_lossy(&output).into_owned(),
    }))
}
