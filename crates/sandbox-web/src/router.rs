use crate::state::AppState;
use crate::{files, intake, notify_ws, run, terminal};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the full HTTP/WS surface from §6, CORS-enabled per the external
/// interface contract.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/terminal/start", post(terminal::start_terminal))
        .route(
            "/terminal/:sid",
            get(terminal::terminal_status).delete(terminal::end_terminal),
        )
        .route("/terminal/cleanup/:user_id", post(terminal::cleanup_user))
        .route("/terminal/ws/:sid", get(terminal::terminal_ws))
        .route("/api/fs-event", post(intake::fs_event_handler))
        .route("/api/files/:sid/*name", get(files::get_file))
        .route("/api/files/:file_id", put(files::put_file))
        .route("/run", post(run::run_file))
        .route("/db_update/ws/:user_id", get(notify_ws::notify_ws))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
