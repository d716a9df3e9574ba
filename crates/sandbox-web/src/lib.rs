//! HTTP/WS API (C8), composing the session manager (C4), PTY bridge (C5),
//! FS-event intake (C6), and notification bus (C7) behind one axum router.

pub mod config;
mod error;
pub mod files;
pub mod intake;
pub mod notify;
mod notify_ws;
mod router;
pub mod run;
pub mod state;
pub mod terminal;

pub use config::Config;
pub use notify::NotifyBus;
pub use router::build_router;
pub use state::AppState;
