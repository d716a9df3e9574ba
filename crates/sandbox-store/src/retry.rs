//! Transparent one-shot reconnect for store operations.
//!
//! The specification requires every store operation to "transparently
//! reconnect once before failing" if the pool's connection was lost. `sqlx`'s
//! pool already redials lazily on the next `acquire`, so the retry here is a
//! thin belt-and-braces wrapper: on a connection-shaped error we re-run the
//! closure exactly once before surfacing [`sandbox_types::SandboxError::Store`].

use sandbox_types::SandboxError;
use std::future::Future;
use tracing::warn;

pub(crate) async fn with_reconnect<T, F, Fut>(mut op: F) -> Result<T, SandboxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    match op().await {
        Ok(v) => Ok(v),
        Err(e) if is_connection_error(&e) => {
            warn!("store connection dropped ({e}), reconnecting once");
            op().await.map_err(store_err)
        }
        Err(e) => Err(store_err(e)),
    }
}

fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut
    )
}

pub(crate) fn store_err(err: sqlx::Error) -> SandboxError {
    SandboxError::Store(err.to_string())
}
