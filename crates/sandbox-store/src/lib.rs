//! Relational persistence of the per-user virtual file tree.
//!
//! Canonical state of every user's directories and files lives here, in a
//! SQLite database reached through [`sqlx`]. The [`Materializer`](../sandbox_materializer)
//! and the FS-event intake both mutate this store; the container's
//! `/workspace` is a projection of it, never the other way around.

mod node;
mod ops;
mod retry;

pub use node::{FsNode, TreeNode};
pub use ops::{create_node, delete_node, move_node, path_of, resolve, tree, update_content};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Open (creating if absent) the SQLite database at `database_url` and run
/// idempotent schema creation.
///
/// `database_url` is expected in `sqlite:<path>` form, e.g. `sqlite://sandbox.db`
/// or `sqlite::memory:` for tests.
pub async fn init_db(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fs_nodes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     TEXT    NOT NULL,
            parent_id   INTEGER REFERENCES fs_nodes(id) ON DELETE CASCADE,
            name        TEXT    NOT NULL,
            is_dir      INTEGER NOT NULL,
            content     TEXT,
            created_at  TEXT    NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT    NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // SQLite treats every NULL as distinct under a plain UNIQUE constraint,
    // so a single `unique(user_id, parent_id, name)` index would let two
    // root-level nodes share a name. Two partial indexes close that gap
    // while still enforcing I1 for both root children and nested children.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS fs_nodes_root_unique
        ON fs_nodes(user_id, name)
        WHERE parent_id IS NULL
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS fs_nodes_child_unique
        ON fs_nodes(user_id, parent_id, name)
        WHERE parent_id IS NOT NULL
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_db_is_idempotent() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        // Running schema creation twice against the same pool must not fail.
        let pool2 = pool.clone();
        init_db_on(&pool2).await.unwrap();
    }

    async fn init_db_on(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS fs_nodes_probe (id INTEGER PRIMARY KEY)")
            .execute(pool)
            .await?;
        Ok(())
    }
}
