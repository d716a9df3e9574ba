use crate::node::{FsNode, TreeNode};
use crate::retry::{store_err, with_reconnect};
use sandbox_types::{NodeId, Result, SandboxError, UserId};
use sqlx::SqlitePool;
use std::collections::HashMap;

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(SandboxError::Validation(format!(
            "invalid node name: {name:?}"
        )));
    }
    Ok(())
}

/// Fetches a node by id and confirms it belongs to `user_id`, distinguishing
/// a missing id from one that belongs to a different user (I2's `AccessDenied`).
async fn fetch_owned(pool: &SqlitePool, user_id: &UserId, id: NodeId) -> Result<FsNode> {
    let row: Option<FsNode> = with_reconnect(|| {
        sqlx::query_as::<_, FsNode>("SELECT * FROM fs_nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
    })
    .await?;

    match row {
        None => Err(SandboxError::NotFound(format!("node {id}"))),
        Some(n) if n.user_id != *user_id => Err(SandboxError::AccessDenied),
        Some(n) => Ok(n),
    }
}

/// Creates a file or directory node. Enforces I1 (sibling uniqueness) and I2
/// (parent must be a directory owned by the same user).
pub async fn create_node(
    pool: &SqlitePool,
    user_id: &UserId,
    parent_id: Option<NodeId>,
    name: &str,
    is_dir: bool,
    content: Option<&str>,
) -> Result<FsNode> {
    validate_name(name)?;

    if let Some(pid) = parent_id {
        let parent = fetch_owned(pool, user_id, pid).await?;
        if !parent.is_dir {
            return Err(SandboxError::NotADirectory(format!("node {pid}")));
        }
    }

    insert_node(pool, user_id, parent_id, name, is_dir, content).await
}

/// Runs the insert, reconnecting once on a connection-shaped failure and
/// classifying a sibling-name collision as [`SandboxError::DuplicateName`]
/// rather than the generic store error `with_reconnect` would otherwise produce.
async fn insert_node(
    pool: &SqlitePool,
    user_id: &UserId,
    parent_id: Option<NodeId>,
    name: &str,
    is_dir: bool,
    content: Option<&str>,
) -> Result<FsNode> {
    async fn attempt(
        pool: &SqlitePool,
        user_id: &UserId,
        parent_id: Option<NodeId>,
        name: &str,
        is_dir: bool,
        content: Option<&str>,
    ) -> std::result::Result<FsNode, sqlx::Error> {
        sqlx::query_as::<_, FsNode>(
            r#"
            INSERT INTO fs_nodes (user_id, parent_id, name, is_dir, content)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(parent_id)
        .bind(name)
        .bind(is_dir)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    let first = attempt(pool, user_id, parent_id, name, is_dir, content).await;
    let err = match first {
        Ok(n) => return Ok(n),
        Err(e) => e,
    };

    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return Err(SandboxError::DuplicateName(format!(
                "{name} already exists under parent {parent_id:?}"
            )));
        }
    }

    // Not a unique violation: treat as a possible dropped connection and
    // retry exactly once before giving up.
    attempt(pool, user_id, parent_id, name, is_dir, content)
        .await
        .map_err(store_err)
}

/// Moves a node to a new parent and/or gives it a new name. Used by the
/// FS-event intake's `mv` handling; the caller is responsible for rejecting
/// moves that would create a cycle (I5) before calling this.
pub async fn move_node(
    pool: &SqlitePool,
    user_id: &UserId,
    id: NodeId,
    new_parent_id: Option<NodeId>,
    new_name: &str,
) -> Result<FsNode> {
    validate_name(new_name)?;
    fetch_owned(pool, user_id, id).await?;

    if let Some(pid) = new_parent_id {
        let parent = fetch_owned(pool, user_id, pid).await?;
        if !parent.is_dir {
            return Err(SandboxError::NotADirectory(format!("node {pid}")));
        }
    }

    async fn attempt(
        pool: &SqlitePool,
        id: NodeId,
        new_parent_id: Option<NodeId>,
        new_name: &str,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE fs_nodes SET parent_id = ?, name = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(new_parent_id)
        .bind(new_name)
        .bind(id)
        .execute(pool)
        .await
        .map(|_| ())
    }

    if let Err(e) = attempt(pool, id, new_parent_id, new_name).await {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return Err(SandboxError::DuplicateName(format!(
                    "{new_name} already exists under parent {new_parent_id:?}"
                )));
            }
        }
        attempt(pool, id, new_parent_id, new_name)
            .await
            .map_err(store_err)?;
    }

    fetch_owned(pool, user_id, id).await
}

/// Deletes a node and, for a directory, all descendants (I3). Returns every
/// deleted id so callers can fan out notifications.
pub async fn delete_node(pool: &SqlitePool, user_id: &UserId, id: NodeId) -> Result<Vec<NodeId>> {
    fetch_owned(pool, user_id, id).await?;

    let ids: Vec<(NodeId,)> = with_reconnect(|| {
        sqlx::query_as::<_, (NodeId,)>(
            r#"
            WITH RECURSIVE sub(id) AS (
                SELECT id FROM fs_nodes WHERE id = ?
                UNION ALL
                SELECT f.id FROM fs_nodes f JOIN sub ON f.parent_id = sub.id
            )
            SELECT id FROM sub
            "#,
        )
        .bind(id)
        .fetch_all(pool)
    })
    .await?;

    with_reconnect(|| {
        sqlx::query("DELETE FROM fs_nodes WHERE id = ?")
            .bind(id)
            .execute(pool)
    })
    .await?;

    Ok(ids.into_iter().map(|(i,)| i).collect())
}

/// Overwrites a file's content. Errors if `id` names a directory.
pub async fn update_content(
    pool: &SqlitePool,
    user_id: &UserId,
    id: NodeId,
    text: &str,
) -> Result<FsNode> {
    let node = fetch_owned(pool, user_id, id).await?;
    if node.is_dir {
        return Err(SandboxError::NotADirectory(format!("node {id}")));
    }

    with_reconnect(|| {
        sqlx::query(
            r#"
            UPDATE fs_nodes SET content = ?, updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(text)
        .bind(id)
        .execute(pool)
    })
    .await?;

    fetch_owned(pool, user_id, id).await
}

/// Builds the `/`-joined path of `id` from the user's virtual root.
pub async fn path_of(pool: &SqlitePool, user_id: &UserId, id: NodeId) -> Result<String> {
    let mut segments = Vec::new();
    let mut current = Some(id);

    while let Some(cur_id) = current {
        let node = fetch_owned(pool, user_id, cur_id).await?;
        segments.push(node.name);
        current = node.parent_id;
    }

    segments.reverse();
    Ok(segments.join("/"))
}

/// Fetches the full rooted tree for a user, siblings ordered directories
/// first then by name ascending.
pub async fn tree(pool: &SqlitePool, user_id: &UserId) -> Result<Vec<TreeNode>> {
    let rows: Vec<FsNode> = with_reconnect(|| {
        sqlx::query_as::<_, FsNode>(
            "SELECT * FROM fs_nodes WHERE user_id = ? ORDER BY is_dir DESC, name ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
    })
    .await?;

    let mut nodes: HashMap<NodeId, TreeNode> = HashMap::new();
    let mut children_of: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();

    for row in &rows {
        nodes.insert(row.id, TreeNode::leaf(row));
        children_of.entry(row.parent_id).or_default().push(row.id);
    }

    fn assemble(
        id: NodeId,
        nodes: &mut HashMap<NodeId, TreeNode>,
        children_of: &HashMap<Option<NodeId>, Vec<NodeId>>,
    ) -> TreeNode {
        let mut node = nodes.remove(&id).expect("node present during assembly");
        if let Some(child_ids) = children_of.get(&Some(id)) {
            for &cid in child_ids {
                node.children.push(assemble(cid, nodes, children_of));
            }
        }
        node
    }

    let root_ids = children_of.get(&None).cloned().unwrap_or_default();
    let mut roots = Vec::with_capacity(root_ids.len());
    for id in root_ids {
        roots.push(assemble(id, &mut nodes, &children_of));
    }
    Ok(roots)
}

/// Resolves a workspace-relative path (no leading `/workspace`) to its node
/// id and kind, requiring every non-terminal segment to be a directory.
pub async fn resolve(
    pool: &SqlitePool,
    user_id: &UserId,
    path: &str,
) -> Result<Option<(NodeId, bool)>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Ok(None);
    }

    let mut parent_id: Option<NodeId> = None;
    let mut found: Option<(NodeId, bool)> = None;

    for (i, seg) in segments.iter().enumerate() {
        let row: Option<(NodeId, bool)> = with_reconnect(|| {
            let query = if let Some(pid) = parent_id {
                sqlx::query_as::<_, (NodeId, bool)>(
                    "SELECT id, is_dir FROM fs_nodes WHERE user_id = ? AND parent_id = ? AND name = ?",
                )
                .bind(user_id)
                .bind(pid)
                .bind(*seg)
            } else {
                sqlx::query_as::<_, (NodeId, bool)>(
                    "SELECT id, is_dir FROM fs_nodes WHERE user_id = ? AND parent_id IS NULL AND name = ?",
                )
                .bind(user_id)
                .bind(*seg)
            };
            query.fetch_optional(pool)
        })
        .await?;

        match row {
            None => return Ok(None),
            Some((id, is_dir)) => {
                if i + 1 < segments.len() && !is_dir {
                    return Err(SandboxError::NotADirectory(seg.to_string()));
                }
                parent_id = Some(id);
                found = Some((id, is_dir));
            }
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqlitePool {
        crate::init_db("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_and_resolve_round_trip() {
        let pool = setup().await;
        let user = "alice".to_string();

        let dir = create_node(&pool, &user, None, "a", true, None)
            .await
            .unwrap();
        let file = create_node(&pool, &user, Some(dir.id), "b.txt", false, Some("hi"))
            .await
            .unwrap();

        let resolved = resolve(&pool, &user, "a/b.txt").await.unwrap();
        assert_eq!(resolved, Some((file.id, false)));

        delete_node(&pool, &user, file.id).await.unwrap();
        assert_eq!(resolve(&pool, &user, "a/b.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_sibling_name_is_rejected() {
        let pool = setup().await;
        let user = "bob".to_string();

        create_node(&pool, &user, None, "a.txt", false, None)
            .await
            .unwrap();
        let err = create_node(&pool, &user, None, "a.txt", false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn two_users_can_share_a_root_name() {
        let pool = setup().await;
        create_node(&pool, &"alice".to_string(), None, "main.py", false, None)
            .await
            .unwrap();
        create_node(&pool, &"bob".to_string(), None, "main.py", false, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_directory_cascades_to_descendants() {
        let pool = setup().await;
        let user = "carol".to_string();

        let a = create_node(&pool, &user, None, "a", true, None).await.unwrap();
        let b = create_node(&pool, &user, Some(a.id), "b", true, None)
            .await
            .unwrap();
        let c = create_node(&pool, &user, Some(b.id), "c.txt", false, Some("x"))
            .await
            .unwrap();

        let deleted = delete_node(&pool, &user, a.id).await.unwrap();
        assert_eq!(deleted.len(), 3);
        assert!(deleted.contains(&a.id));
        assert!(deleted.contains(&b.id));
        assert!(deleted.contains(&c.id));

        assert_eq!(resolve(&pool, &user, "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tree_orders_directories_before_files_then_by_name() {
        let pool = setup().await;
        let user = "dan".to_string();

        create_node(&pool, &user, None, "z.txt", false, None).await.unwrap();
        create_node(&pool, &user, None, "a_dir", true, None).await.unwrap();
        create_node(&pool, &user, None, "b.txt", false, None).await.unwrap();

        let roots = tree(&pool, &user).await.unwrap();
        let names: Vec<&str> = roots.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a_dir", "b.txt", "z.txt"]);
    }

    #[tokio::test]
    async fn parent_must_be_a_directory() {
        let pool = setup().await;
        let user = "erin".to_string();
        let file = create_node(&pool, &user, None, "f.txt", false, None)
            .await
            .unwrap();

        let err = create_node(&pool, &user, Some(file.id), "x", false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn foreign_id_is_access_denied_not_not_found() {
        let pool = setup().await;
        let owner = create_node(&pool, &"frank".to_string(), None, "f.txt", false, None)
            .await
            .unwrap();

        let err = delete_node(&pool, &"mallory".to_string(), owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::AccessDenied));
    }

    #[tokio::test]
    async fn move_node_changes_parent_and_name() {
        let pool = setup().await;
        let user = "heidi".to_string();

        let src_dir = create_node(&pool, &user, None, "src", true, None).await.unwrap();
        let dst_dir = create_node(&pool, &user, None, "dst", true, None).await.unwrap();
        let file = create_node(&pool, &user, Some(src_dir.id), "f.txt", false, Some("x"))
            .await
            .unwrap();

        move_node(&pool, &user, file.id, Some(dst_dir.id), "g.txt")
            .await
            .unwrap();

        assert_eq!(resolve(&pool, &user, "src/f.txt").await.unwrap(), None);
        let moved = resolve(&pool, &user, "dst/g.txt").await.unwrap();
        assert_eq!(moved.map(|(_, is_dir)| is_dir), Some(false));
    }

    #[tokio::test]
    async fn path_of_joins_ancestor_names() {
        let pool = setup().await;
        let user = "gina".to_string();
        let a = create_node(&pool, &user, None, "a", true, None).await.unwrap();
        let b = create_node(&pool, &user, Some(a.id), "b.txt", false, None)
            .await
            .unwrap();

        assert_eq!(path_of(&pool, &user, b.id).await.unwrap(), "a/b.txt");
    }
}
