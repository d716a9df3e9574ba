use sandbox_types::NodeId;
use serde::{Deserialize, Serialize};

/// A row of the `fs_nodes` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct FsNode {
    pub id: NodeId,
    pub user_id: String,
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub is_dir: bool,
    pub content: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A node with its children assembled, as returned by [`crate::tree`].
///
/// Siblings are ordered directories-first then by name ascending, matching
/// the original implementation's `ORDER BY is_dir DESC, name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: String,
    pub is_dir: bool,
    pub content: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub(crate) fn leaf(node: &FsNode) -> Self {
        TreeNode {
            id: node.id,
            name: node.name.clone(),
            is_dir: node.is_dir,
            content: node.content.clone(),
            children: Vec::new(),
        }
    }
}
