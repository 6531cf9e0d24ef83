//! TreeStore trait definition
//!
//! Abstract persistence interface for projects, nodes and edges.
//! Follows the store pattern used across the crate: async trait + Send + Sync
//! so it can be shared as `Arc<dyn TreeStore>`.

use crate::tree::models::*;
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Abstract interface for goal-tree persistence.
///
/// Reads never return soft-deleted nodes. Edges are returned regardless of
/// whether their child was deleted; callers resolve them against the node set.
#[async_trait]
pub trait TreeStore: Send + Sync {
    // ========================================================================
    // Project operations
    // ========================================================================

    /// Create a project together with its root node and root edge
    async fn create_project(&self, project: &Project, root: &Node, root_edge: &Edge)
        -> Result<()>;

    /// Get a project by ID
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>>;

    /// List all projects, most recently updated first
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Replace a project's stored fields. Returns false if it does not exist.
    async fn update_project(&self, project: &Project) -> Result<bool>;

    /// Bump a project's updated_at timestamp
    async fn touch_project(&self, id: Uuid) -> Result<()>;

    // ========================================================================
    // Node operations
    // ========================================================================

    /// Persist a node and its incoming edge together
    async fn create_node(&self, node: &Node, edge: &Edge) -> Result<()>;

    /// Get a non-deleted node by ID
    async fn get_node(&self, id: Uuid) -> Result<Option<Node>>;

    /// List the non-deleted nodes of a project
    async fn list_nodes(&self, project_id: Uuid) -> Result<Vec<Node>>;

    /// Replace a node's content. Returns false if the node does not exist.
    async fn update_node_content(&self, id: Uuid, content: &str) -> Result<bool>;

    /// Soft-delete a node and every descendant. Returns the number of nodes marked.
    async fn soft_delete_subtree(&self, project_id: Uuid, node_id: Uuid) -> Result<usize>;

    // ========================================================================
    // Edge operations
    // ========================================================================

    /// List the edges of a project ordered by order_index
    async fn list_edges(&self, project_id: Uuid) -> Result<Vec<Edge>>;

    /// Get an edge by ID
    async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>>;

    /// Update relation and/or label. Returns false if the edge does not exist.
    async fn update_edge(
        &self,
        id: Uuid,
        relation: Option<RelationType>,
        relation_label: Option<String>,
    ) -> Result<bool>;

    /// Next free order_index under a parent (0 when the scope is empty)
    async fn next_order_index(&self, project_id: Uuid, parent_node_id: Option<Uuid>)
        -> Result<i32>;

    /// Rewrite order_index of the listed children to their position in the list
    async fn reorder_children(
        &self,
        project_id: Uuid,
        parent_node_id: Option<Uuid>,
        ordered_child_node_ids: &[Uuid],
    ) -> Result<()>;

    /// Snapshot of a project's tree: non-deleted nodes and all edges
    async fn snapshot(&self, project_id: Uuid) -> Result<TreeSnapshot> {
        Ok(TreeSnapshot {
            nodes: self.list_nodes(project_id).await?,
            edges: self.list_edges(project_id).await?,
        })
    }
}
