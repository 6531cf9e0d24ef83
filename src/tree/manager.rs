//! Goal-tree operations
//!
//! Validates requests, attaches follow-up questions to new children and
//! delegates persistence to the `TreeStore`.

use super::models::*;
use super::traits::TreeStore;
use crate::question::validate::{normalize, normalize_plain_text};
use crate::question::{QuestionError, QuestionOrchestrator, QuestionOutcome};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Errors of tree operations
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("title must be 3-20 characters")]
    InvalidTitle,
    #[error("content must be 1-200 characters")]
    InvalidContent,
    #[error("relation label must be at most 20 characters")]
    InvalidLabel,
    #[error("order index must be non-negative, got {0}")]
    InvalidOrderIndex(i32),
    #[error("order index {0} is already used under this parent")]
    OrderIndexTaken(i32),
    #[error("invalid reorder: {0}")]
    InvalidReorder(String),
    #[error("project not found: {0}")]
    ProjectNotFound(Uuid),
    #[error("node not found: {0}")]
    NodeNotFound(Uuid),
    #[error("edge not found: {0}")]
    EdgeNotFound(Uuid),
    #[error("parent node not found: {0}")]
    ParentNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<QuestionError> for TreeError {
    fn from(err: QuestionError) -> Self {
        match err {
            QuestionError::ParentNotFound(id) => Self::ParentNotFound(id),
            QuestionError::Store(e) => Self::Store(e),
        }
    }
}

/// Manager for tree operations
pub struct NodeManager {
    store: Arc<dyn TreeStore>,
    questions: Arc<QuestionOrchestrator>,
}

impl NodeManager {
    /// Create a new node manager
    pub fn new(store: Arc<dyn TreeStore>, questions: Arc<QuestionOrchestrator>) -> Self {
        Self { store, questions }
    }

    // ========================================================================
    // Project operations
    // ========================================================================

    /// Create a project with its root node (the title becomes the root content)
    pub async fn create_project(&self, req: CreateProjectRequest) -> Result<TreeResponse, TreeError> {
        let title = validate_title(&req.title)?;
        let description = clean_description(req.description);

        let project = Project::new(title.clone(), description);
        let root = Node::new(project.id, title, None);
        let root_edge = Edge::new(project.id, None, root.id, RelationType::Neutral, None, 0);
        self.store.create_project(&project, &root, &root_edge).await?;

        info!(project_id = %project.id, title = %project.title, "project created");
        Ok(TreeResponse {
            project,
            nodes: vec![root],
            edges: vec![root_edge],
        })
    }

    /// List all projects
    pub async fn list_projects(&self) -> Result<Vec<Project>, TreeError> {
        Ok(self.store.list_projects().await?)
    }

    /// Get one project
    pub async fn get_project(&self, project_id: Uuid) -> Result<Project, TreeError> {
        self.require_project(project_id).await
    }

    /// Change title, description and/or archived state.
    ///
    /// The root node keeps its content; the title is only the project's name.
    pub async fn update_project(
        &self,
        project_id: Uuid,
        req: UpdateProjectRequest,
    ) -> Result<Project, TreeError> {
        let title = req.title.as_deref().map(validate_title).transpose()?;
        let mut project = self.require_project(project_id).await?;

        if let Some(title) = title {
            project.title = title;
        }
        if req.description.is_some() {
            project.description = clean_description(req.description);
        }
        match req.archived {
            Some(true) if project.archived_at.is_none() => project.archived_at = Some(Utc::now()),
            Some(false) => project.archived_at = None,
            _ => {}
        }
        project.updated_at = Utc::now();

        if !self.store.update_project(&project).await? {
            return Err(TreeError::ProjectNotFound(project_id));
        }
        info!(project_id = %project.id, title = %project.title, "project updated");
        Ok(project)
    }

    /// Mark a project as saved: bumps updated_at only
    pub async fn save_project(&self, project_id: Uuid) -> Result<Project, TreeError> {
        self.require_project(project_id).await?;
        self.store.touch_project(project_id).await?;
        self.require_project(project_id).await
    }

    /// Full tree of a project: live nodes and the edges that point at them
    pub async fn get_tree(&self, project_id: Uuid) -> Result<TreeResponse, TreeError> {
        let project = self.require_project(project_id).await?;
        let snapshot = self.store.snapshot(project_id).await?;
        let live: HashSet<Uuid> = snapshot.nodes.iter().map(|n| n.id).collect();
        let edges = snapshot
            .edges
            .into_iter()
            .filter(|e| live.contains(&e.child_node_id))
            .collect();
        Ok(TreeResponse {
            project,
            nodes: snapshot.nodes,
            edges,
        })
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    /// Add a node under `req.parent_node_id` (or as a root).
    ///
    /// Only children carry a question. An explicit `req.question` with a
    /// non-empty body is normalized and used as-is; otherwise the orchestrator
    /// picks one. Roots never get a question. The question is never changed
    /// afterwards.
    pub async fn create_node(
        &self,
        project_id: Uuid,
        req: CreateNodeRequest,
        cancel: &CancellationToken,
    ) -> Result<CreatedNode, TreeError> {
        self.require_project(project_id).await?;
        let content = validate_content(&req.content)?;
        let relation_label = validate_label(req.relation_label.as_deref())?;

        if let Some(parent_id) = req.parent_node_id {
            match self.store.get_node(parent_id).await? {
                Some(parent) if parent.project_id == project_id => {}
                _ => return Err(TreeError::ParentNotFound(parent_id)),
            }
        }

        let order_index = match req.order_index {
            Some(index) => {
                self.check_order_index(project_id, req.parent_node_id, index)
                    .await?;
                index
            }
            None => {
                self.store
                    .next_order_index(project_id, req.parent_node_id)
                    .await?
            }
        };

        let question = match req.parent_node_id {
            Some(parent_id) => match explicit_question(req.question.as_deref()) {
                Some(question) => Some(question),
                None => self
                    .questions
                    .question_for_child(project_id, Some(parent_id), cancel)
                    .await?
                    .map(|outcome| outcome.question),
            },
            None => None,
        };

        let node = Node::new(project_id, content, question);
        let edge = Edge::new(
            project_id,
            req.parent_node_id,
            node.id,
            req.relation.unwrap_or_default(),
            relation_label,
            order_index,
        );
        self.store.create_node(&node, &edge).await?;
        self.store.touch_project(project_id).await?;

        info!(
            node_id = %node.id,
            parent_id = ?req.parent_node_id,
            question = ?node.question,
            "node created"
        );
        Ok(CreatedNode { node, edge })
    }

    /// Change a node's content. The attached question is left untouched.
    pub async fn update_node(
        &self,
        project_id: Uuid,
        node_id: Uuid,
        req: UpdateNodeRequest,
    ) -> Result<Node, TreeError> {
        let content = validate_content(&req.content)?;
        self.require_node(project_id, node_id).await?;

        if !self.store.update_node_content(node_id, &content).await? {
            return Err(TreeError::NodeNotFound(node_id));
        }
        self.store.touch_project(project_id).await?;
        self.require_node(project_id, node_id).await
    }

    /// Soft-delete a node and all its descendants. Returns how many were marked.
    pub async fn delete_node(&self, project_id: Uuid, node_id: Uuid) -> Result<usize, TreeError> {
        self.require_node(project_id, node_id).await?;
        let marked = self.store.soft_delete_subtree(project_id, node_id).await?;
        self.store.touch_project(project_id).await?;
        info!(node_id = %node_id, marked, "node subtree deleted");
        Ok(marked)
    }

    /// Preview the question a new child of `node_id` would receive. Nothing is persisted.
    pub async fn preview_question(
        &self,
        project_id: Uuid,
        node_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<QuestionOutcome, TreeError> {
        self.require_project(project_id).await?;
        self.questions
            .question_for_child(project_id, Some(node_id), cancel)
            .await?
            .ok_or(TreeError::NodeNotFound(node_id))
    }

    // ========================================================================
    // Edge operations
    // ========================================================================

    /// Change an edge's relation and/or label
    pub async fn update_edge(
        &self,
        project_id: Uuid,
        edge_id: Uuid,
        req: UpdateEdgeRequest,
    ) -> Result<Edge, TreeError> {
        let label = match req.relation_label.as_deref() {
            Some(raw) => Some(validate_label(Some(raw))?.unwrap_or_default()),
            None => None,
        };
        self.require_edge(project_id, edge_id).await?;

        if !self.store.update_edge(edge_id, req.relation, label).await? {
            return Err(TreeError::EdgeNotFound(edge_id));
        }
        self.store.touch_project(project_id).await?;
        self.require_edge(project_id, edge_id).await
    }

    /// Rewrite the order of one parent's children.
    ///
    /// `ordered_child_node_ids` must list each current child of the parent exactly once.
    pub async fn reorder(&self, project_id: Uuid, req: ReorderRequest) -> Result<(), TreeError> {
        self.require_project(project_id).await?;
        let snapshot = self.store.snapshot(project_id).await?;
        let live: HashSet<Uuid> = snapshot.nodes.iter().map(|n| n.id).collect();
        let children: HashSet<Uuid> = snapshot
            .edges
            .iter()
            .filter(|e| e.parent_node_id == req.parent_node_id && live.contains(&e.child_node_id))
            .map(|e| e.child_node_id)
            .collect();

        let requested: HashSet<Uuid> = req.ordered_child_node_ids.iter().copied().collect();
        if requested.len() != req.ordered_child_node_ids.len() {
            return Err(TreeError::InvalidReorder("duplicate node ids".to_string()));
        }
        if requested != children {
            return Err(TreeError::InvalidReorder(
                "ids must match the current children exactly".to_string(),
            ));
        }

        self.store
            .reorder_children(project_id, req.parent_node_id, &req.ordered_child_node_ids)
            .await?;
        self.store.touch_project(project_id).await?;
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    async fn require_project(&self, project_id: Uuid) -> Result<Project, TreeError> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or(TreeError::ProjectNotFound(project_id))
    }

    /// A caller-chosen order index must be non-negative and free under its parent
    async fn check_order_index(
        &self,
        project_id: Uuid,
        parent_node_id: Option<Uuid>,
        index: i32,
    ) -> Result<(), TreeError> {
        if index < 0 {
            return Err(TreeError::InvalidOrderIndex(index));
        }
        let snapshot = self.store.snapshot(project_id).await?;
        let live: HashSet<Uuid> = snapshot.nodes.iter().map(|n| n.id).collect();
        let taken = snapshot.edges.iter().any(|e| {
            e.parent_node_id == parent_node_id
                && e.order_index == index
                && live.contains(&e.child_node_id)
        });
        if taken {
            return Err(TreeError::OrderIndexTaken(index));
        }
        Ok(())
    }

    async fn require_node(&self, project_id: Uuid, node_id: Uuid) -> Result<Node, TreeError> {
        self.store
            .get_node(node_id)
            .await?
            .filter(|n| n.project_id == project_id)
            .ok_or(TreeError::NodeNotFound(node_id))
    }

    async fn require_edge(&self, project_id: Uuid, edge_id: Uuid) -> Result<Edge, TreeError> {
        self.store
            .get_edge(edge_id)
            .await?
            .filter(|e| e.project_id == project_id)
            .ok_or(TreeError::EdgeNotFound(edge_id))
    }
}

/// Normalized explicit question, or None when it has no body
fn explicit_question(raw: Option<&str>) -> Option<String> {
    raw.map(normalize)
        .filter(|q| !normalize_plain_text(q).is_empty())
}

fn validate_title(raw: &str) -> Result<String, TreeError> {
    let title = raw.trim();
    let len = title.chars().count();
    if !(MIN_PROJECT_TITLE_CHARS..=MAX_PROJECT_TITLE_CHARS).contains(&len) {
        return Err(TreeError::InvalidTitle);
    }
    Ok(title.to_string())
}

fn clean_description(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

fn validate_content(raw: &str) -> Result<String, TreeError> {
    let content = raw.trim();
    let len = content.chars().count();
    if len == 0 || len > MAX_CONTENT_CHARS {
        return Err(TreeError::InvalidContent);
    }
    Ok(content.to_string())
}

/// Trimmed label; blank means no label
fn validate_label(raw: Option<&str>) -> Result<Option<String>, TreeError> {
    let Some(label) = raw.map(str::trim).filter(|l| !l.is_empty()) else {
        return Ok(None);
    };
    if label.chars().count() > MAX_RELATION_LABEL_CHARS {
        return Err(TreeError::InvalidLabel);
    }
    Ok(Some(label.to_string()))
}
