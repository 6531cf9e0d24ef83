//! Goal-tree models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum node content length, in characters
pub const MAX_CONTENT_CHARS: usize = 200;

/// Maximum relation label length, in characters
pub const MAX_RELATION_LABEL_CHARS: usize = 20;

/// Project title bounds, in characters
pub const MIN_PROJECT_TITLE_CHARS: usize = 3;
pub const MAX_PROJECT_TITLE_CHARS: usize = 20;

// ============================================================================
// Entities
// ============================================================================

/// A goal-decomposition project owning one tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(title: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            created_at: now,
            updated_at: now,
            archived_at: None,
        }
    }
}

/// A goal statement in the tree.
///
/// `question` is fixed when the node is created; content updates never touch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: Uuid,
    pub project_id: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(project_id: Uuid, content: String, question: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            content,
            question,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// The attached question, trimmed, if it carries any text
    pub fn question_text(&self) -> Option<&str> {
        self.question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Semantic relation carried by an edge
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    #[default]
    Neutral,
    Why,
    Concrete,
    How,
    What,
    Custom,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Why => "why",
            Self::Concrete => "concrete",
            Self::How => "how",
            Self::What => "what",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "why" => Ok(Self::Why),
            "concrete" => Ok(Self::Concrete),
            "how" => Ok(Self::How),
            "what" => Ok(Self::What),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown relation: {}", other)),
        }
    }
}

/// Directed parent → child link. `parent_node_id == None` marks a root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: Uuid,
    pub project_id: Uuid,
    pub parent_node_id: Option<Uuid>,
    pub child_node_id: Uuid,
    #[serde(default)]
    pub relation: RelationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_label: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(
        project_id: Uuid,
        parent_node_id: Option<Uuid>,
        child_node_id: Uuid,
        relation: RelationType,
        relation_label: Option<String>,
        order_index: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            parent_node_id,
            child_node_id,
            relation,
            relation_label,
            order_index,
            created_at: now,
            updated_at: now,
        }
    }

    /// The relation label, trimmed, if it carries any text
    pub fn label_text(&self) -> Option<&str> {
        self.relation_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }
}

// ============================================================================
// Requests / responses
// ============================================================================

/// Request to create a project (its root node takes the title as content)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial project update; absent fields are left as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// Blank clears the description
    #[serde(default)]
    pub description: Option<String>,
    /// true archives the project, false restores it
    #[serde(default)]
    pub archived: Option<bool>,
}

/// Request to add an entry to the tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    pub content: String,
    #[serde(default)]
    pub parent_node_id: Option<Uuid>,
    #[serde(default)]
    pub relation: Option<RelationType>,
    #[serde(default)]
    pub relation_label: Option<String>,
    #[serde(default)]
    pub order_index: Option<i32>,
    /// Question chosen by the client for a child; skips generation when its
    /// body is non-empty. Ignored for roots.
    #[serde(default)]
    pub question: Option<String>,
}

/// Request to change a node's content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNodeRequest {
    pub content: String,
}

/// Request to change an edge's relation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEdgeRequest {
    #[serde(default)]
    pub relation: Option<RelationType>,
    #[serde(default)]
    pub relation_label: Option<String>,
}

/// Request to reorder the children of one parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub parent_node_id: Option<Uuid>,
    pub ordered_child_node_ids: Vec<Uuid>,
}

/// A node together with the edge that was created for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedNode {
    pub node: Node,
    pub edge: Edge,
}

/// Full tree of one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResponse {
    pub project: Project,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Snapshot of a project's tree used by the question subsystem
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_roundtrip_str() {
        for relation in [
            RelationType::Neutral,
            RelationType::Why,
            RelationType::Concrete,
            RelationType::How,
            RelationType::What,
            RelationType::Custom,
        ] {
            assert_eq!(relation.as_str().parse::<RelationType>().unwrap(), relation);
        }
        assert!("sideways".parse::<RelationType>().is_err());
    }

    #[test]
    fn test_relation_serde_lowercase() {
        let json = serde_json::to_string(&RelationType::Why).unwrap();
        assert_eq!(json, "\"why\"");
        let parsed: RelationType = serde_json::from_str("\"concrete\"").unwrap();
        assert_eq!(parsed, RelationType::Concrete);
    }

    #[test]
    fn test_create_node_request_minimal() {
        let req: CreateNodeRequest = serde_json::from_str(r#"{"content":"走る"}"#).unwrap();
        assert_eq!(req.content, "走る");
        assert!(req.parent_node_id.is_none());
        assert!(req.relation.is_none());
        assert!(req.question.is_none());
    }

    #[test]
    fn test_question_text_ignores_blank() {
        let mut node = Node::new(Uuid::new_v4(), "goal".into(), Some("   ".into()));
        assert_eq!(node.question_text(), None);
        node.question = Some(" なぜ？ ".into());
        assert_eq!(node.question_text(), Some("なぜ？"));
    }

    #[test]
    fn test_node_omits_empty_optionals() {
        let node = Node::new(Uuid::new_v4(), "goal".into(), None);
        let value = serde_json::to_value(&node).unwrap();
        assert!(value.get("question").is_none());
        assert!(value.get("deleted_at").is_none());
    }
}
