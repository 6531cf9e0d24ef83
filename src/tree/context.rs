//! Tree context reader
//!
//! Derives, from a project snapshot, what the question subsystem needs to know
//! about the place a new child is being attached: the parent, its ancestors
//! (nearest first) and the children it already has.

use crate::question::QuestionError;
use crate::tree::models::{Edge, Node, TreeSnapshot};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Context around a parent node, read from one snapshot.
#[derive(Debug, Clone)]
pub struct TreeContext {
    pub parent: Node,
    /// Parent's ancestors, nearest first, parent excluded
    pub ancestors: Vec<Node>,
    /// Current children of the parent, in order_index order
    pub siblings: Vec<Node>,
    edge_by_child: HashMap<Uuid, Edge>,
}

impl TreeContext {
    /// Build the context for `parent_id`.
    ///
    /// `nodes` must be the non-deleted nodes of one project; edges pointing at
    /// absent nodes are tolerated and skipped.
    pub fn gather(nodes: &[Node], edges: &[Edge], parent_id: Uuid) -> Result<Self, QuestionError> {
        let node_by_id: HashMap<Uuid, &Node> = nodes.iter().map(|n| (n.id, n)).collect();
        let parent = node_by_id
            .get(&parent_id)
            .map(|n| (*n).clone())
            .ok_or(QuestionError::ParentNotFound(parent_id))?;

        let mut edge_by_child: HashMap<Uuid, Edge> = HashMap::with_capacity(edges.len());
        for edge in edges {
            edge_by_child
                .entry(edge.child_node_id)
                .or_insert_with(|| edge.clone());
        }

        let ancestors = collect_ancestors(parent_id, &edge_by_child, &node_by_id);
        let siblings = collect_siblings(parent_id, edges, &node_by_id);

        Ok(Self {
            parent,
            ancestors,
            siblings,
            edge_by_child,
        })
    }

    /// Same as [`gather`](Self::gather) over a [`TreeSnapshot`].
    pub fn from_snapshot(snapshot: &TreeSnapshot, parent_id: Uuid) -> Result<Self, QuestionError> {
        Self::gather(&snapshot.nodes, &snapshot.edges, parent_id)
    }

    /// Incoming edge of a node, if the snapshot has one
    pub fn edge_for(&self, node_id: Uuid) -> Option<&Edge> {
        self.edge_by_child.get(&node_id)
    }

    /// Questions already attached to the parent's children
    pub fn sibling_questions(&self) -> Vec<&str> {
        self.siblings
            .iter()
            .filter_map(|n| n.question_text())
            .collect()
    }
}

fn collect_ancestors(
    parent_id: Uuid,
    edge_by_child: &HashMap<Uuid, Edge>,
    node_by_id: &HashMap<Uuid, &Node>,
) -> Vec<Node> {
    let mut ancestors = Vec::new();
    let mut visited = HashSet::from([parent_id]);
    let mut current = parent_id;

    while let Some(next) = edge_by_child
        .get(&current)
        .and_then(|edge| edge.parent_node_id)
    {
        if !visited.insert(next) {
            tracing::warn!(node_id = %next, "cycle detected while walking ancestors");
            break;
        }
        if let Some(node) = node_by_id.get(&next) {
            ancestors.push((*node).clone());
        }
        current = next;
    }

    ancestors
}

fn collect_siblings(
    parent_id: Uuid,
    edges: &[Edge],
    node_by_id: &HashMap<Uuid, &Node>,
) -> Vec<Node> {
    let mut children: Vec<&Edge> = edges
        .iter()
        .filter(|e| e.parent_node_id == Some(parent_id))
        .collect();
    children.sort_by_key(|e| e.order_index);

    let mut seen = HashSet::new();
    children
        .into_iter()
        .filter(|e| seen.insert(e.child_node_id))
        .filter_map(|e| node_by_id.get(&e.child_node_id).map(|n| (*n).clone()))
        .collect()
}
