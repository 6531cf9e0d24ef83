//! In-memory implementation of TreeStore.
//!
//! Backs the server when no external database is wired in, and every test.
//! Uses `tokio::sync::RwLock<HashMap<K, V>>` collections.

use crate::tree::models::*;
use crate::tree::traits::TreeStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory TreeStore.
#[derive(Default)]
pub struct MemoryTreeStore {
    pub projects: RwLock<HashMap<Uuid, Project>>,
    pub nodes: RwLock<HashMap<Uuid, Node>>,
    pub edges: RwLock<HashMap<Uuid, Edge>>,
}

impl MemoryTreeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project.
    pub async fn with_project(self, project: Project) -> Self {
        self.projects.write().await.insert(project.id, project);
        self
    }

    /// Seed a node and its incoming edge.
    pub async fn with_node(self, node: Node, edge: Edge) -> Self {
        self.nodes.write().await.insert(node.id, node);
        self.edges.write().await.insert(edge.id, edge);
        self
    }

    /// Seed every node and edge of a snapshot.
    pub async fn with_snapshot(self, snapshot: TreeSnapshot) -> Self {
        {
            let mut nodes = self.nodes.write().await;
            nodes.extend(snapshot.nodes.into_iter().map(|n| (n.id, n)));
        }
        {
            let mut edges = self.edges.write().await;
            edges.extend(snapshot.edges.into_iter().map(|e| (e.id, e)));
        }
        self
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn create_project(
        &self,
        project: &Project,
        root: &Node,
        root_edge: &Edge,
    ) -> Result<()> {
        self.projects
            .write()
            .await
            .insert(project.id, project.clone());
        self.nodes.write().await.insert(root.id, root.clone());
        self.edges
            .write()
            .await
            .insert(root_edge.id, root_edge.clone());
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    async fn update_project(&self, project: &Project) -> Result<bool> {
        match self.projects.write().await.get_mut(&project.id) {
            Some(stored) => {
                *stored = project.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_project(&self, id: Uuid) -> Result<()> {
        if let Some(project) = self.projects.write().await.get_mut(&id) {
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_node(&self, node: &Node, edge: &Edge) -> Result<()> {
        // Take both locks before writing so readers never see a node without its edge.
        let mut nodes = self.nodes.write().await;
        let mut edges = self.edges.write().await;
        nodes.insert(node.id, node.clone());
        edges.insert(edge.id, edge.clone());
        Ok(())
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        Ok(self
            .nodes
            .read()
            .await
            .get(&id)
            .filter(|n| !n.is_deleted())
            .cloned())
    }

    async fn list_nodes(&self, project_id: Uuid) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = self
            .nodes
            .read()
            .await
            .values()
            .filter(|n| n.project_id == project_id && !n.is_deleted())
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(nodes)
    }

    async fn update_node_content(&self, id: Uuid, content: &str) -> Result<bool> {
        let mut nodes = self.nodes.write().await;
        match nodes.get_mut(&id).filter(|n| !n.is_deleted()) {
            Some(node) => {
                node.content = content.to_string();
                node.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_subtree(&self, project_id: Uuid, node_id: Uuid) -> Result<usize> {
        let edges = self.edges.read().await;
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for edge in edges.values().filter(|e| e.project_id == project_id) {
            if let Some(parent) = edge.parent_node_id {
                children.entry(parent).or_default().push(edge.child_node_id);
            }
        }
        drop(edges);

        let mut subtree = HashSet::new();
        let mut queue = VecDeque::from([node_id]);
        while let Some(current) = queue.pop_front() {
            if !subtree.insert(current) {
                continue;
            }
            if let Some(kids) = children.get(&current) {
                queue.extend(kids.iter().copied());
            }
        }

        let now = Utc::now();
        let mut marked = 0;
        let mut nodes = self.nodes.write().await;
        for id in subtree {
            if let Some(node) = nodes
                .get_mut(&id)
                .filter(|n| n.project_id == project_id && !n.is_deleted())
            {
                node.deleted_at = Some(now);
                node.updated_at = now;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn list_edges(&self, project_id: Uuid) -> Result<Vec<Edge>> {
        let mut edges: Vec<Edge> = self
            .edges
            .read()
            .await
            .values()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect();
        edges.sort_by(|a, b| {
            a.order_index
                .cmp(&b.order_index)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(edges)
    }

    async fn get_edge(&self, id: Uuid) -> Result<Option<Edge>> {
        Ok(self.edges.read().await.get(&id).cloned())
    }

    async fn update_edge(
        &self,
        id: Uuid,
        relation: Option<RelationType>,
        relation_label: Option<String>,
    ) -> Result<bool> {
        let mut edges = self.edges.write().await;
        let Some(edge) = edges.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(relation) = relation {
            edge.relation = relation;
        }
        if let Some(label) = relation_label {
            // An empty label clears it
            edge.relation_label = Some(label).filter(|l| !l.is_empty());
        }
        edge.updated_at = Utc::now();
        Ok(true)
    }

    async fn next_order_index(
        &self,
        project_id: Uuid,
        parent_node_id: Option<Uuid>,
    ) -> Result<i32> {
        let max = self
            .edges
            .read()
            .await
            .values()
            .filter(|e| e.project_id == project_id && e.parent_node_id == parent_node_id)
            .map(|e| e.order_index)
            .max();
        Ok(max.map_or(0, |m| m + 1))
    }

    async fn reorder_children(
        &self,
        project_id: Uuid,
        parent_node_id: Option<Uuid>,
        ordered_child_node_ids: &[Uuid],
    ) -> Result<()> {
        let positions: HashMap<Uuid, i32> = ordered_child_node_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i as i32))
            .collect();
        let now = Utc::now();
        let mut edges = self.edges.write().await;
        for edge in edges.values_mut().filter(|e| {
            e.project_id == project_id && e.parent_node_id == parent_node_id
        }) {
            if let Some(position) = positions.get(&edge.child_node_id) {
                edge.order_index = *position;
                edge.updated_at = now;
            }
        }
        Ok(())
    }
}
