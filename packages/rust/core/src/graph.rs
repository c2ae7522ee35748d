//! Undirected knowledge graph over named vertices.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use qexp_shared::{Edge, Item, QexpError, Result};

/// Why a random walk could not produce `steps` vertices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    #[error("vertex `{0}` is not in the graph")]
    Absent(String),

    #[error("walk stuck at `{vertex}` after {visited} vertices")]
    Stuck {
        vertex: String,
        visited: usize,
    },
}

/// On-disk form of a graph.
#[derive(Debug, Serialize, Deserialize)]
struct GraphFile {
    built_at: DateTime<Utc>,
    vertices: Vec<String>,
    edges: Vec<Edge>,
}

/// Vertices are deduplicated by name; edges carry no data.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: UnGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph whose vertex set is the union of all edge endpoints.
    pub fn from_edges(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add_edge(&edge.source, &edge.target);
        }
        graph
    }

    /// Index of `name`, adding the vertex if needed.
    fn vertex(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn add_vertex(&mut self, name: &str) {
        self.vertex(name);
    }

    pub fn add_edge(&mut self, source: &str, target: &str) {
        let a = self.vertex(source);
        let b = self.vertex(target);
        self.graph.add_edge(a, b, ());
    }

    /// Remove self-loops and duplicate edges (in either orientation).
    /// Every vertex is kept, even one left without edges.
    pub fn simplify(&mut self) {
        let before = self.graph.edge_count();
        let mut seen = HashSet::new();
        let kept: Vec<(NodeIndex, NodeIndex)> = self
            .graph
            .edge_references()
            .filter_map(|e| {
                let (a, b) = (e.source(), e.target());
                if a == b {
                    return None;
                }
                let key = if a < b { (a, b) } else { (b, a) };
                seen.insert(key).then_some(key)
            })
            .collect();

        self.graph.clear_edges();
        for (a, b) in kept {
            self.graph.add_edge(a, b, ());
        }
        debug!(
            removed = before - self.graph.edge_count(),
            edges = self.graph.edge_count(),
            "simplified graph"
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names adjacent to `name` (empty for an unknown vertex).
    pub fn neighbors(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        self.graph
            .neighbors(idx)
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Vertex names in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(|i| self.graph[i].as_str())
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.graph
            .edge_references()
            .map(|e| Edge::new(&self.graph[e.source()], &self.graph[e.target()]))
            .collect()
    }

    /// Walk `steps` vertices from `start` (inclusive), each step moving to a
    /// uniformly chosen neighbour. Revisits are allowed.
    pub fn random_walk<R: Rng + ?Sized>(
        &self,
        start: &str,
        steps: usize,
        rng: &mut R,
    ) -> std::result::Result<Vec<String>, WalkError> {
        let mut current = *self
            .index
            .get(start)
            .ok_or_else(|| WalkError::Absent(start.to_string()))?;
        let mut walk = vec![self.graph[current].clone()];

        while walk.len() < steps {
            let neighbors: Vec<NodeIndex> = self.graph.neighbors(current).collect();
            let Some(&next) = neighbors.choose(rng) else {
                return Err(WalkError::Stuck {
                    vertex: self.graph[current].clone(),
                    visited: walk.len(),
                });
            };
            walk.push(self.graph[next].clone());
            current = next;
        }
        Ok(walk)
    }

    /// Write the graph as JSON `{ built_at, vertices, edges }`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| QexpError::io(parent, e))?;
        }
        let file = GraphFile {
            built_at: Utc::now(),
            vertices: self.vertices().map(str::to_string).collect(),
            edges: self.edges(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| QexpError::Graph(format!("failed to serialize graph: {e}")))?;
        std::fs::write(path, json).map_err(|e| QexpError::io(path, e))?;

        info!(
            path = %path.display(),
            vertices = self.vertex_count(),
            edges = self.edge_count(),
            "graph saved"
        );
        Ok(())
    }

    /// Read a graph written by [`KnowledgeGraph::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| QexpError::io(path, e))?;
        let file: GraphFile = serde_json::from_str(&content)
            .map_err(|e| QexpError::parse(format!("{}: {e}", path.display())))?;

        let mut graph = Self::new();
        for vertex in &file.vertices {
            graph.add_vertex(vertex);
        }
        for edge in &file.edges {
            graph.add_edge(&edge.source, &edge.target);
        }
        debug!(built_at = %file.built_at, "graph loaded");
        Ok(graph)
    }
}

/// Fan `(key, [values])` items out to one edge per value.
pub fn to_edgelist(items: &[Item]) -> Vec<Edge> {
    items
        .iter()
        .flat_map(|item| {
            item.payload
                .as_list()
                .iter()
                .map(|value| Edge::new(&item.key, value))
        })
        .collect()
}
