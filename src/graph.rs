//! Object Graph - in-memory adjacency for path queries
//!
//! Built from the active generation on demand. Only references whose two
//! ends both exist as objects become edges, so dangling rows left by a
//! sweep are ignored.
//!
//! Graphs are cached per generation and never invalidated automatically:
//! later changes to a generation's tables are not seen until the cached
//! graph is discarded with [`GraphCache::discard`].

use std::collections::{HashMap, VecDeque};

use crate::storage::MemStore;
use crate::Result;

/// Which way path searches follow references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From parent to child
    Outgoing,
    /// From child to parent
    Incoming,
}

/// Directed graph of object addresses
#[derive(Debug, Default)]
pub struct ObjectGraph {
    /// Vertex number for each address
    index: HashMap<i64, usize>,
    /// Address of each vertex
    addresses: Vec<i64>,
    children: Vec<Vec<usize>>,
    parents: Vec<Vec<usize>>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every object and every non-dangling reference of the active generation
    pub fn load(store: &MemStore) -> Result<Self> {
        let mut graph = Self::new();

        let mut stmt = store.conn.prepare("SELECT address FROM obj")?;
        let addresses = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        for address in addresses {
            graph.add_vertex(address?);
        }

        let mut stmt = store.conn.prepare(
            r#"
            SELECT ref.parent, ref.child
              FROM ref
             INNER JOIN obj AS obj_parent ON ref.parent = obj_parent.address
             INNER JOIN obj AS obj_child ON ref.child = obj_child.address
            "#,
        )?;
        let edges = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
        for edge in edges {
            let (parent, child) = edge?;
            graph.add_edge(parent, child);
        }

        Ok(graph)
    }

    /// Add a vertex for `address` if it has none yet
    pub fn add_vertex(&mut self, address: i64) -> usize {
        if let Some(&v) = self.index.get(&address) {
            return v;
        }
        let v = self.addresses.len();
        self.index.insert(address, v);
        self.addresses.push(address);
        self.children.push(Vec::new());
        self.parents.push(Vec::new());
        v
    }

    /// Add an edge; both ends are added as vertices when missing
    pub fn add_edge(&mut self, parent: i64, child: i64) {
        let p = self.add_vertex(parent);
        let c = self.add_vertex(child);
        self.children[p].push(c);
        self.parents[c].push(p);
    }

    pub fn vertex_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn edge_count(&self) -> usize {
        self.children.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, address: i64) -> bool {
        self.index.contains_key(&address)
    }

    /// Shortest path from `source` to each reachable target.
    ///
    /// Paths include both ends and are returned in target order; targets
    /// that cannot be reached, or are not in the graph, yield no path.
    pub fn shortest_paths(&self, source: i64, targets: &[i64], direction: Direction) -> Vec<Vec<i64>> {
        let Some(&start) = self.index.get(&source) else {
            return Vec::new();
        };

        let neighbours = match direction {
            Direction::Outgoing => &self.children,
            Direction::Incoming => &self.parents,
        };

        // BFS from the source, remembering how each vertex was first reached
        let mut previous: Vec<Option<usize>> = vec![None; self.addresses.len()];
        let mut visited = vec![false; self.addresses.len()];
        let mut queue = VecDeque::new();
        visited[start] = true;
        queue.push_back(start);

        while let Some(v) = queue.pop_front() {
            for &next in &neighbours[v] {
                if !visited[next] {
                    visited[next] = true;
                    previous[next] = Some(v);
                    queue.push_back(next);
                }
            }
        }

        targets
            .iter()
            .filter_map(|target| {
                let &end = self.index.get(target)?;
                if !visited[end] {
                    return None;
                }
                let mut path = vec![self.addresses[end]];
                let mut current = end;
                while let Some(prev) = previous[current] {
                    path.push(self.addresses[prev]);
                    current = prev;
                }
                path.reverse();
                Some(path)
            })
            .collect()
    }
}

/// Graphs keyed by generation number
#[derive(Debug, Default)]
pub struct GraphCache {
    graphs: HashMap<u32, ObjectGraph>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of the active generation, numbered `generation`; loaded on first use
    pub fn get_or_load(&mut self, store: &MemStore, generation: u32) -> Result<&ObjectGraph> {
        if !self.graphs.contains_key(&generation) {
            tracing::info!(
                "loading object graph for generation {} ({} objects, {} refs)",
                generation,
                store.count_objects()?,
                store.count_refs()?
            );
            let graph = ObjectGraph::load(store)?;
            tracing::info!(
                "loaded {} vertices and {} edges",
                graph.vertex_count(),
                graph.edge_count()
            );
            self.graphs.insert(generation, graph);
        }
        Ok(&self.graphs[&generation])
    }

    pub fn is_cached(&self, generation: u32) -> bool {
        self.graphs.contains_key(&generation)
    }

    /// Drop the cached graph of `generation`, if any
    pub fn discard(&mut self, generation: u32) -> bool {
        self.graphs.remove(&generation).is_some()
    }

    pub fn clear(&mut self) {
        self.graphs.clear();
    }
}
