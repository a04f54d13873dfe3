//! Dependency graph (DAG) construction and traversal
//!
//! Builds forward and reverse dependency edges from the declarations in an
//! [`AssetRegistry`], for ordering, impact queries and cycle detection.

use crate::error::GraphError;
use crate::registry::AssetRegistry;
use assetgraph_core::AssetIdentity;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Forward edges: asset -> assets it depends on (parents)
    parents: HashMap<AssetIdentity, Vec<AssetIdentity>>,

    /// Reverse edges: asset -> assets that depend on it (children)
    children: HashMap<AssetIdentity, Vec<AssetIdentity>>,

    /// All assets in the graph
    nodes: BTreeSet<AssetIdentity>,
}

impl DependencyGraph {
    /// Build the graph of every registered asset
    ///
    /// Dependencies that are not registered still appear as nodes.
    pub fn from_registry(registry: &AssetRegistry) -> Self {
        let mut graph = Self::default();
        for identity in registry.identities() {
            let deps = registry.dependencies(&identity).unwrap_or_default();
            graph.add_node(identity, deps);
        }
        graph
    }

    /// Build the graph reachable from `roots`
    ///
    /// Fails with `UnknownAsset` if a root or any reachable dependency is not
    /// registered.
    pub fn reachable(registry: &AssetRegistry, roots: &[AssetIdentity]) -> Result<Self, GraphError> {
        let mut graph = Self::default();
        let mut queue: VecDeque<AssetIdentity> = roots.iter().copied().collect();
        let mut seen = HashSet::new();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }

            let deps = registry
                .dependencies(&current)
                .ok_or_else(|| GraphError::UnknownAsset(current.to_string()))?;
            graph.add_node(current, deps);
            queue.extend(deps.iter().copied().filter(|dep| !seen.contains(dep)));
        }

        Ok(graph)
    }

    fn add_node(&mut self, identity: AssetIdentity, deps: &[AssetIdentity]) {
        self.nodes.insert(identity);

        let mut unique = Vec::with_capacity(deps.len());
        for dep in deps {
            if unique.contains(dep) {
                continue;
            }
            unique.push(*dep);
            self.nodes.insert(*dep);
            self.children.entry(*dep).or_default().push(identity);
        }

        if !unique.is_empty() {
            self.parents.insert(identity, unique);
        }
    }

    /// Get all assets in the graph, sorted
    pub fn all_nodes(&self) -> Vec<AssetIdentity> {
        self.nodes.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, identity: &AssetIdentity) -> bool {
        self.nodes.contains(identity)
    }

    /// Get immediate parents (dependencies) of an asset
    pub fn parents(&self, identity: &AssetIdentity) -> &[AssetIdentity] {
        self.parents.get(identity).map(Vec::as_slice).unwrap_or_default()
    }

    /// Get immediate children (dependents) of an asset
    pub fn children(&self, identity: &AssetIdentity) -> &[AssetIdentity] {
        self.children.get(identity).map(Vec::as_slice).unwrap_or_default()
    }

    /// Get all downstream assets (transitive closure of children)
    ///
    /// Everything that must be regenerated if this asset changes.
    pub fn downstream(&self, identity: &AssetIdentity) -> Vec<AssetIdentity> {
        Self::closure(identity, &self.children)
    }

    /// Get all upstream assets (transitive closure of parents)
    pub fn upstream(&self, identity: &AssetIdentity) -> Vec<AssetIdentity> {
        Self::closure(identity, &self.parents)
    }

    /// BFS over one edge direction, in visiting order
    fn closure(
        start: &AssetIdentity,
        edges: &HashMap<AssetIdentity, Vec<AssetIdentity>>,
    ) -> Vec<AssetIdentity> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        if let Some(next) = edges.get(start) {
            queue.extend(next.iter().copied());
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);

            if let Some(next) = edges.get(&current) {
                queue.extend(next.iter().copied().filter(|n| !visited.contains(n)));
            }
        }

        result
    }

    /// Check if `target` depends, directly or transitively, on `source`
    pub fn has_path(&self, source: &AssetIdentity, target: &AssetIdentity) -> bool {
        self.downstream(source).contains(target)
    }

    /// Topological order, dependencies first
    ///
    /// Ties are broken by identity so the order is stable across runs.
    /// Returns `None` if the graph has a cycle.
    pub fn topological_sort(&self) -> Option<Vec<AssetIdentity>> {
        let mut in_degree: HashMap<AssetIdentity, usize> = self
            .nodes
            .iter()
            .map(|node| (*node, self.parents(node).len()))
            .collect();

        let mut ready: BTreeSet<AssetIdentity> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        // Kahn's algorithm
        while let Some(node) = ready.pop_first() {
            result.push(node);

            for child in self.children(&node) {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Some(result)
        } else {
            None
        }
    }

    /// Find one dependency cycle
    ///
    /// The returned path starts and ends with the same asset, e.g.
    /// `[a, b, a]` for "a depends on b depends on a".
    pub fn find_cycle(&self) -> Option<Vec<AssetIdentity>> {
        let mut finished = HashSet::new();

        for start in &self.nodes {
            if finished.contains(start) {
                continue;
            }

            // Iterative DFS; each frame is (node, index of next parent to visit)
            let mut stack: Vec<(AssetIdentity, usize)> = vec![(*start, 0)];
            let mut on_path: HashSet<AssetIdentity> = HashSet::from([*start]);

            while let Some((node, next)) = stack.last_mut() {
                let node = *node;
                let parents = self.parents(&node);

                if let Some(parent) = parents.get(*next) {
                    *next += 1;
                    let parent = *parent;

                    if on_path.contains(&parent) {
                        let mut path: Vec<AssetIdentity> = stack
                            .iter()
                            .map(|(id, _)| *id)
                            .skip_while(|id| *id != parent)
                            .collect();
                        path.push(parent);
                        return Some(path);
                    }

                    if !finished.contains(&parent) {
                        on_path.insert(parent);
                        stack.push((parent, 0));
                    }
                } else {
                    on_path.remove(&node);
                    finished.insert(node);
                    stack.pop();
                }
            }
        }

        None
    }
}
