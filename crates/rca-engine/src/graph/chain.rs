//! Upstream chain resolution

use super::DependencyGraph;

impl DependencyGraph {
    /// Ancestors of `service` ordered by how close they are to it.
    ///
    /// Sorted ascending by shortest path length, ties broken alphabetically.
    /// Depths come from a unit-weight shortest-path search on the reversed graph.
    pub fn root_cause_chain(&self, service: &str) -> Vec<String> {
        let mut chain: Vec<(usize, &str)> = self
            .upstream_depths(service)
            .into_iter()
            .map(|(idx, depth)| (depth, self.graph[idx].name.as_str()))
            .collect();

        chain.sort_unstable();
        chain.into_iter().map(|(_, name)| name.to_string()).collect()
    }
}
