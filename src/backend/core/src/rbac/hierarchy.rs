//! Validated role inheritance graph.
//!
//! The inheritance table is loaded into a `petgraph` DAG once, rejected if it
//! contains a cycle, and every role's transitive closure is computed up front.
//! Lookups afterwards are plain map reads with no recursion.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

use super::models::RoleId;
use crate::error::AccessError;

/// Errors raised while building the hierarchy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("role inheritance cycle involving '{0}'")]
    Cycle(RoleId),
}

impl From<HierarchyError> for AccessError {
    fn from(error: HierarchyError) -> Self {
        AccessError::hierarchy_cycle(error.to_string())
    }
}

/// Immutable, precomputed role hierarchy.
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    /// role → every role reachable through inheritance, excluding itself
    closures: HashMap<RoleId, BTreeSet<RoleId>>,
}

impl RoleHierarchy {
    /// Build from a `role → directly inherited roles` table.
    ///
    /// Roles that only appear as inheritance targets are added as leaves.
    pub fn build(table: &BTreeMap<RoleId, Vec<RoleId>>) -> Result<Self, HierarchyError> {
        let mut graph: DiGraph<RoleId, ()> = DiGraph::new();
        let mut index: HashMap<RoleId, NodeIndex> = HashMap::new();

        let mut node = |graph: &mut DiGraph<RoleId, ()>, role: &RoleId| -> NodeIndex {
            *index
                .entry(role.clone())
                .or_insert_with(|| graph.add_node(role.clone()))
        };

        for (role, inherits) in table {
            let from = node(&mut graph, role);
            for parent in inherits {
                let to = node(&mut graph, parent);
                graph.update_edge(from, to, ());
            }
        }

        toposort(&graph, None).map_err(|cycle| HierarchyError::Cycle(graph[cycle.node_id()].clone()))?;

        let closures = graph
            .node_indices()
            .map(|start| {
                let mut reachable = BTreeSet::new();
                let mut dfs = Dfs::new(&graph, start);
                while let Some(next) = dfs.next(&graph) {
                    if next != start {
                        reachable.insert(graph[next].clone());
                    }
                }
                (graph[start].clone(), reachable)
            })
            .collect::<HashMap<_, _>>();

        debug!(roles = closures.len(), "Role hierarchy built");

        Ok(Self { closures })
    }

    /// Every role `role` inherits, directly or transitively. Unknown roles
    /// inherit nothing.
    pub fn inherited_roles(&self, role: &RoleId) -> BTreeSet<RoleId> {
        self.closures.get(role).cloned().unwrap_or_default()
    }

    /// `role` itself plus everything it inherits.
    pub fn expand(&self, role: &RoleId) -> BTreeSet<RoleId> {
        let mut roles = self.inherited_roles(role);
        roles.insert(role.clone());
        roles
    }

    /// Whether `holder` grants `target`, either by being it or inheriting it.
    pub fn grants(&self, holder: &RoleId, target: &RoleId) -> bool {
        holder == target
            || self
                .closures
                .get(holder)
                .is_some_and(|closure| closure.contains(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::roles::RbacConfig;

    fn r(id: &str) -> RoleId {
        RoleId::new(id)
    }

    #[test]
    fn test_default_closures() {
        let h = RoleHierarchy::build(&RbacConfig::defaults().hierarchy).unwrap();
        assert_eq!(h.inherited_roles(&r("admin")), BTreeSet::from([r("user"), r("viewer")]));
        assert_eq!(h.inherited_roles(&r("user")), BTreeSet::from([r("viewer")]));
        assert!(h.inherited_roles(&r("viewer")).is_empty());
    }

    #[test]
    fn test_transitive_chain() {
        let config = RbacConfig::empty()
            .with_role("admin", ["operator"])
            .with_role("operator", ["viewer"]);
        let h = RoleHierarchy::build(&config.hierarchy).unwrap();

        let inherited = h.inherited_roles(&r("admin"));
        assert!(inherited.contains(&r("operator")));
        assert!(inherited.contains(&r("viewer")));
        assert!(h.grants(&r("admin"), &r("viewer")));
        assert!(!h.grants(&r("viewer"), &r("admin")));
    }

    #[test]
    fn test_cycle_rejected() {
        let config = RbacConfig::empty()
            .with_role("a", ["b"])
            .with_role("b", ["c"])
            .with_role("c", ["a"]);
        assert!(matches!(
            RoleHierarchy::build(&config.hierarchy),
            Err(HierarchyError::Cycle(_))
        ));
    }

    #[test]
    fn test_self_inheritance_rejected() {
        let config = RbacConfig::empty().with_role("loop", ["loop"]);
        assert!(RoleHierarchy::build(&config.hierarchy).is_err());
    }

    #[test]
    fn test_unknown_role_inherits_nothing() {
        let h = RoleHierarchy::build(&BTreeMap::new()).unwrap();
        assert!(h.inherited_roles(&r("ghost")).is_empty());
        assert_eq!(h.expand(&r("ghost")), BTreeSet::from([r("ghost")]));
    }

    #[test]
    fn test_diamond_deduplicates() {
        let config = RbacConfig::empty()
            .with_role("top", ["left", "right"])
            .with_role("left", ["base"])
            .with_role("right", ["base"]);
        let h = RoleHierarchy::build(&config.hierarchy).unwrap();
        assert_eq!(h.inherited_roles(&r("top")).len(), 3);
    }
}
