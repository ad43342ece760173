//! Module dependency graph.
//!
//! A flat adjacency map from module to the modules that must be active before
//! it can be enabled. The graph is validated as acyclic when built, so a bad
//! edge fails at startup rather than during a lifecycle call.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::catalog::ModuleKey;
use crate::error::{Result, SchoolgateError};

const STANDARD_DEPENDENCIES: &[(ModuleKey, &[ModuleKey])] = &[
    (ModuleKey::Paces, &[ModuleKey::Projections]),
    (ModuleKey::MonthlyAssignments, &[ModuleKey::Projections]),
    (ModuleKey::ReportCards, &[ModuleKey::Projections]),
    (ModuleKey::Groups, &[ModuleKey::Teachers]),
    (ModuleKey::Billing, &[ModuleKey::Students]),
];

/// Validated module → required-modules map.
#[derive(Debug, Clone)]
pub struct ModuleDependencyGraph {
    requires: BTreeMap<ModuleKey, BTreeSet<ModuleKey>>,
    /// Modules in an order where every dependency precedes its dependents.
    order: Vec<ModuleKey>,
}

impl ModuleDependencyGraph {
    /// The shipped dependency graph.
    pub fn standard() -> Result<Self> {
        Self::from_edges(STANDARD_DEPENDENCIES)
    }

    /// Build a graph from `(module, requires)` pairs, rejecting cycles and
    /// self-dependencies.
    pub fn from_edges(edges: &[(ModuleKey, &[ModuleKey])]) -> Result<Self> {
        let mut graph: DiGraph<ModuleKey, ()> = DiGraph::new();
        let mut nodes: HashMap<ModuleKey, NodeIndex> = HashMap::new();
        let mut node = |graph: &mut DiGraph<ModuleKey, ()>, key: ModuleKey| {
            *nodes.entry(key).or_insert_with(|| graph.add_node(key))
        };

        let mut requires: BTreeMap<ModuleKey, BTreeSet<ModuleKey>> = BTreeMap::new();
        for (module, dependencies) in edges {
            let to = node(&mut graph, *module);
            for dependency in *dependencies {
                if dependency == module {
                    return Err(SchoolgateError::DependencyCycle(module.to_string()));
                }
                let from = node(&mut graph, *dependency);
                graph.update_edge(from, to, ());
                requires.entry(*module).or_default().insert(*dependency);
            }
        }

        let order = toposort(&graph, None)
            .map(|nodes| nodes.into_iter().map(|idx| graph[idx]).collect())
            .map_err(|cycle| SchoolgateError::DependencyCycle(graph[cycle.node_id()].to_string()))?;

        Ok(Self { requires, order })
    }

    /// Modules that must be active before `module` can be enabled.
    pub fn dependencies(&self, module: ModuleKey) -> impl Iterator<Item = ModuleKey> + '_ {
        self.requires
            .get(&module)
            .into_iter()
            .flat_map(|deps| deps.iter().copied())
    }

    /// Whether `module` directly requires `dependency`.
    pub fn requires(&self, module: ModuleKey, dependency: ModuleKey) -> bool {
        self.requires
            .get(&module)
            .is_some_and(|deps| deps.contains(&dependency))
    }

    /// Modules that directly require `module`.
    pub fn dependents(&self, module: ModuleKey) -> Vec<ModuleKey> {
        self.requires
            .iter()
            .filter(|(_, deps)| deps.contains(&module))
            .map(|(dependent, _)| *dependent)
            .collect()
    }

    /// Modules taking part in at least one edge, dependencies first.
    pub fn topological_order(&self) -> &[ModuleKey] {
        &self.order
    }

    /// Every `(module, dependency)` edge.
    pub fn edges(&self) -> impl Iterator<Item = (ModuleKey, ModuleKey)> + '_ {
        self.requires
            .iter()
            .flat_map(|(module, deps)| deps.iter().map(move |dep| (*module, *dep)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
