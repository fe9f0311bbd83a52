//! Per-type attribute dependency graph.
//!
//! Built once from an ordered registration list. Later registrations under
//! the same name replace earlier ones, which is how a derived type overrides
//! an inherited declaration. Assembly binds each declaration's name,
//! validates that every declaration has a compute rule and that every
//! dependency names a registered attribute, and precomputes a deterministic
//! topological order (Kahn's algorithm, lexicographic tie-break).

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::declaration::AttrDecl;
use crate::error::ConfigError;

/// The resolved dependency graph of one type's attributes.
#[derive(Debug)]
pub struct AttrGraph {
    type_name: String,
    nodes: BTreeMap<String, AttrDecl>,
    /// Dependency-first initialization order over all nodes.
    order: Vec<String>,
}

impl AttrGraph {
    /// Assemble the graph from the type's registration list.
    pub(crate) fn build(
        type_name: &str,
        registrations: &[(String, AttrDecl)],
    ) -> Result<Self, ConfigError> {
        let mut nodes: BTreeMap<String, AttrDecl> = BTreeMap::new();
        for (name, decl) in registrations {
            let mut decl = decl.clone();
            decl.name = Some(name.clone());
            // Later registration wins: derived declarations override
            // inherited ones under the same name.
            nodes.insert(name.clone(), decl);
        }

        for (name, decl) in &nodes {
            if decl.redefined {
                return Err(ConfigError::ComputeRedefined { attr: name.clone() });
            }
            if decl.compute_rule().is_none() {
                return Err(ConfigError::MissingComputeRule { attr: name.clone() });
            }
            for dep in decl.dependencies() {
                if !nodes.contains_key(dep) {
                    return Err(ConfigError::UnknownDependency {
                        attr: name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let order = topological_order(&nodes)?;
        debug!(
            "assembled attribute graph for '{}': {} attributes",
            type_name,
            nodes.len()
        );
        Ok(AttrGraph {
            type_name: type_name.to_string(),
            nodes,
            order,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&AttrDecl> {
        self.nodes.get(name)
    }

    /// Attribute names in dependency-first order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declarations in initialization order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = (&str, &AttrDecl)> {
        self.order
            .iter()
            .filter_map(|name| self.nodes.get(name).map(|d| (name.as_str(), d)))
    }
}

/// Kahn's algorithm over the dependency edges (dependency before dependent),
/// popping the lexicographically smallest ready node for determinism.
fn topological_order(nodes: &BTreeMap<String, AttrDecl>) -> Result<Vec<String>, ConfigError> {
    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, decl) in nodes {
        let unique: BTreeSet<&str> = decl.dependencies().iter().map(String::as_str).collect();
        indegree.insert(name.as_str(), unique.len());
        for dep in unique {
            dependents.entry(dep).or_default().push(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(&name) = ready.iter().next() {
        ready.remove(name);
        order.push(name.to_string());
        if let Some(next) = dependents.get(name) {
            for &dependent in next {
                if let Some(d) = indegree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
    }

    if order.len() == nodes.len() {
        return Ok(order);
    }

    let remaining: BTreeSet<&str> = nodes
        .keys()
        .map(String::as_str)
        .filter(|n| !order.iter().any(|o| o == n))
        .collect();
    Err(ConfigError::DependencyCycle {
        cycle: trace_cycle(nodes, &remaining),
    })
}

/// Walk dependency edges inside the unresolved set until a node repeats,
/// yielding one concrete cycle for the error message.
fn trace_cycle(nodes: &BTreeMap<String, AttrDecl>, remaining: &BTreeSet<&str>) -> Vec<String> {
    let mut path: Vec<&str> = Vec::new();
    let mut current = match remaining.iter().next() {
        Some(&n) => n,
        None => return Vec::new(),
    };

    loop {
        if let Some(pos) = path.iter().position(|&n| n == current) {
            return path.split_off(pos).iter().map(|s| s.to_string()).collect();
        }
        path.push(current);
        let next = nodes.get(current).and_then(|decl| {
            decl.dependencies()
                .iter()
                .map(String::as_str)
                .find(|d| remaining.contains(d))
        });
        match next {
            Some(n) => current = n,
            // Every remaining node has an unresolved dependency, so this
            // walk cannot dead-end; bail with what we have if it does.
            None => return path.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{required, AttrDecl};
    use serde_json::json;

    fn reg(name: &str, decl: AttrDecl) -> (String, AttrDecl) {
        (name.to_string(), decl)
    }

    fn computed(deps: &[&str]) -> AttrDecl {
        AttrDecl::computed(|_, _| Ok(json!(0))).requires(deps.iter().copied())
    }

    #[test]
    fn test_topological_order_respects_dependencies() {
        let graph = AttrGraph::build(
            "T",
            &[
                reg("c", computed(&["b"])),
                reg("b", computed(&["a"])),
                reg("a", computed(&[])),
            ],
        )
        .unwrap();
        assert_eq!(graph.order(), &["a", "b", "c"]);
    }

    #[test]
    fn test_order_is_deterministic_for_independent_nodes() {
        let graph = AttrGraph::build(
            "T",
            &[
                reg("z", computed(&[])),
                reg("m", computed(&[])),
                reg("a", computed(&[])),
            ],
        )
        .unwrap();
        assert_eq!(graph.order(), &["a", "m", "z"]);
    }

    #[test]
    fn test_later_registration_overrides_earlier() {
        let graph = AttrGraph::build(
            "T",
            &[
                reg("x", computed(&[]).phase(crate::declaration::Phase::Deferred)),
                reg("x", computed(&[])),
            ],
        )
        .unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.node("x").unwrap().phase_of(),
            crate::declaration::Phase::Immediate
        );
    }

    #[test]
    fn test_cycle_is_reported_by_name() {
        let err = AttrGraph::build(
            "T",
            &[
                reg("a", computed(&["b"])),
                reg("b", computed(&["a"])),
                reg("ok", computed(&[])),
            ],
        )
        .unwrap_err();
        match err {
            ConfigError::DependencyCycle { cycle } => {
                let mut sorted = cycle.clone();
                sorted.sort();
                assert_eq!(sorted, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let err = AttrGraph::build("T", &[reg("a", computed(&["ghost"]))]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownDependency { ref attr, ref dependency }
                if attr == "a" && dependency == "ghost"
        ));
    }

    #[test]
    fn test_missing_compute_rule_is_rejected() {
        let err = AttrGraph::build("T", &[reg("a", AttrDecl::declare())]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingComputeRule { ref attr } if attr == "a"));
    }

    #[test]
    fn test_redefined_compute_rule_is_rejected() {
        let decl = required().compute(|_, _| Ok(json!(1)));
        let err = AttrGraph::build("T", &[reg("a", decl)]).unwrap_err();
        assert!(matches!(err, ConfigError::ComputeRedefined { ref attr } if attr == "a"));
    }

    #[test]
    fn test_name_binding() {
        let graph = AttrGraph::build("T", &[reg("a", computed(&[]))]).unwrap();
        assert_eq!(graph.node("a").unwrap().name(), Some("a"));
    }
}
