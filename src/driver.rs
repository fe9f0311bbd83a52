//! Topological initialization driver.
//!
//! One pass walks the graph's precomputed order, filtered to a single
//! phase. Already-initialized attributes are skipped, so repeated passes
//! are idempotent and a pass after a failure resumes where it left off.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::args::{ArgBundle, Value};
use crate::declaration::{AttrDecl, Phase};
use crate::error::InitError;
use crate::graph::AttrGraph;
use crate::instance::AttrView;

/// Run one initialization pass for `phase` over `values`, resolving each
/// attribute's arguments from `supplied`. Values initialized before a
/// failure stay in place.
pub(crate) fn run(
    graph: &AttrGraph,
    values: &mut BTreeMap<String, Value>,
    phase: Phase,
    supplied: &BTreeMap<String, ArgBundle>,
) -> Result<(), InitError> {
    let mut initialized = 0usize;
    let empty = ArgBundle::new();

    for (name, decl) in graph.iter_ordered() {
        if decl.phase_of() != phase {
            trace!("skipping '{}': phase {} not {}", name, decl.phase_of(), phase);
            continue;
        }
        if values.contains_key(name) {
            trace!("skipping '{}': already initialized", name);
            continue;
        }
        for dep in decl.dependencies() {
            if !values.contains_key(dep) {
                let dependency_phase = graph
                    .node(dep)
                    .map(|d| d.phase_of())
                    .unwrap_or(Phase::Manual);
                return Err(InitError::UnsatisfiedDependency {
                    attr: name.to_string(),
                    dependency: dep.clone(),
                    dependency_phase,
                });
            }
        }
        let args = supplied.get(name).unwrap_or(&empty);
        let value = invoke(name, decl, values, args)?;
        trace!("initialized '{}'", name);
        values.insert(name.to_string(), value);
        initialized += 1;
    }

    debug!(
        "{} pass over '{}': {} attributes initialized",
        phase,
        graph.type_name(),
        initialized
    );
    Ok(())
}

/// Invoke one attribute's compute rule against the current values.
pub(crate) fn invoke(
    name: &str,
    decl: &AttrDecl,
    values: &BTreeMap<String, Value>,
    args: &ArgBundle,
) -> Result<Value, InitError> {
    let rule = decl
        .compute_rule()
        .ok_or_else(|| InitError::UnknownAttribute {
            name: name.to_string(),
        })?;
    let view = AttrView::new(values);
    rule(&view, args).map_err(|e| e.into_init(name))
}
