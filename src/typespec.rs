//! Type-level attribute registration and inheritance composition.
//!
//! A `TypeSpec` is the frozen description of one type: its ordered
//! registration list and the dependency graph assembled from it. Types
//! compose by explicit inheritance: `.inherit(parent)` appends the parent's
//! registrations, so a derived type's own `.attr` calls override inherited
//! declarations under the same name. When several parents are inherited, the
//! later `.inherit` wins for names they share.

use std::sync::Arc;

use crate::declaration::AttrDecl;
use crate::error::ConfigError;
use crate::graph::AttrGraph;

/// A type's attribute declarations and their dependency graph, built once
/// and shared immutably across instances.
#[derive(Debug)]
pub struct TypeSpec {
    name: String,
    registrations: Vec<(String, AttrDecl)>,
    graph: Arc<AttrGraph>,
}

impl TypeSpec {
    pub fn builder(name: impl Into<String>) -> TypeSpecBuilder {
        TypeSpecBuilder {
            name: name.into(),
            registrations: Vec::new(),
            own: std::collections::BTreeSet::new(),
            duplicate: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Arc<AttrGraph> {
        &self.graph
    }

    /// The registration list a derived type copies when it inherits this
    /// spec.
    pub(crate) fn registrations(&self) -> &[(String, AttrDecl)] {
        &self.registrations
    }
}

/// Collects inherited and own declarations, then assembles the graph.
pub struct TypeSpecBuilder {
    name: String,
    registrations: Vec<(String, AttrDecl)>,
    own: std::collections::BTreeSet<String>,
    duplicate: Option<String>,
}

impl TypeSpecBuilder {
    /// Append a parent type's registrations. Call before `.attr` so own
    /// declarations override inherited ones; order multiple `.inherit`
    /// calls so the preferred parent comes last.
    pub fn inherit(mut self, parent: &TypeSpec) -> Self {
        self.registrations
            .extend(parent.registrations().iter().cloned());
        self
    }

    /// Register an own declaration under `name`.
    pub fn attr(mut self, name: impl Into<String>, decl: AttrDecl) -> Self {
        let name = name.into();
        if !self.own.insert(name.clone()) && self.duplicate.is_none() {
            self.duplicate = Some(name.clone());
        }
        self.registrations.push((name, decl));
        self
    }

    /// Validate the declarations and assemble the graph.
    pub fn build(self) -> Result<Arc<TypeSpec>, ConfigError> {
        if let Some(attr) = self.duplicate {
            return Err(ConfigError::DuplicateAttribute { attr });
        }
        let graph = AttrGraph::build(&self.name, &self.registrations)?;
        Ok(Arc::new(TypeSpec {
            name: self.name,
            registrations: self.registrations,
            graph: Arc::new(graph),
        }))
    }
}
