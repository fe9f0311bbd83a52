//! Attribute declarations: compute rules, assignment rules, phases, and
//! dependency lists.
//!
//! A declaration starts unnamed; the name is bound when the declaration is
//! registered on a type and its graph is assembled. The compute rule may be
//! attached in the same expression (`AttrDecl::computed`) or later
//! (`AttrDecl::declare().compute(...)`), but exactly one rule must be in
//! place by graph-build time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::args::{ArgBundle, Value};
use crate::error::ComputeError;
use crate::instance::AttrView;

/// When an attribute is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// During construction, as part of the wrapped base call.
    Immediate,
    /// On an explicit `build` call.
    Deferred,
    /// Only via direct `initialize`.
    Manual,
}

impl Phase {
    pub fn short_name(&self) -> &'static str {
        match self {
            Phase::Immediate => "immediate",
            Phase::Deferred => "deferred",
            Phase::Manual => "manual",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Computation rule: sibling attributes (already initialized) plus the
/// accumulated arguments for this attribute, producing the stored value.
pub type ComputeFn =
    Arc<dyn Fn(&AttrView<'_>, &ArgBundle) -> Result<Value, ComputeError> + Send + Sync>;

/// Assignment rule: maps a directly assigned value to the stored value.
pub type AssignFn = Arc<dyn Fn(&AttrView<'_>, Value) -> Result<Value, ComputeError> + Send + Sync>;

/// One declared attribute.
///
/// Construct via [`required`], [`optional`], [`AttrDecl::computed`], or
/// [`AttrDecl::declare`], then chain `.phase(..)`, `.requires(..)`,
/// `.with_assign(..)`.
#[derive(Clone)]
pub struct AttrDecl {
    pub(crate) name: Option<String>,
    pub(crate) compute: Option<ComputeFn>,
    pub(crate) assign: Option<AssignFn>,
    pub(crate) phase: Phase,
    pub(crate) deps: Vec<String>,
    pub(crate) optional: bool,
    /// A second compute rule was attached. Surfaced as a configuration
    /// error at graph build so the builder chain itself stays infallible.
    pub(crate) redefined: bool,
}

impl fmt::Debug for AttrDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrDecl")
            .field("name", &self.name)
            .field("compute", &self.compute.as_ref().map(|_| "<rule>"))
            .field("assign", &self.assign.as_ref().map(|_| "<rule>"))
            .field("phase", &self.phase)
            .field("deps", &self.deps)
            .field("optional", &self.optional)
            .finish()
    }
}

/// A required single-argument attribute: stores exactly the supplied
/// argument, and fails when none was ever supplied.
pub fn required() -> AttrDecl {
    AttrDecl::computed(|_attrs, args| {
        args.single().cloned().ok_or(ComputeError::MissingArgument)
    })
}

/// An optional single-argument attribute: stores the supplied argument, or
/// the default when none was supplied.
pub fn optional(default: impl Into<Value>) -> AttrDecl {
    let default = default.into();
    let mut decl = AttrDecl::computed(move |_attrs, args| {
        Ok(args.single().cloned().unwrap_or_else(|| default.clone()))
    });
    decl.optional = true;
    decl
}

impl AttrDecl {
    fn empty() -> Self {
        AttrDecl {
            name: None,
            compute: None,
            assign: None,
            phase: Phase::Immediate,
            deps: Vec::new(),
            optional: false,
            redefined: false,
        }
    }

    /// Declare with a compute rule attached immediately.
    pub fn computed<F>(rule: F) -> Self
    where
        F: Fn(&AttrView<'_>, &ArgBundle) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        let mut decl = Self::empty();
        decl.compute = Some(Arc::new(rule));
        decl
    }

    /// Declare without a rule; attach one later with [`AttrDecl::compute`].
    pub fn declare() -> Self {
        Self::empty()
    }

    /// Attach the compute rule. Attaching a second rule marks the
    /// declaration invalid and graph build fails.
    pub fn compute<F>(mut self, rule: F) -> Self
    where
        F: Fn(&AttrView<'_>, &ArgBundle) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        if self.compute.is_some() {
            self.redefined = true;
        }
        self.compute = Some(Arc::new(rule));
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Declare dependencies on sibling attributes by name.
    pub fn requires<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Install an assignment rule, enabling direct assignment before
    /// initialization.
    pub fn with_assign<F>(mut self, rule: F) -> Self
    where
        F: Fn(&AttrView<'_>, Value) -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        self.assign = Some(Arc::new(rule));
        self
    }

    /// Bound name, once registered on a type.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn phase_of(&self) -> Phase {
        self.phase
    }

    pub fn dependencies(&self) -> &[String] {
        &self.deps
    }

    pub(crate) fn compute_rule(&self) -> Option<&ComputeFn> {
        self.compute.as_ref()
    }

    pub(crate) fn assign_rule(&self) -> Option<&AssignFn> {
        self.assign.as_ref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn has_assign(&self) -> bool {
        self.assign.is_some()
    }
}
