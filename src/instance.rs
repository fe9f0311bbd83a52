//! Per-object attribute state and the instance-level operations:
//! construction wrapping, the `build` entry point, manual initialization,
//! direct assignment, and introspection.
//!
//! Rules never touch the instance directly. They receive an [`AttrView`],
//! a read-only window over the already-initialized values, with typed
//! accessors for the common cases.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Serialize;
use tracing::trace;

use crate::args::{ArgBundle, ArgValue, Value};
use crate::declaration::Phase;
use crate::driver;
use crate::error::InitError;
use crate::typespec::TypeSpec;

/// Read-only view of an instance's initialized attributes, handed to
/// compute and assignment rules.
pub struct AttrView<'a> {
    values: &'a BTreeMap<String, Value>,
}

impl<'a> AttrView<'a> {
    pub(crate) fn new(values: &'a BTreeMap<String, Value>) -> Self {
        AttrView { values }
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> anyhow::Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| anyhow!("attribute '{}' is not initialized", name))
    }

    pub fn get_f64(&self, name: &str) -> anyhow::Result<f64> {
        self.get(name)?
            .as_f64()
            .ok_or_else(|| anyhow!("attribute '{}' is not a number", name))
    }

    pub fn get_u64(&self, name: &str) -> anyhow::Result<u64> {
        self.get(name)?
            .as_u64()
            .ok_or_else(|| anyhow!("attribute '{}' is not an unsigned integer", name))
    }

    pub fn get_bool(&self, name: &str) -> anyhow::Result<bool> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| anyhow!("attribute '{}' is not a boolean", name))
    }

    pub fn get_str(&self, name: &str) -> anyhow::Result<&str> {
        self.get(name)?
            .as_str()
            .ok_or_else(|| anyhow!("attribute '{}' is not a string", name))
    }
}

/// Arguments handed to the base construction logic: everything the caller
/// supplied that does not target a declared attribute.
#[derive(Debug, Clone, Default)]
pub struct BaseArgs {
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
}

/// Arguments to [`Instance::construct`]: positionals (always base-targeted)
/// and named arguments, each of which targets a declared attribute or falls
/// through to the base logic.
#[derive(Debug, Clone, Default)]
pub struct ConstructArgs {
    positional: Vec<Value>,
    keyword: Vec<(String, ArgValue)>,
}

impl ConstructArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }
}

/// Arguments to [`Instance::build`]: named attribute arguments only.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    args: Vec<(String, ArgValue)>,
}

impl BuildArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }
}

/// Snapshot of the arguments an instance has received so far: the
/// base-targeted positionals plus the remembered per-attribute bundles.
#[derive(Debug, Clone, Serialize)]
pub struct InputArgs {
    pub positional: Vec<Value>,
    pub attributes: BTreeMap<String, ArgBundle>,
}

/// One object of a [`TypeSpec`]'s type: its initialized values and the
/// argument bundles remembered for attributes not yet initialized.
pub struct Instance {
    spec: Arc<TypeSpec>,
    values: BTreeMap<String, Value>,
    /// Re-entrancy guard: while a base call chains into a parent's wrapped
    /// construction, that nested call must forward, not re-drive the graph.
    suppressed: bool,
    remembered: BTreeMap<String, ArgBundle>,
    base_positional: Vec<Value>,
}

impl Instance {
    pub fn new(spec: Arc<TypeSpec>) -> Self {
        Instance {
            spec,
            values: BTreeMap::new(),
            suppressed: false,
            remembered: BTreeMap::new(),
            base_positional: Vec::new(),
        }
    }

    pub fn spec(&self) -> &Arc<TypeSpec> {
        &self.spec
    }

    /// Wrapped construction: partition the arguments, run `base` with the
    /// base-targeted ones under the suppression guard, then drive the
    /// immediate phase with the attribute-targeted ones.
    ///
    /// `base` receives this instance mutably so chained parent construction
    /// (calling `construct` again from inside) forwards instead of
    /// re-driving the graph.
    pub fn construct<F>(&mut self, args: ConstructArgs, base: F) -> Result<(), InitError>
    where
        F: FnOnce(&mut Instance, BaseArgs) -> anyhow::Result<()>,
    {
        if self.suppressed {
            trace!(
                "nested construction of '{}': forwarding all arguments to base",
                self.spec.name()
            );
            let mut forwarded = BaseArgs {
                positional: args.positional,
                keyword: BTreeMap::new(),
            };
            for (name, value) in args.keyword {
                let value = plain_value(&name, value)?;
                forwarded.keyword.insert(name, value);
            }
            return base(self, forwarded).map_err(|source| InitError::Base { source });
        }

        let graph = Arc::clone(self.spec.graph());
        let mut base_args = BaseArgs {
            positional: args.positional.clone(),
            keyword: BTreeMap::new(),
        };
        let mut bundles: BTreeMap<String, ArgBundle> = BTreeMap::new();
        for (name, value) in args.keyword {
            if graph.contains(&name) {
                bundles.entry(name).or_default().merge(value);
            } else {
                let value = plain_value(&name, value)?;
                base_args.keyword.insert(name, value);
            }
        }

        self.suppressed = true;
        let outcome = base(self, base_args);
        self.suppressed = false;
        outcome.map_err(|source| InitError::Base { source })?;

        driver::run(&graph, &mut self.values, Phase::Immediate, &bundles)?;

        self.base_positional = args.positional;
        for (name, bundle) in bundles {
            self.remembered
                .entry(name)
                .or_default()
                .merge(ArgValue::Bundle(bundle));
        }
        Ok(())
    }

    /// Explicit build: merge the new arguments into the remembered bundles,
    /// then drive the deferred phase. Repeatable; already-initialized
    /// attributes are skipped.
    pub fn build(&mut self, args: BuildArgs) -> Result<(), InitError> {
        let graph = Arc::clone(self.spec.graph());
        for (name, value) in args.args {
            if !graph.contains(&name) {
                return Err(InitError::UnknownAttribute { name });
            }
            self.remembered.entry(name).or_default().merge(value);
        }
        driver::run(&graph, &mut self.values, Phase::Deferred, &self.remembered)
    }

    /// Directly initialize one attribute with the given arguments. The
    /// entry point manual-phase attributes require; usable for any
    /// uninitialized attribute whose dependencies are satisfied.
    pub fn initialize(
        &mut self,
        name: &str,
        args: impl Into<ArgValue>,
    ) -> Result<(), InitError> {
        let graph = Arc::clone(self.spec.graph());
        let decl = graph.node(name).ok_or_else(|| InitError::UnknownAttribute {
            name: name.to_string(),
        })?;
        if self.values.contains_key(name) {
            return Err(InitError::AlreadyInitialized {
                attr: name.to_string(),
            });
        }
        for dep in decl.dependencies() {
            if !self.values.contains_key(dep) {
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
        let mut bundle = ArgBundle::new();
        bundle.merge(args.into());
        let value = driver::invoke(name, decl, &self.values, &bundle)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Direct assignment, allowed only while the attribute is uninitialized
    /// and only when the declaration carries an assignment rule.
    pub fn assign(&mut self, name: &str, value: impl Into<Value>) -> Result<(), InitError> {
        let graph = Arc::clone(self.spec.graph());
        let decl = graph.node(name).ok_or_else(|| InitError::UnknownAttribute {
            name: name.to_string(),
        })?;
        if self.values.contains_key(name) {
            return Err(InitError::InvalidAssignment {
                attr: name.to_string(),
                reason: "attribute is already initialized".to_string(),
            });
        }
        let rule = decl
            .assign_rule()
            .ok_or_else(|| InitError::InvalidAssignment {
                attr: name.to_string(),
                reason: "attribute has no assignment rule".to_string(),
            })?;
        let view = AttrView::new(&self.values);
        let stored = rule(&view, value.into()).map_err(|e| e.into_init(name))?;
        self.values.insert(name.to_string(), stored);
        Ok(())
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    /// Whether any argument has been supplied for `name` so far.
    pub fn args_provided(&self, name: &str) -> bool {
        self.remembered.get(name).is_some_and(|b| !b.is_empty())
    }

    /// The arguments this instance has received: base positionals plus the
    /// remembered per-attribute bundles. Optional attributes that never
    /// received an argument are omitted.
    pub fn input_args(&self) -> InputArgs {
        let attributes = self
            .remembered
            .iter()
            .filter(|(name, bundle)| {
                let is_optional = self
                    .spec
                    .graph()
                    .node(name)
                    .map(|d| d.is_optional())
                    .unwrap_or(false);
                !(is_optional && bundle.is_empty())
            })
            .map(|(name, bundle)| (name.clone(), bundle.clone()))
            .collect();
        InputArgs {
            positional: self.base_positional.clone(),
            attributes,
        }
    }
}

/// Base-targeted keyword arguments carry plain values only; the bundle and
/// keyword wrappers exist for declared attributes.
fn plain_value(name: &str, value: ArgValue) -> Result<Value, InitError> {
    match value {
        ArgValue::Value(v) => Ok(v),
        ArgValue::Keywords(_) | ArgValue::Bundle(_) => Err(InitError::InvalidArgument {
            name: name.to_string(),
            reason: "base construction arguments take plain values".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{optional, required, AttrDecl};
    use serde_json::json;

    fn spec() -> Arc<TypeSpec> {
        TypeSpec::builder("Layer")
            .attr("width", required())
            .attr("scale", optional(1.0))
            .attr(
                "area",
                AttrDecl::computed(|attrs, _| {
                    Ok(json!(attrs.get_f64("width")? * attrs.get_f64("scale")?))
                })
                .requires(["width", "scale"])
                .phase(Phase::Deferred),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_construct_initializes_immediate_only() {
        let mut obj = Instance::new(spec());
        obj.construct(ConstructArgs::new().arg("width", 4.0), |_, _| Ok(()))
            .unwrap();
        assert_eq!(obj.get_f64("width"), Some(4.0));
        assert_eq!(obj.get_f64("scale"), Some(1.0));
        assert!(!obj.is_initialized("area"));
    }

    #[test]
    fn test_build_completes_deferred_phase() {
        let mut obj = Instance::new(spec());
        obj.construct(ConstructArgs::new().arg("width", 4.0), |_, _| Ok(()))
            .unwrap();
        obj.build(BuildArgs::new()).unwrap();
        assert_eq!(obj.get_f64("area"), Some(4.0));
    }

    #[test]
    fn test_base_receives_only_unclaimed_arguments() {
        let mut obj = Instance::new(spec());
        let mut seen = BaseArgs::default();
        obj.construct(
            ConstructArgs::new()
                .positional("first")
                .arg("width", 4.0)
                .arg("label", "layer-1"),
            |_, base| {
                seen = base;
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(seen.positional, vec![json!("first")]);
        assert_eq!(seen.keyword.get("label"), Some(&json!("layer-1")));
        assert!(!seen.keyword.contains_key("width"));
    }

    #[test]
    fn test_base_error_propagates_and_clears_suppression() {
        let mut obj = Instance::new(spec());
        let err = obj
            .construct(ConstructArgs::new().arg("width", 4.0), |_, _| {
                Err(anyhow!("base exploded"))
            })
            .unwrap_err();
        assert!(matches!(err, InitError::Base { .. }));
        // A fresh construct attempt must not behave as nested.
        obj.construct(ConstructArgs::new().arg("width", 4.0), |_, _| Ok(()))
            .unwrap();
        assert_eq!(obj.get_f64("width"), Some(4.0));
    }

    #[test]
    fn test_nested_construct_forwards_to_base() {
        let mut obj = Instance::new(spec());
        obj.construct(ConstructArgs::new().arg("width", 4.0), |inner, _| {
            // Chained parent construction while suppressed.
            let mut forwarded = BaseArgs::default();
            inner.construct(
                ConstructArgs::new().arg("width", 99.0).arg("tag", "parent"),
                |_, base| {
                    forwarded = base;
                    Ok(())
                },
            )?;
            // The nested call hands everything to its base, graph untouched.
            anyhow::ensure!(forwarded.keyword.get("width") == Some(&json!(99.0)));
            anyhow::ensure!(forwarded.keyword.get("tag") == Some(&json!("parent")));
            Ok(())
        })
        .unwrap();
        assert_eq!(obj.get_f64("width"), Some(4.0));
    }

    #[test]
    fn test_initialize_manual_attribute() {
        let spec = TypeSpec::builder("T")
            .attr("seed", required().phase(Phase::Manual))
            .build()
            .unwrap();
        let mut obj = Instance::new(spec);
        obj.construct(ConstructArgs::new(), |_, _| Ok(())).unwrap();
        assert!(!obj.is_initialized("seed"));
        obj.initialize("seed", 42.0).unwrap();
        assert_eq!(obj.get_f64("seed"), Some(42.0));
        let err = obj.initialize("seed", 43.0).unwrap_err();
        assert!(matches!(err, InitError::AlreadyInitialized { .. }));
    }

    #[test]
    fn test_assign_requires_rule_and_uninitialized() {
        let spec = TypeSpec::builder("T")
            .attr(
                "level",
                required()
                    .phase(Phase::Deferred)
                    .with_assign(|_, value| Ok(value)),
            )
            .attr("fixed", required().phase(Phase::Deferred))
            .build()
            .unwrap();
        let mut obj = Instance::new(spec);
        obj.construct(ConstructArgs::new(), |_, _| Ok(())).unwrap();

        obj.assign("level", 3.0).unwrap();
        assert_eq!(obj.get_f64("level"), Some(3.0));
        let err = obj.assign("level", 4.0).unwrap_err();
        assert!(matches!(err, InitError::InvalidAssignment { .. }));

        let err = obj.assign("fixed", 1.0).unwrap_err();
        assert!(matches!(err, InitError::InvalidAssignment { .. }));
    }

    #[test]
    fn test_input_args_reports_base_positionals_and_bundles() {
        let mut obj = Instance::new(spec());
        obj.construct(
            ConstructArgs::new().positional("ctx").arg("width", 4.0),
            |_, _| Ok(()),
        )
        .unwrap();
        let snapshot = obj.input_args();
        assert_eq!(snapshot.positional, vec![json!("ctx")]);
        assert!(snapshot.attributes.contains_key("width"));
        assert!(obj.args_provided("width"));
        assert!(!obj.args_provided("scale"));
    }

    #[test]
    fn test_build_rejects_unknown_attribute() {
        let mut obj = Instance::new(spec());
        obj.construct(ConstructArgs::new().arg("width", 4.0), |_, _| Ok(()))
            .unwrap();
        let err = obj.build(BuildArgs::new().arg("ghost", 1.0)).unwrap_err();
        assert!(matches!(err, InitError::UnknownAttribute { ref name } if name == "ghost"));
    }
}
