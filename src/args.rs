//! Argument values and per-attribute argument bundles.
//!
//! Attribute arguments are dynamic JSON values ([`Value`]). A plain JSON
//! object supplied as an argument would be ambiguous (one positional value,
//! or a set of keyword arguments?), so callers pass an [`ArgValue`] that
//! states the intent explicitly.
//!
//! Arguments accumulate across construction and repeated `build` calls into
//! an [`ArgBundle`] per attribute. The merge is left-biased:
//!
//! - keyword arguments already in the bundle win over incoming ones,
//! - positionals already in the bundle stay ahead of an incoming bundle's,
//! - a bare incoming value becomes the new leading positional.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Dynamic attribute value. All attribute values and arguments use this
/// representation.
pub type Value = serde_json::Value;

/// An argument supplied for one attribute, with explicit shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A single positional value.
    Value(Value),
    /// A set of keyword arguments.
    Keywords(BTreeMap<String, Value>),
    /// A full bundle: positionals and keywords together.
    Bundle(ArgBundle),
}

impl ArgValue {
    /// Build a `Keywords` argument from name/value pairs.
    pub fn keywords<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        ArgValue::Keywords(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        ArgValue::Value(value)
    }
}

impl From<ArgBundle> for ArgValue {
    fn from(bundle: ArgBundle) -> Self {
        ArgValue::Bundle(bundle)
    }
}

impl From<BTreeMap<String, Value>> for ArgValue {
    fn from(map: BTreeMap<String, Value>) -> Self {
        ArgValue::Keywords(map)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Value(Value::from(value))
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Value(Value::from(value))
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        ArgValue::Value(Value::from(value))
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Value(Value::from(value))
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Value(Value::from(value))
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Value(Value::from(value))
    }
}

/// Accumulated positional and keyword arguments for one attribute.
///
/// Bundles survive across calls: arguments supplied at construction merge
/// with arguments supplied by later `build` calls under the left-biased
/// policy described in the module docs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgBundle {
    positional: SmallVec<[Value; 2]>,
    keyword: BTreeMap<String, Value>,
}

impl ArgBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an incoming argument into this bundle.
    ///
    /// Existing keyword entries are never overwritten. An incoming bundle's
    /// positionals land after the existing ones; a bare value lands first.
    pub fn merge(&mut self, incoming: ArgValue) {
        match incoming {
            ArgValue::Value(v) => {
                self.positional.insert(0, v);
            }
            ArgValue::Keywords(map) => {
                for (k, v) in map {
                    self.keyword.entry(k).or_insert(v);
                }
            }
            ArgValue::Bundle(b) => {
                self.positional.extend(b.positional);
                for (k, v) in b.keyword {
                    self.keyword.entry(k).or_insert(v);
                }
            }
        }
    }

    /// The single argument this bundle carries, when it carries exactly one
    /// meaningful value: the first positional, or the sole keyword entry of
    /// a keyword-only bundle.
    pub fn single(&self) -> Option<&Value> {
        if let Some(v) = self.positional.first() {
            return Some(v);
        }
        if self.keyword.len() == 1 {
            return self.keyword.values().next();
        }
        None
    }

    /// Resolve a named parameter: positionally by `index` first, then by
    /// `name` among the keyword arguments.
    pub fn param(&self, index: usize, name: &str) -> Option<&Value> {
        self.positional.get(index).or_else(|| self.keyword.get(name))
    }

    /// Positional argument at `index`.
    pub fn pos(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument by name.
    pub fn kw(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &BTreeMap<String, Value> {
        &self.keyword
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(args: ArgValue) -> ArgBundle {
        let mut b = ArgBundle::new();
        b.merge(args);
        b
    }

    #[test]
    fn test_bare_value_becomes_leading_positional() {
        let mut b = bundle(ArgValue::from(1.0));
        b.merge(ArgValue::from(2.0));
        assert_eq!(b.positional(), &[json!(2.0), json!(1.0)]);
    }

    #[test]
    fn test_existing_keywords_win() {
        let mut b = bundle(ArgValue::keywords([("bias", 1.5)]));
        b.merge(ArgValue::keywords([("bias", 9.0), ("scale", 2.0)]));
        assert_eq!(b.kw("bias"), Some(&json!(1.5)));
        assert_eq!(b.kw("scale"), Some(&json!(2.0)));
    }

    #[test]
    fn test_bundle_merge_keeps_existing_positionals_ahead() {
        let mut b = bundle(ArgValue::from(1.0));
        let mut incoming = ArgBundle::new();
        incoming.merge(ArgValue::from(2.0));
        incoming.merge(ArgValue::keywords([("bias", 0.5)]));
        b.merge(ArgValue::Bundle(incoming));
        assert_eq!(b.positional(), &[json!(1.0), json!(2.0)]);
        assert_eq!(b.kw("bias"), Some(&json!(0.5)));
    }

    #[test]
    fn test_bare_value_into_keyword_only_bundle() {
        let mut b = bundle(ArgValue::keywords([("bias", 1.5)]));
        b.merge(ArgValue::from(5.0));
        assert_eq!(b.positional(), &[json!(5.0)]);
        assert_eq!(b.kw("bias"), Some(&json!(1.5)));
    }

    #[test]
    fn test_single_resolution() {
        assert_eq!(bundle(ArgValue::from(3.0)).single(), Some(&json!(3.0)));
        assert_eq!(
            bundle(ArgValue::keywords([("value", 3.0)])).single(),
            Some(&json!(3.0))
        );
        assert_eq!(
            bundle(ArgValue::keywords([("value", 3.0), ("bias", 1.0)])).single(),
            None
        );
        assert_eq!(ArgBundle::new().single(), None);
    }

    #[test]
    fn test_param_binds_positionally_then_by_name() {
        let mut b = bundle(ArgValue::from(5.0));
        b.merge(ArgValue::keywords([("bias", 1.5)]));
        assert_eq!(b.param(0, "value"), Some(&json!(5.0)));
        assert_eq!(b.param(1, "bias"), Some(&json!(1.5)));
        assert_eq!(b.param(2, "scale"), None);
    }

    #[test]
    fn test_keyword_map_can_fill_all_params() {
        let b = bundle(ArgValue::keywords([("value", 5.0), ("bias", 1.5)]));
        assert_eq!(b.param(0, "value"), Some(&json!(5.0)));
        assert_eq!(b.param(1, "bias"), Some(&json!(1.5)));
    }

    #[test]
    fn test_empty_bundle() {
        let b = ArgBundle::new();
        assert!(b.is_empty());
        assert_eq!(b.pos(0), None);
        assert_eq!(b.kw("anything"), None);
    }
}
