//! Error types for graph construction and attribute initialization.
//!
//! Failures fall into two classes with different lifetimes:
//!
//! - [`ConfigError`]: the type itself is misconfigured (dependency cycle,
//!   unknown dependency, missing or redefined compute rule). Raised while
//!   building a `TypeSpec`, before any instance exists.
//! - [`InitError`]: an initialization pass failed (unsatisfied dependency,
//!   missing required argument, invalid assignment, or an error from a
//!   user-supplied rule). Raised by construction, `build`, `initialize`,
//!   and `assign`.
//!
//! Nothing is caught or retried internally; every error propagates to the
//! immediate caller. A failed pass leaves previously initialized attributes
//! initialized, so the caller can supply the missing arguments and call
//! `build` again.

use std::fmt;

use crate::declaration::Phase;

/// Error returned by user-supplied compute and assignment rules.
///
/// `MissingArgument` is reserved for "the rule needed an argument and none
/// was supplied" (what `required()` reports); everything else travels as an
/// opaque [`anyhow::Error`] so rules can use `?` freely.
#[derive(Debug)]
pub enum ComputeError {
    /// The rule required an argument and none was supplied.
    MissingArgument,
    /// Any other rule failure, propagated unchanged to the caller.
    Failed(anyhow::Error),
}

impl ComputeError {
    /// Attach the attribute name, producing the driver-level error.
    pub(crate) fn into_init(self, attr: &str) -> InitError {
        match self {
            ComputeError::MissingArgument => InitError::MissingArgument {
                attr: attr.to_string(),
            },
            ComputeError::Failed(source) => InitError::Compute {
                attr: attr.to_string(),
                source,
            },
        }
    }
}

impl From<anyhow::Error> for ComputeError {
    fn from(err: anyhow::Error) -> Self {
        ComputeError::Failed(err)
    }
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeError::MissingArgument => write!(f, "missing required argument"),
            ComputeError::Failed(source) => write!(f, "{}", source),
        }
    }
}

impl std::error::Error for ComputeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComputeError::MissingArgument => None,
            ComputeError::Failed(source) => Some(source.as_ref()),
        }
    }
}

/// A type's attribute declarations are inconsistent.
///
/// These are programming errors in the type definition, raised while the
/// graph is assembled and before any instance can be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The dependency edges form a cycle. The names are listed in
    /// dependency order (each entry depends on the next, wrapping around).
    DependencyCycle { cycle: Vec<String> },
    /// A declaration depends on a name no declaration was registered under.
    UnknownDependency { attr: String, dependency: String },
    /// A compute rule was supplied for a declaration that already had one.
    ComputeRedefined { attr: String },
    /// The declaration never received a compute rule.
    MissingComputeRule { attr: String },
    /// The same name was registered twice on one builder (overriding an
    /// inherited declaration is fine; re-registering an own one is not).
    DuplicateAttribute { attr: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DependencyCycle { cycle } => {
                write!(f, "dependency cycle: {}", cycle.join(" -> "))
            }
            ConfigError::UnknownDependency { attr, dependency } => {
                write!(
                    f,
                    "attribute '{}' depends on '{}', which is not declared",
                    attr, dependency
                )
            }
            ConfigError::ComputeRedefined { attr } => {
                write!(
                    f,
                    "attribute '{}' already has a compute rule; it cannot be redefined",
                    attr
                )
            }
            ConfigError::MissingComputeRule { attr } => {
                write!(f, "attribute '{}' has no compute rule", attr)
            }
            ConfigError::DuplicateAttribute { attr } => {
                write!(f, "attribute '{}' registered twice on the same builder", attr)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// An initialization pass or instance operation failed.
#[derive(Debug)]
pub enum InitError {
    /// An attribute's turn came in topological order but one of its
    /// dependencies is not initialized. Signals a phase or ordering
    /// misconfiguration by the type author, never a transient condition.
    UnsatisfiedDependency {
        attr: String,
        dependency: String,
        /// Phase the dependency belongs to; a later phase than the current
        /// pass is the usual culprit.
        dependency_phase: Phase,
    },
    /// A `required()` attribute's rule ran with no argument supplied.
    MissingArgument { attr: String },
    /// Direct initialization of an attribute that already has a value.
    AlreadyInitialized { attr: String },
    /// Direct assignment to an attribute with no assignment rule, or one
    /// that is already initialized.
    InvalidAssignment { attr: String, reason: String },
    /// The name does not correspond to any declared attribute.
    UnknownAttribute { name: String },
    /// A keyword argument carried a multi-argument wrapper but targets the
    /// base construction logic, which takes plain values only.
    InvalidArgument { name: String, reason: String },
    /// A user-supplied compute or assignment rule failed.
    Compute { attr: String, source: anyhow::Error },
    /// The base construction logic failed; the error propagates unchanged.
    Base { source: anyhow::Error },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::UnsatisfiedDependency {
                attr,
                dependency,
                dependency_phase,
            } => {
                write!(
                    f,
                    "attribute '{}' requires '{}', which is not initialized (its phase is {})",
                    attr, dependency, dependency_phase
                )
            }
            InitError::MissingArgument { attr } => {
                write!(f, "attribute '{}': missing required argument", attr)
            }
            InitError::AlreadyInitialized { attr } => {
                write!(f, "attribute '{}' is already initialized", attr)
            }
            InitError::InvalidAssignment { attr, reason } => {
                write!(f, "cannot assign attribute '{}': {}", attr, reason)
            }
            InitError::UnknownAttribute { name } => {
                write!(f, "unknown attribute '{}'", name)
            }
            InitError::InvalidArgument { name, reason } => {
                write!(f, "invalid argument '{}': {}", name, reason)
            }
            InitError::Compute { attr, source } => {
                write!(f, "attribute '{}' failed to compute: {}", attr, source)
            }
            InitError::Base { source } => {
                write!(f, "base construction failed: {}", source)
            }
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Compute { source, .. } | InitError::Base { source } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_names_members() {
        let err = ConfigError::DependencyCycle {
            cycle: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(format!("{}", err), "dependency cycle: a -> b");
    }

    #[test]
    fn test_compute_error_maps_to_init_error() {
        let err = ComputeError::MissingArgument.into_init("x");
        assert!(matches!(err, InitError::MissingArgument { ref attr } if attr == "x"));

        let err = ComputeError::from(anyhow::anyhow!("boom")).into_init("y");
        match err {
            InitError::Compute { attr, source } => {
                assert_eq!(attr, "y");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unsatisfied_dependency_display_mentions_phase() {
        let err = InitError::UnsatisfiedDependency {
            attr: "w".to_string(),
            dependency: "z".to_string(),
            dependency_phase: Phase::Deferred,
        };
        let text = format!("{}", err);
        assert!(text.contains("'w'"));
        assert!(text.contains("'z'"));
        assert!(text.contains("deferred"));
    }
}
