//! # attr-graph
//!
//! Dependency-ordered, staged initialization of declared attributes.
//!
//! A type declares named attributes, each with a computation rule, an
//! optional assignment rule, a phase, and a list of sibling dependencies.
//! The engine assembles a per-type dependency graph (composing inherited
//! declarations), validates it is acyclic, and initializes attributes in
//! topological order:
//!
//! - **immediate** attributes initialize during wrapped construction,
//! - **deferred** attributes initialize on an explicit [`Instance::build`],
//! - **manual** attributes initialize only via [`Instance::initialize`].
//!
//! Arguments for an attribute accumulate across calls into an
//! [`ArgBundle`]; construction partitions its keyword arguments between
//! declared attributes and the wrapped base logic.
//!
//! ## Modules
//!
//! - [`declaration`]: attribute declarations, rules, phases.
//! - [`typespec`]: type-level registration and inheritance composition.
//! - [`graph`]: the per-type dependency graph and its topological order.
//! - [`instance`]: per-object state, construction, build, assignment,
//!   introspection.
//! - [`args`]: argument values and bundle merging.
//! - [`error`]: configuration and initialization error taxonomy.
//!
//! ## Example
//!
//! ```
//! use attr_graph::{
//!     optional, required, AttrDecl, BuildArgs, ConstructArgs, Instance, Phase,
//!     TypeSpec,
//! };
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dense = TypeSpec::builder("Dense")
//!     .attr("units", required())
//!     .attr("scale", optional(2.0))
//!     .attr(
//!         "output_width",
//!         AttrDecl::computed(|attrs, _args| {
//!             Ok(json!(attrs.get_f64("units")? * attrs.get_f64("scale")?))
//!         })
//!         .requires(["units", "scale"])
//!         .phase(Phase::Deferred),
//!     )
//!     .build()?;
//!
//! let mut layer = Instance::new(dense);
//! layer.construct(ConstructArgs::new().arg("units", 16.0), |_obj, _base| Ok(()))?;
//! assert!(!layer.is_initialized("output_width"));
//!
//! layer.build(BuildArgs::new())?;
//! assert_eq!(layer.get_f64("output_width"), Some(32.0));
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod declaration;
mod driver;
pub mod error;
pub mod graph;
pub mod instance;
pub mod typespec;

pub use args::{ArgBundle, ArgValue, Value};
pub use declaration::{optional, required, AttrDecl, Phase};
pub use error::{ComputeError, ConfigError, InitError};
pub use graph::AttrGraph;
pub use instance::{AttrView, BaseArgs, BuildArgs, ConstructArgs, InputArgs, Instance};
pub use typespec::{TypeSpec, TypeSpecBuilder};
