//! Convenient re-exports for consumers of this crate.
//!
//! ```
//! use opkg_resolver::prelude::*;
//! let catalog = Catalog::new();
//! assert!(catalog.is_empty());
//! ```

pub use crate::catalog::{
    AbstractPackage, AggregateStatus, Alternative, Catalog, Origin, Package, StateFlags,
    StateStatus, StateWant,
};
pub use crate::conflict::{fetch_conflicts, pkg_replaces};
pub use crate::control::{
    parse_stanzas, DescriptionStyle, FieldMask, ParseOptions, StanzaOrigin, StanzaResult,
};
pub use crate::depexpr::{
    parse_dependency_field, CompoundDependency, DependencyAtom, DependencyKind,
};
pub use crate::error::{ResolverError, Result};
pub use crate::reload::{reload_details, ArchTable, FeedSource};
pub use crate::selector::{best_installation_candidate, CandidatePredicate};
pub use crate::version::{constraint_satisfied, Version, VersionConstraint};
pub use crate::walker::{fetch_unsatisfied, format_atom, Visited};
