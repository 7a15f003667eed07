//! Dependency resolution core for a stanza-format, embedded-Linux-style
//! package manager.
//!
//! This crate owns the parts of a package manager that decide *what* to
//! install, not *how*: a package catalog keyed by name
//! ([`catalog::Catalog`]), a control-file parser that populates it
//! ([`control`]), version comparison with full epoch/upstream/revision
//! semantics ([`version`]), the satisfier selector
//! ([`selector::best_installation_candidate`]), the recursive
//! unsatisfied-dependency walker ([`walker::fetch_unsatisfied`]), the
//! conflict detector ([`conflict::fetch_conflicts`]), and the detail-reload
//! driver ([`reload::reload_details`]).
//!
//! Archive extraction, feed fetching, on-disk installation, and the
//! top-level CLI are deliberately out of scope; callers plug those in via
//! the [`reload::FeedSource`] / [`reload::ArchTable`] traits and consume the
//! sets this crate computes.
//!
//! # Example
//!
//! ```
//! use opkg_resolver::catalog::Catalog;
//! use opkg_resolver::control::{parse_stanzas, ParseOptions, StanzaResult};
//! use opkg_resolver::walker::{fetch_unsatisfied, Visited};
//!
//! let feed = "\
//! Package: mail-client
//! Version: 1.0-1
//! Architecture: all
//! Depends: mta
//!
//! Package: postfix
//! Version: 3.0-1
//! Architecture: all
//! Provides: mta
//! Status: install ok installed
//! ";
//!
//! let mut catalog = Catalog::new();
//! let mut pkgs = Vec::new();
//! parse_stanzas(
//!     feed,
//!     ParseOptions::default(),
//!     |n| catalog.ensure_abstract(n),
//!     |_arch| 10,
//!     |_name| false,
//!     |result| {
//!         if let StanzaResult::Package(pkg) = result {
//!             pkgs.push(pkg);
//!         }
//!     },
//! );
//! for pkg in pkgs {
//!     catalog.insert_concrete(pkg, true);
//! }
//!
//! let mail_client = &catalog.get("mail-client").expect("just inserted").versions[0];
//! let mut unsatisfied = Vec::new();
//! let unresolved = fetch_unsatisfied(&catalog, mail_client, &mut unsatisfied, &mut Visited::new(), false);
//! assert!(unresolved.is_empty());
//! ```

pub mod catalog;
pub mod conflict;
pub mod control;
pub mod depexpr;
pub mod error;
pub mod reload;
pub mod selector;
pub mod version;
pub mod walker;

/// Prelude module for convenient imports.
///
/// Re-exports the types most callers need, so `use opkg_resolver::prelude::*;`
/// is enough to parse feeds, build a catalog, and run the selector/walker/
/// conflict detector without reaching into individual submodules.
pub mod prelude;

pub use error::{ResolverError as Error, Result};
pub use catalog::{Catalog, Package};
pub use depexpr::{CompoundDependency, DependencyAtom, DependencyKind};
pub use version::{Version, VersionConstraint};
