//! The package catalog: abstract package nodes, concrete package records,
//! and the hash-backed store that owns both.
//!
//! Cross-references between nodes (`provided_by`, `replaced_by`,
//! `depended_upon_by`, and [`crate::depexpr::DependencyAtom::target`]) are
//! [`Arc<str>`] name handles rather than direct references: the catalog is
//! the sole owner of its nodes and the graph between them is cyclic, so
//! handles are resolved back through [`Catalog::get`] rather than shared
//! via `Rc`/`Arc<RefCell<_>>`.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::depexpr::CompoundDependency;
use crate::version::Version;

/// Aggregate installation status of an [`AbstractPackage`], set when any of
/// its concrete versions reaches that state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateStatus {
    /// No concrete version is installed or unpacked.
    #[default]
    NotInstalled,
    /// At least one concrete version reached `UNPACKED`.
    Unpacked,
    /// At least one concrete version reached `INSTALLED`.
    Installed,
}

/// Scratch/persistent flags on an [`AbstractPackage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractFlags {
    /// Full metadata is required on the next detail-reload pass; set when a
    /// name is first referenced only abstractly (via `Provides`/`Depends`)
    /// without ever having been the subject of its own stanza.
    pub need_detail: bool,
}

/// A *name* in the catalog: either a real package name or a virtual
/// capability expressed via `Provides`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AbstractPackage {
    /// Unique string key in the catalog.
    pub name: Arc<str>,
    /// Concrete packages bearing this name, in parse order.
    pub versions: Vec<Package>,
    /// Abstract packages whose concrete versions declare this name in
    /// their `Provides` (always contains `self` if any concrete version
    /// has this as its real name, via the synthesized self-provide).
    pub provided_by: HashSet<Arc<str>>,
    /// Abstract packages that declare this name in both their `Replaces`
    /// and `Conflicts`.
    pub replaced_by: HashSet<Arc<str>>,
    /// Reverse index: abstract packages whose concrete versions list this
    /// name in `Depends`/`Pre-Depends`/`Recommends`.
    pub depended_upon_by: HashSet<Arc<str>>,
    /// Aggregate status across `versions`.
    pub aggregate_status: AggregateStatus,
    /// Scratch/persistent flags.
    pub flags: AbstractFlags,
}

impl AbstractPackage {
    fn new(name: Arc<str>) -> Self {
        Self {
            name,
            versions: Vec::new(),
            provided_by: HashSet::new(),
            replaced_by: HashSet::new(),
            depended_upon_by: HashSet::new(),
            aggregate_status: AggregateStatus::default(),
            flags: AbstractFlags::default(),
        }
    }
}

/// Where a concrete [`Package`] record came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Origin {
    /// Parsed from a feed identified by this source id.
    Source(String),
    /// Parsed from the status file of this installation root.
    Destination(String),
}

/// Desired action for an installed (or to-be-installed) package.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateWant {
    /// No desired action recorded.
    #[default]
    Unknown,
    /// Should be installed.
    Install,
    /// Should be removed, configuration files kept.
    Deinstall,
    /// Should be removed entirely, including configuration files.
    Purge,
}

/// Current on-disk installation state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateStatus {
    /// Not present on the system.
    #[default]
    NotInstalled,
    /// Files unpacked but maintainer scripts not yet run.
    Unpacked,
    /// Partially configured.
    HalfConfigured,
    /// Fully installed and configured.
    Installed,
    /// Partially installed (interrupted unpack).
    HalfInstalled,
    /// Removed but configuration files remain.
    ConfigFiles,
    /// The post-install script failed.
    PostInstFailed,
    /// Removal failed partway through.
    RemovalFailed,
}

/// Persistent and scratch flags on a concrete [`Package`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFlags {
    /// Never upgrade this package even if a newer version is available.
    pub hold: bool,
    /// Preferred among otherwise-equal candidates.
    pub prefer: bool,
    /// Marked to replace another package (mirrors a `Replaces` declaration).
    pub replace: bool,
    /// Superseded; kept only for historical/reporting purposes.
    pub obsolete: bool,
    /// Explicitly requested by the user (as opposed to pulled in as a dep).
    pub user: bool,
    /// Pulled in automatically to satisfy another package's dependency.
    pub auto_installed: bool,
    /// Full metadata is required on the next detail-reload pass.
    pub need_detail: bool,
    /// The on-disk file list changed since the last status-file write.
    pub filelist_changed: bool,
}

/// A `prio:path:altpath` entry from an `Alternatives:` field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alternative {
    /// Selection priority; higher wins.
    pub priority: i32,
    /// Absolute path being managed (the "slot").
    pub target_path: String,
    /// Path this package installs as a candidate for the slot.
    pub source_path: String,
}

/// A specific version from a specific source or destination.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Package {
    /// Package name (same as `parent`'s name in the owning catalog).
    pub name: Arc<str>,
    /// Parsed version triple.
    pub version: Version,
    /// Architecture string as written in the stanza.
    pub architecture: String,
    /// Priority from the configured architecture table; 0 means "not for
    /// this system".
    pub arch_priority: i32,
    /// Which feed or installation root this record came from.
    pub origin: Origin,
    /// Desired action.
    pub state_want: StateWant,
    /// Current installation state.
    pub state_status: StateStatus,
    /// Persistent/scratch flags.
    pub state_flags: StateFlags,
    /// Set when this package was introduced by an explicit path reference,
    /// forcing the selector to pick it.
    pub provided_by_hand: bool,
    /// `Depends:` compounds.
    pub depends: Vec<CompoundDependency>,
    /// `Pre-Depends:` compounds.
    pub pre_depends: Vec<CompoundDependency>,
    /// `Recommends:` compounds.
    pub recommends: Vec<CompoundDependency>,
    /// `Suggests:` compounds.
    pub suggests: Vec<CompoundDependency>,
    /// `Depends:` compounds whose final atom carried a trailing `*`.
    pub greedy_depends: Vec<CompoundDependency>,
    /// `Conflicts:` compounds.
    pub conflicts: Vec<CompoundDependency>,
    /// Names this package provides (always non-empty: synthesized to
    /// `[self.name]` when the stanza had no `Provides:` field).
    pub provides: Vec<Arc<str>>,
    /// Names this package replaces.
    pub replaces: Vec<Arc<str>>,
    /// `(path, expected-md5)` pairs from `Conffiles:`.
    pub conffiles: Vec<(String, String)>,
    /// `update-alternatives`-style slots.
    pub alternatives: Vec<Alternative>,
    /// Free-form description text.
    pub description: Option<String>,
    /// Maintainer contact string.
    pub maintainer: Option<String>,
    /// Feed section (e.g. "base", "net").
    pub section: Option<String>,
    /// Source package name, when distinct from the binary name.
    pub source: Option<String>,
    /// Free-text tags.
    pub tags: Option<String>,
    /// Relative filename within the feed, for fetching.
    pub filename: Option<String>,
    /// Compressed archive size in bytes.
    pub size: Option<u64>,
    /// Installed (unpacked) size in bytes.
    pub installed_size: Option<u64>,
    /// Checksums keyed by algorithm name (e.g. "MD5sum", "SHA256sum").
    pub checksums: Vec<(String, String)>,
}

impl Package {
    /// Human-readable `name-version` form, used in log messages.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Whether this record represents an installed (or unpacked, pending
    /// configuration) package.
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        matches!(
            self.state_status,
            StateStatus::Installed | StateStatus::Unpacked
        )
    }
}

/// Hash-backed store of [`AbstractPackage`]s, keyed by name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    abstracts: std::collections::HashMap<Arc<str>, AbstractPackage>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// What: Return the interned handle for `name`, creating an empty
    /// abstract package for it if this is the first reference.
    ///
    /// Inputs: `name`, the package or virtual-capability name to intern.
    ///
    /// Output: the interned `Arc<str>` handle, stable across calls.
    ///
    /// Details: a name created here (rather than by [`Self::insert_concrete`])
    /// has its `need_detail` flag set, since it sprang into existence only
    /// because something referenced it and has no stanza of its own yet.
    pub fn ensure_abstract(&mut self, name: &str) -> Arc<str> {
        if let Some((existing, _)) = self.abstracts.get_key_value(name) {
            return existing.clone();
        }
        let handle: Arc<str> = Arc::from(name);
        let mut abstract_pkg = AbstractPackage::new(handle.clone());
        // A name springing into existence only because something referenced
        // it (a Depends/Provides/Replaces target) has no detail yet; it
        // needs a reload pass once its own feed stanza turns up.
        abstract_pkg.flags.need_detail = true;
        self.abstracts.insert(handle.clone(), abstract_pkg);
        handle
    }

    /// Looks up an existing abstract package by name without creating one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AbstractPackage> {
        self.abstracts.get(name)
    }

    /// Mutable lookup of an existing abstract package by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut AbstractPackage> {
        self.abstracts.get_mut(name)
    }

    /// What: Insert or merge a concrete package into the catalog, updating
    /// every derived index (`provides`, `replaces`+`conflicts`, aggregate
    /// status).
    ///
    /// Inputs:
    /// - `pkg`: the parsed concrete package record.
    /// - `set_status`: whether `pkg`'s `state_want`/`state_status` should
    ///   overwrite an existing record's (`true` for a status-file parse,
    ///   `false` when merging feed data on top of one).
    ///
    /// Output: none; the catalog is updated in place.
    ///
    /// Details:
    /// - Merging de-duplicates on `(name, version, architecture)`: when a
    ///   match already exists, fields from `pkg` win (newer parse wins) for
    ///   most data, but flags in `{hold, prefer, obsolete, user}` are
    ///   OR-preserved from the existing record rather than overwritten,
    ///   because those flags represent durable user/administrative intent
    ///   that a later feed re-parse must not silently clear.
    /// - When `set_status` is `false`, the existing record's `state_status`/
    ///   `state_want` are kept instead of being overwritten by `pkg`'s.
    pub fn insert_concrete(&mut self, mut pkg: Package, set_status: bool) {
        let name = pkg.name.clone();
        self.ensure_abstract(&name);

        if pkg.provides.is_empty() {
            pkg.provides.push(name.clone());
        }

        let existing_idx = {
            let parent = self.abstracts.get(&name).expect("just ensured");
            parent.versions.iter().position(|existing| {
                existing.version == pkg.version && existing.architecture == pkg.architecture
            })
        };

        let provides = pkg.provides.clone();
        let replaces = pkg.replaces.clone();

        let parent = self.abstracts.get_mut(&name).expect("just ensured");
        match existing_idx {
            Some(idx) => {
                let prior = &parent.versions[idx];
                pkg.state_flags.hold |= prior.state_flags.hold;
                pkg.state_flags.prefer |= prior.state_flags.prefer;
                pkg.state_flags.obsolete |= prior.state_flags.obsolete;
                pkg.state_flags.user |= prior.state_flags.user;
                if !set_status {
                    pkg.state_status = prior.state_status;
                    pkg.state_want = prior.state_want;
                }
                parent.versions[idx] = pkg;
            }
            None => parent.versions.push(pkg),
        }
        parent.flags.need_detail = false;

        if parent
            .versions
            .iter()
            .any(|p| p.state_status == StateStatus::Installed)
        {
            parent.aggregate_status = AggregateStatus::Installed;
        } else if parent.aggregate_status != AggregateStatus::Installed
            && parent
                .versions
                .iter()
                .any(|p| p.state_status == StateStatus::Unpacked)
        {
            parent.aggregate_status = AggregateStatus::Unpacked;
        }

        for provided_name in &provides {
            let provided_handle = self.ensure_abstract(provided_name);
            if let Some(provided) = self.abstracts.get_mut(&provided_handle) {
                provided.provided_by.insert(name.clone());
            }
        }

        for replaced_name in &replaces {
            let has_conflict = self
                .abstracts
                .get(&name)
                .is_some_and(|p| p.versions.iter().any(|v| {
                    v.conflicts.iter().any(|c| {
                        c.possibilities
                            .iter()
                            .any(|a| a.target.as_ref() == replaced_name.as_ref())
                    })
                }));
            if has_conflict {
                let replaced_handle = self.ensure_abstract(replaced_name);
                if let Some(replaced) = self.abstracts.get_mut(&replaced_handle) {
                    replaced.replaced_by.insert(name.clone());
                }
            }
        }

        self.reindex_reverse_depends(&name);
    }

    /// Rebuilds `depended_upon_by` entries contributed by every version of
    /// `name`, across `Depends`/`Pre-Depends`/`Recommends`.
    fn reindex_reverse_depends(&mut self, name: &Arc<str>) {
        let targets: Vec<Arc<str>> = self
            .abstracts
            .get(name)
            .into_iter()
            .flat_map(|p| p.versions.iter())
            .flat_map(|v| {
                v.depends
                    .iter()
                    .chain(v.pre_depends.iter())
                    .chain(v.recommends.iter())
            })
            .flat_map(|c| c.possibilities.iter())
            .map(|a| a.target.clone())
            .collect();

        for target in targets {
            let handle = self.ensure_abstract(&target);
            if let Some(target_abstract) = self.abstracts.get_mut(&handle) {
                target_abstract.depended_upon_by.insert(name.clone());
            }
        }
    }

    /// Enumerates all abstract packages with at least one concrete version.
    pub fn fetch_all_available(&self) -> impl Iterator<Item = &AbstractPackage> {
        self.abstracts.values().filter(|a| !a.versions.is_empty())
    }

    /// Enumerates every abstract package the catalog knows about, including
    /// purely-virtual placeholders created only via [`Catalog::ensure_abstract`]
    /// that have no concrete version of their own yet.
    pub fn all_abstracts(&self) -> impl Iterator<Item = &AbstractPackage> {
        self.abstracts.values()
    }

    /// Enumerates all concrete packages currently installed or unpacked.
    pub fn fetch_all_installed(&self) -> impl Iterator<Item = &Package> {
        self.abstracts
            .values()
            .flat_map(|a| a.versions.iter())
            .filter(|p| p.is_installed())
    }

    /// Scans `name`'s versions for an installed or unpacked record.
    #[must_use]
    pub fn fetch_installed(&self, name: &str) -> Option<&Package> {
        self.abstracts
            .get(name)?
            .versions
            .iter()
            .find(|p| p.is_installed())
    }

    /// Scans `name`'s versions for an installed/unpacked record at a
    /// specific installation root.
    #[must_use]
    pub fn fetch_installed_by_dest(&self, name: &str, dest: &str) -> Option<&Package> {
        self.abstracts.get(name)?.versions.iter().find(|p| {
            p.is_installed() && matches!(&p.origin, Origin::Destination(d) if d == dest)
        })
    }

    /// Number of abstract packages known to the catalog, including
    /// purely-virtual placeholder names with no concrete versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.abstracts.len()
    }

    /// Whether the catalog has no abstract packages at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.abstracts.is_empty()
    }
}
