//! Conflict detector: `fetch_conflicts` and the `pkg_replaces` helper it
//! relies on to suppress spurious self-conflicts during an upgrade.

use crate::catalog::{Catalog, Package, StateStatus, StateWant};
use crate::version::constraint_satisfied;

/// What: Find every installed-or-to-be-installed package that collides
/// with `pkg`'s `Conflicts:` declarations.
///
/// Inputs: `catalog`, where conflict targets are resolved; `pkg`, the
/// candidate whose `Conflicts:` compounds are being checked.
///
/// Output: the colliding packages, excluding anything `pkg` itself
/// replaces (an upgrading package must not be reported as conflicting with
/// the very version it supersedes).
///
/// Details: iterates `pkg.conflicts` once (one compound per iteration)
/// with a single inner loop over each compound's atoms; see the crate's
/// design notes on why this single-pass shape is the intended behavior
/// rather than the historical source's apparent double-advance.
#[must_use]
pub fn fetch_conflicts<'c>(catalog: &'c Catalog, pkg: &Package) -> Vec<&'c Package> {
    let mut conflicts = Vec::new();
    for compound in &pkg.conflicts {
        for atom in &compound.possibilities {
            let Some(target) = catalog.get(&atom.target) else {
                continue;
            };
            for candidate in &target.versions {
                let is_live = matches!(candidate.state_status, StateStatus::Installed)
                    || candidate.state_want == StateWant::Install;
                if !is_live {
                    continue;
                }
                if !constraint_satisfied(atom.constraint, atom.version.as_ref(), &candidate.version) {
                    continue;
                }
                if pkg.replaces.iter().any(|r| r.as_ref() == candidate.name.as_ref()) {
                    continue;
                }
                conflicts.push(candidate);
            }
        }
    }
    conflicts
}

/// Returns `true` iff any name in `a.replaces` is also provided by `b`,
/// i.e. installing `a` is understood to supersede `b`.
#[must_use]
pub fn pkg_replaces(a: &Package, b: &Package) -> bool {
    a.replaces.iter().any(|replaced_name| {
        b.provides
            .iter()
            .any(|provided_name| provided_name.as_ref() == replaced_name.as_ref())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Origin, StateFlags};
    use crate::depexpr::{CompoundDependency, DependencyAtom, DependencyKind};
    use crate::version::{Version, VersionConstraint};
    use smallvec::smallvec;
    use std::sync::Arc;

    fn bare_package(name: &str, version: &str) -> Package {
        Package {
            name: Arc::from(name),
            version: Version::parse(version),
            architecture: "all".to_string(),
            arch_priority: 10,
            origin: Origin::Source("feed".to_string()),
            state_want: StateWant::Unknown,
            state_status: StateStatus::NotInstalled,
            state_flags: StateFlags::default(),
            provided_by_hand: false,
            depends: Vec::new(),
            pre_depends: Vec::new(),
            recommends: Vec::new(),
            suggests: Vec::new(),
            greedy_depends: Vec::new(),
            conflicts: Vec::new(),
            provides: Vec::new(),
            replaces: Vec::new(),
            conffiles: Vec::new(),
            alternatives: Vec::new(),
            description: None,
            maintainer: None,
            section: None,
            source: None,
            tags: None,
            filename: None,
            size: None,
            installed_size: None,
            checksums: Vec::new(),
        }
    }

    #[test]
    fn finds_installed_conflicting_package() {
        let mut catalog = Catalog::new();
        let mut old = bare_package("old", "1.0-1");
        old.state_status = StateStatus::Installed;
        catalog.insert_concrete(old, true);

        let mut new = bare_package("new", "2.0-1");
        new.conflicts.push(CompoundDependency {
            kind: DependencyKind::Conflicts,
            possibilities: smallvec![DependencyAtom {
                target: Arc::from("old"),
                constraint: VersionConstraint::None,
                version: None,
            }],
        });
        catalog.insert_concrete(new.clone(), true);
        let new = catalog.get("new").unwrap().versions[0].clone();

        let conflicts = fetch_conflicts(&catalog, &new);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].name.as_ref(), "old");
    }

    #[test]
    fn replaces_suppresses_self_conflict() {
        let mut catalog = Catalog::new();
        let mut old = bare_package("old", "1.0-1");
        old.state_status = StateStatus::Installed;
        catalog.insert_concrete(old, true);

        let mut new = bare_package("new", "2.0-1");
        new.replaces.push(Arc::from("old"));
        new.conflicts.push(CompoundDependency {
            kind: DependencyKind::Conflicts,
            possibilities: smallvec![DependencyAtom {
                target: Arc::from("old"),
                constraint: VersionConstraint::None,
                version: None,
            }],
        });
        catalog.insert_concrete(new, true);
        let new = catalog.get("new").unwrap().versions[0].clone();

        let conflicts = fetch_conflicts(&catalog, &new);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn version_constrained_conflict_respects_atom() {
        let mut catalog = Catalog::new();
        let mut old = bare_package("old", "1.0-1");
        old.state_status = StateStatus::Installed;
        catalog.insert_concrete(old, true);

        let mut new = bare_package("new", "2.0-1");
        new.conflicts.push(CompoundDependency {
            kind: DependencyKind::Conflicts,
            possibilities: smallvec![DependencyAtom {
                target: Arc::from("old"),
                constraint: VersionConstraint::Earlier,
                version: Some(Version::parse("0.5-1")),
            }],
        });
        catalog.insert_concrete(new, true);
        let new = catalog.get("new").unwrap().versions[0].clone();

        assert!(fetch_conflicts(&catalog, &new).is_empty());
    }

    #[test]
    fn pkg_replaces_checks_provides_intersection() {
        let mut a = bare_package("new", "2.0-1");
        a.replaces.push(Arc::from("old"));
        let mut b = bare_package("old", "1.0-1");
        b.provides.push(Arc::from("old"));
        assert!(pkg_replaces(&a, &b));
    }
}
