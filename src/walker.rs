//! Unsatisfied-dependency walker: transitively expands a package's
//! dependency closure.
//!
//! The historical source cuts cycles by mutating `deps_checked`/
//! `predeps_checked` flags directly on catalog nodes. This implementation
//! instead threads an explicit [`Visited`] set through the walk (the
//! alternative the design notes recommend), so the catalog stays read-only
//! for the duration of a walk and independent walks never interfere.

use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::{Catalog, Package, StateWant};
use crate::depexpr::{CompoundDependency, DependencyAtom, DependencyKind};
use crate::selector::best_installation_candidate;
use crate::version::constraint_satisfied;

/// Per-walk scratch state cutting cycles. Two separate marks mirror the
/// source's `deps_checked`/`predeps_checked` distinction: a package whose
/// plain dependencies were already walked may still need its pre-depends
/// walked (and vice versa) within the same top-level traversal.
#[derive(Default)]
pub struct Visited {
    deps_checked: HashSet<Arc<str>>,
    predeps_checked: HashSet<Arc<str>>,
}

impl Visited {
    /// Creates an empty visited set for a new top-level walk.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Renders a [`DependencyAtom`] the way §4.8 expects unresolved names to
/// read, e.g. `"ghost (>= 1)"`.
#[must_use]
pub fn format_atom(atom: &DependencyAtom) -> String {
    use crate::version::VersionConstraint;
    let Some(version) = &atom.version else {
        return atom.target.to_string();
    };
    let op = match atom.constraint {
        VersionConstraint::None => return atom.target.to_string(),
        VersionConstraint::Earlier => "<<",
        VersionConstraint::EarlierEqual => "<=",
        VersionConstraint::Equal => "=",
        VersionConstraint::LaterEqual => ">=",
        VersionConstraint::Later => ">>",
    };
    format!("{} ({} {})", atom.target, op, version)
}

/// What: Transitively expand `pkg`'s dependency closure.
///
/// Inputs:
/// - `catalog`: where candidates and their dependency fields live.
/// - `pkg`: the package whose closure is being expanded.
/// - `unsatisfied`: accumulates concrete packages not yet installed that
///   are required for `pkg`, in discovery order.
/// - `visited`: per-walk cycle-cutting state; pass a fresh [`Visited::new`]
///   for each independent top-level walk.
/// - `pre_check`: when `true`, runs the walk purely to answer "is this
///   package's closure satisfiable at all" for the selector (§4.5 step 2);
///   callers in that mode typically discard `unsatisfied` and only look at
///   whether the returned list is empty.
///
/// Output: the accumulated unresolved dependency strings, empty when
/// everything needed was found.
///
/// Details: always returns; an unresolved hard dependency is reported as
/// data, never as an error. See the crate-level example for a full
/// parse-then-walk flow.
pub fn fetch_unsatisfied(
    catalog: &Catalog,
    pkg: &Package,
    unsatisfied: &mut Vec<Package>,
    visited: &mut Visited,
    pre_check: bool,
) -> Vec<String> {
    let mut unresolved = Vec::new();
    walk(catalog, pkg, unsatisfied, visited, pre_check, &mut unresolved);
    unresolved
}

fn walk(
    catalog: &Catalog,
    pkg: &Package,
    unsatisfied: &mut Vec<Package>,
    visited: &mut Visited,
    pre_check: bool,
    unresolved: &mut Vec<String>,
) {
    let has_predeps = !pkg.pre_depends.is_empty();
    let has_deps = !pkg.depends.is_empty() || !pkg.greedy_depends.is_empty();

    if has_deps && visited.deps_checked.contains(&pkg.name) {
        return;
    }
    if has_predeps && visited.predeps_checked.contains(&pkg.name) {
        return;
    }
    visited.deps_checked.insert(pkg.name.clone());
    visited.predeps_checked.insert(pkg.name.clone());

    for compound in pkg.pre_depends.iter().chain(pkg.depends.iter()) {
        walk_compound(catalog, compound, unsatisfied, visited, pre_check, unresolved);
    }

    for compound in &pkg.greedy_depends {
        walk_greedy_compound(catalog, compound, unsatisfied, visited);
    }

    for compound in pkg.recommends.iter().chain(pkg.suggests.iter()) {
        walk_compound(catalog, compound, unsatisfied, visited, pre_check, unresolved);
    }
}

/// What: Resolve one compound dependency (of any kind) against the catalog,
/// recursing into a found satisfier or recording its absence.
///
/// Inputs:
/// - `compound`: the `Depends`/`Pre-Depends`/`Recommends`/`Suggests` entry
///   being resolved.
/// - `unsatisfied`/`visited`/`pre_check`: see [`fetch_unsatisfied`].
/// - `unresolved`: accumulates printable dep-strings for hard, unmet
///   dependencies; left untouched for an unmet recommendation/suggestion.
///
/// Output:
/// - Mutates `unsatisfied`/`unresolved` in place; returns nothing.
///
/// Details:
/// - Steps 1-2 of spec §4.6: prefers an already-installed satisfier, falls
///   back to any installable one.
/// - Step 3: a satisfier marked `DEINSTALL`/`PURGE` is skipped (with a
///   NOTICE) when `compound.kind` is `RECOMMEND` or `SUGGEST`, so the
///   resolver never fights the user's own removal request.
/// - A satisfier that is an ancestor still being expanded higher up this
///   same walk (tracked via `visited`) is skipped entirely rather than
///   re-added to `unsatisfied`, which is what breaks cycles without
///   reporting the cycle's own root as one of its dependencies.
/// - Step 5: no satisfier at all becomes a printable unresolved name for
///   `DEPEND`/`PRE_DEPEND`/`GreedyDepend`, or a NOTICE-only event for
///   `RECOMMEND`/`SUGGEST`.
fn walk_compound(
    catalog: &Catalog,
    compound: &CompoundDependency,
    unsatisfied: &mut Vec<Package>,
    visited: &mut Visited,
    pre_check: bool,
    unresolved: &mut Vec<String>,
) {
    let satisfier = find_satisfier(catalog, compound, true)
        .or_else(|| find_satisfier(catalog, compound, false));

    let Some(satisfier) = satisfier else {
        match compound.kind {
            DependencyKind::Recommend => {
                tracing::info!(notice = true, "unsatisfied recommendation");
            }
            DependencyKind::Suggest => {
                tracing::info!(notice = true, "unsatisfied suggestion");
            }
            DependencyKind::Depend | DependencyKind::PreDepend | DependencyKind::GreedyDepend | DependencyKind::Conflicts => {
                for atom in &compound.possibilities {
                    unresolved.push(format_atom(atom));
                }
            }
        }
        return;
    };

    if matches!(satisfier.state_want, StateWant::Deinstall | StateWant::Purge)
        && matches!(
            compound.kind,
            DependencyKind::Recommend | DependencyKind::Suggest
        )
    {
        tracing::info!(
            notice = true,
            package = satisfier.name.as_ref(),
            "ignoring recommendation for package marked for removal at user request"
        );
        return;
    }

    if satisfier.is_installed() {
        return;
    }

    if visited.deps_checked.contains(&satisfier.name) || visited.predeps_checked.contains(&satisfier.name) {
        return;
    }

    if unsatisfied.iter().any(|p| {
        p.name == satisfier.name && p.version == satisfier.version && p.architecture == satisfier.architecture
    }) {
        return;
    }

    if !pre_check {
        let sub_unresolved = fetch_unsatisfied(catalog, satisfier, unsatisfied, visited, pre_check);
        unresolved.extend(sub_unresolved);
    }
    unsatisfied.push(satisfier.clone());
}

fn walk_greedy_compound(
    catalog: &Catalog,
    compound: &CompoundDependency,
    unsatisfied: &mut Vec<Package>,
    visited: &mut Visited,
) {
    for atom in &compound.possibilities {
        let Some(target) = catalog.get(&atom.target) else {
            continue;
        };
        for provider_name in &target.provided_by {
            let Some(provider) = catalog.get(provider_name) else {
                continue;
            };
            for candidate in &provider.versions {
                if candidate.state_want == StateWant::Install || candidate.is_installed() {
                    continue;
                }
                if unsatisfied
                    .iter()
                    .any(|p| p.name == candidate.name && p.version == candidate.version)
                {
                    continue;
                }
                let mut sub_unsatisfied = Vec::new();
                let sub_unresolved =
                    fetch_unsatisfied(catalog, candidate, &mut sub_unsatisfied, visited, false);
                let all_want_install = sub_unsatisfied
                    .iter()
                    .all(|p| p.state_want == StateWant::Install);
                if sub_unresolved.is_empty() && all_want_install {
                    tracing::info!(
                        notice = true,
                        package = candidate.name.as_ref(),
                        "adding satisfier for greedy dependence"
                    );
                    unsatisfied.extend(sub_unsatisfied);
                    unsatisfied.push(candidate.clone());
                }
            }
        }
    }
}

/// What: Search `compound`'s atoms via [`best_installation_candidate`] for
/// a satisfier.
///
/// Inputs: `compound` to resolve; `require_installed` narrows the search to
/// already-installed candidates when `true`, or any installable one when
/// `false`.
///
/// Output: the first matching package across the compound's alternatives,
/// in declaration order.
///
/// Details: a compound's alternatives are tried in source order and the
/// first satisfying candidate wins; ties within one alternative are broken
/// by [`best_installation_candidate`]'s own precedence rules.
fn find_satisfier<'c>(
    catalog: &'c Catalog,
    compound: &CompoundDependency,
    require_installed: bool,
) -> Option<&'c Package> {
    for atom in &compound.possibilities {
        let predicate = |pkg: &Package| {
            if require_installed && !pkg.is_installed() {
                return false;
            }
            constraint_satisfied(atom.constraint, atom.version.as_ref(), &pkg.version)
        };
        let mentions = std::collections::HashSet::new();
        if let Some(found) = best_installation_candidate(
            catalog,
            &atom.target,
            &predicate,
            &mentions,
            true,
            &mut |_| true,
        ) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Origin, StateFlags, StateStatus};
    use crate::depexpr::{parse_dependency_field, DependencyKind};
    use crate::version::Version;

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

    fn with_depends(mut pkg: Package, catalog: &mut Catalog, field: &str) -> Package {
        pkg.depends = parse_dependency_field(field, DependencyKind::Depend, |n| {
            catalog.ensure_abstract(n)
        })
        .unwrap();
        pkg
    }

    #[test]
    fn simple_satisfaction_returns_empty() {
        let mut catalog = Catalog::new();
        let mut b21 = bare_package("B", "2.1-1");
        b21.state_status = StateStatus::Installed;
        catalog.insert_concrete(b21, true);
        let mut b10 = bare_package("B", "1.0-1");
        b10.state_status = StateStatus::Installed;
        catalog.insert_concrete(b10, true);

        let a = with_depends(bare_package("A", "1.0-1"), &mut catalog, "B (>= 2)");
        catalog.insert_concrete(a.clone(), true);

        let mut unsatisfied = Vec::new();
        let unresolved =
            fetch_unsatisfied(&catalog, &a, &mut unsatisfied, &mut Visited::new(), false);
        assert!(unresolved.is_empty());
        assert!(unsatisfied.is_empty());
    }

    #[test]
    fn virtual_provider_is_found() {
        let mut catalog = Catalog::new();
        let mut postfix = bare_package("postfix", "3.0-1");
        postfix.provides.push(Arc::from("mta"));
        postfix.state_status = StateStatus::Installed;
        catalog.insert_concrete(postfix, true);

        let app = with_depends(bare_package("mail-client", "1.0-1"), &mut catalog, "mta");
        catalog.insert_concrete(app.clone(), true);

        let mut unsatisfied = Vec::new();
        let unresolved =
            fetch_unsatisfied(&catalog, &app, &mut unsatisfied, &mut Visited::new(), false);
        assert!(unresolved.is_empty());
    }

    #[test]
    fn cycle_terminates_and_reports_one_unsatisfied() {
        let mut catalog = Catalog::new();
        catalog.ensure_abstract("A");
        catalog.ensure_abstract("B");

        let a = with_depends(bare_package("A", "1-1"), &mut catalog, "B");
        catalog.insert_concrete(a.clone(), true);
        let b = with_depends(bare_package("B", "1-1"), &mut catalog, "A");
        catalog.insert_concrete(b, true);

        let a = catalog.get("A").unwrap().versions[0].clone();
        let mut unsatisfied = Vec::new();
        let unresolved =
            fetch_unsatisfied(&catalog, &a, &mut unsatisfied, &mut Visited::new(), false);
        assert!(unresolved.is_empty());
        assert_eq!(unsatisfied.len(), 1);
        assert_eq!(unsatisfied[0].name.as_ref(), "B");
    }

    #[test]
    fn unresolvable_hard_dependency_is_reported_by_name() {
        let mut catalog = Catalog::new();
        let a = with_depends(bare_package("A", "1-1"), &mut catalog, "ghost (>= 1)");
        catalog.insert_concrete(a.clone(), true);

        let mut unsatisfied = Vec::new();
        let unresolved =
            fetch_unsatisfied(&catalog, &a, &mut unsatisfied, &mut Visited::new(), false);
        assert_eq!(unresolved, vec!["ghost (>= 1)".to_string()]);
    }

    #[test]
    fn greedy_dependency_adds_installable_satisfier_but_not_broken_one() {
        let mut catalog = Catalog::new();
        catalog.insert_concrete(bare_package("plugin-x", "1-1"), true);
        let plugin_y = with_depends(bare_package("plugin-y", "1-1"), &mut catalog, "missing");
        catalog.insert_concrete(plugin_y, true);

        let mut app = bare_package("app", "1-1");
        app.greedy_depends = parse_dependency_field("plugin-x | plugin-y", DependencyKind::Depend, |n| {
            catalog.ensure_abstract(n)
        })
        .unwrap()
        .into_iter()
        .map(|mut c| {
            c.kind = DependencyKind::GreedyDepend;
            c
        })
        .collect();
        catalog.insert_concrete(app.clone(), true);

        let mut unsatisfied = Vec::new();
        let unresolved =
            fetch_unsatisfied(&catalog, &app, &mut unsatisfied, &mut Visited::new(), false);
        assert!(unresolved.is_empty());
        assert!(unsatisfied.iter().any(|p| p.name.as_ref() == "plugin-x"));
        assert!(!unsatisfied.iter().any(|p| p.name.as_ref() == "plugin-y"));
    }
}
