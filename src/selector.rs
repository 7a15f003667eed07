//! Candidate selector: `best_installation_candidate`, the heart of how the
//! resolver turns a requested name into a single concrete [`Package`].

use crate::catalog::{Catalog, Package};

/// A predicate a candidate must satisfy to even be considered, independent
/// of the precedence rules in [`best_installation_candidate`] (e.g. "must
/// already be installed", "must satisfy version constraint X").
pub trait CandidatePredicate {
    /// Whether `pkg` is acceptable at all.
    fn accepts(&self, pkg: &Package) -> bool;
}

impl<F: Fn(&Package) -> bool> CandidatePredicate for F {
    fn accepts(&self, pkg: &Package) -> bool {
        self(pkg)
    }
}

/// What: Pick the single best concrete package satisfying `predicate` among
/// everything that provides `name`.
///
/// Inputs:
/// - `catalog`: where providers and their concrete versions live.
/// - `name`: the dependency target name being resolved (may be virtual).
/// - `predicate`: a caller-supplied acceptance test, independent of the
///   precedence rules below (version constraint, installed-only, etc).
/// - `cli_mentions`: package names the outer caller named explicitly (e.g.
///   on a command line); candidates whose parent name appears here get a
///   scoring bonus, giving the user's own wording a say in disambiguation.
/// - `quiet`: when `true`, skips the `priorized_matching` step entirely
///   even with multiple providers, for callers probing candidates
///   speculatively rather than resolving for real.
/// - `closure_resolvable`: answers whether a candidate's own dependency
///   closure can in principle be satisfied; callers pass the walker in
///   pre-check mode here, and a package whose dependencies are
///   unsatisfiable is never offered as a candidate.
///
/// Output: the winning candidate, or `None` if nothing satisfies
/// `predicate` and has a supported architecture.
///
/// Details: precedence runs `good_pkg_by_name` -> `held_pkg` ->
/// `latest_installed_parent` -> `priorized_matching` -> (single provider
/// only) `latest_matching` -> `None`, exactly the order the module docs
/// describe.
#[allow(clippy::too_many_arguments)]
pub fn best_installation_candidate<'c>(
    catalog: &'c Catalog,
    name: &str,
    predicate: &dyn CandidatePredicate,
    cli_mentions: &std::collections::HashSet<String>,
    quiet: bool,
    closure_resolvable: &mut dyn FnMut(&Package) -> bool,
) -> Option<&'c Package> {
    let Some(apkg) = catalog.get(name) else {
        return None;
    };

    // Step 1: accumulate providers, substituting replacers.
    let mut providers: Vec<&str> = Vec::new();
    for provider_name in &apkg.provided_by {
        let Some(provider) = catalog.get(provider_name) else {
            continue;
        };
        if provider.replaced_by.is_empty() {
            providers.push(provider_name);
            continue;
        }
        if provider.replaced_by.len() > 1 {
            tracing::info!(
                notice = true,
                package = provider_name.as_ref(),
                "multiple replacers found, using first"
            );
        }
        let replacer = provider.replaced_by.iter().next().expect("non-empty checked above");
        if !providers.iter().any(|p| *p == replacer.as_ref()) {
            providers.push(replacer);
        }
    }

    // Step 2: build matching_pkgs across providers' concrete versions.
    let mut matching_pkgs: Vec<&Package> = Vec::new();
    let mut wrong_arch_found = false;
    let distinct_providers = providers.len();
    for provider_name in &providers {
        let Some(provider) = catalog.get(provider_name) else {
            continue;
        };
        let mut any_right_arch = false;
        for candidate in &provider.versions {
            if candidate.arch_priority <= 0 {
                continue;
            }
            any_right_arch = true;
            if !predicate.accepts(candidate) {
                continue;
            }
            if !closure_resolvable(candidate) {
                continue;
            }
            if candidate.provided_by_hand {
                return Some(candidate);
            }
            matching_pkgs.push(candidate);
        }
        if !any_right_arch && !provider.versions.is_empty() {
            wrong_arch_found = true;
        }
    }

    if matching_pkgs.is_empty() {
        if wrong_arch_found {
            tracing::error!(package = name, "no candidate with a supported architecture");
        }
        return None;
    }

    matching_pkgs.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.version.cmp(&b.version))
            .then_with(|| a.architecture.cmp(&b.architecture))
    });

    // Step 5: score-by-name pass. A candidate only "wins" by name when its
    // score is a unique maximum: when every candidate shares the same name
    // as `apkg` (the common non-virtual case), they all score identically
    // and the pass must be a no-op, deferring to held/installed/priority
    // below rather than picking whichever sorted first.
    let mut good_pkg_by_name: Option<&Package> = None;
    let mut best_score = 0i32;
    let mut best_score_tied = false;
    for candidate in &matching_pkgs {
        let mut score = 1;
        if candidate.name.as_ref() == apkg.name.as_ref() {
            score += 1;
        }
        if cli_mentions.contains(candidate.name.as_ref()) {
            score += 1;
        }
        match score.cmp(&best_score) {
            std::cmp::Ordering::Greater => {
                best_score = score;
                good_pkg_by_name = Some(candidate);
                best_score_tied = false;
            }
            std::cmp::Ordering::Equal => best_score_tied = true,
            std::cmp::Ordering::Less => {}
        }
    }
    if best_score_tied {
        good_pkg_by_name = None;
    }

    // Step 6: state passes. `latest_installed_parent` tracks the latest
    // candidate that is itself installed/unpacked, not merely a candidate
    // sharing a name with some other installed version.
    let mut latest_matching: Option<&Package> = None;
    let mut latest_installed_parent: Option<&Package> = None;
    let mut held_pkg: Option<&Package> = None;
    let mut held_count = 0;
    for candidate in &matching_pkgs {
        latest_matching = Some(candidate);
        if candidate.is_installed() {
            latest_installed_parent = Some(candidate);
        }
        if candidate.state_flags.hold || candidate.state_flags.prefer {
            held_pkg = Some(candidate);
            held_count += 1;
        }
    }
    if held_count > 1 {
        tracing::info!(notice = true, package = name, "multiple held/preferred candidates found");
    }

    // Step 7: priorized_matching, only considered with multiple providers.
    let priorized_matching = if distinct_providers > 1 && !quiet {
        matching_pkgs
            .iter()
            .copied()
            .max_by_key(|p| p.arch_priority)
    } else {
        None
    };

    good_pkg_by_name
        .or(held_pkg)
        .or(latest_installed_parent)
        .or(priorized_matching)
        .or_else(|| {
            if distinct_providers == 1 {
                latest_matching
            } else {
                None
            }
        })
}
