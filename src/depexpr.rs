//! Dependency expression parser: turns a `Depends:`-style field value into
//! structured [`CompoundDependency`] entries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{ResolverError, Result};
use crate::version::{Version, VersionConstraint};

/// The clause a [`CompoundDependency`] was parsed from (`Depends:`,
/// `Conflicts:`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    /// `Depends:`.
    Depend,
    /// `Pre-Depends:`.
    PreDepend,
    /// `Recommends:`.
    Recommend,
    /// `Suggests:`.
    Suggest,
    /// A `Depends:` compound whose final atom carried a trailing `*`.
    GreedyDepend,
    /// `Conflicts:`.
    Conflicts,
}

/// One `NAME [(OP VER)]` term inside a compound dependency.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DependencyAtom {
    /// Name of the target abstract package.
    pub target: Arc<str>,
    /// Relational operator; `None` means any version satisfies.
    pub constraint: VersionConstraint,
    /// Required version, present iff `constraint != VersionConstraint::None`.
    pub version: Option<Version>,
}

/// A disjunction of [`DependencyAtom`]s: any one atom satisfies the whole
/// compound.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompoundDependency {
    /// Which field this compound came from.
    pub kind: DependencyKind,
    /// Non-empty list of alternatives, separated by `|` in the source text.
    pub possibilities: SmallVec<[DependencyAtom; 2]>,
}

/// What: Parse the right-hand side of a `Depends:`/`Conflicts:`/... line
/// into compound dependencies.
///
/// Inputs:
/// - `field`: the comma-separated field value, e.g. `"foo (>= 1.2) | bar"`.
/// - `base_kind`: the kind assigned to each compound, except that a
///   trailing `*` token on a compound's final atom promotes that compound
///   to [`DependencyKind::GreedyDepend`] regardless of `base_kind` (this
///   only makes sense when `base_kind` is [`DependencyKind::Depend`]; the
///   `*` suffix is only meaningful on `Depends:` fields).
/// - `ensure_abstract`: called for every package name encountered, so the
///   catalog gains placeholder nodes as a side effect of parsing.
///
/// Output: the parsed compounds, in source order.
///
/// # Errors
///
/// A malformed atom fails the whole compound it belongs to with
/// [`ResolverError::ParseDepExpr`]; no partial compound is committed.
/// Callers that want best-effort partial results should split `field` on
/// commas themselves and parse each compound independently.
pub fn parse_dependency_field(
    field: &str,
    base_kind: DependencyKind,
    mut ensure_abstract: impl FnMut(&str) -> Arc<str>,
) -> Result<Vec<CompoundDependency>> {
    let mut compounds = Vec::new();
    for raw_compound in field.split(',') {
        let raw_compound = raw_compound.trim();
        if raw_compound.is_empty() {
            continue;
        }
        compounds.push(parse_compound(raw_compound, base_kind, &mut ensure_abstract)?);
    }
    Ok(compounds)
}

fn parse_compound(
    raw: &str,
    base_kind: DependencyKind,
    ensure_abstract: &mut impl FnMut(&str) -> Arc<str>,
) -> Result<CompoundDependency> {
    let mut raw = raw.trim();
    let mut greedy = false;
    if let Some(stripped) = raw.strip_suffix('*') {
        greedy = true;
        raw = stripped.trim_end();
    }

    let mut possibilities = SmallVec::new();
    for raw_atom in raw.split('|') {
        possibilities.push(parse_atom(raw_atom.trim(), ensure_abstract)?);
    }

    let kind = if greedy && base_kind == DependencyKind::Depend {
        DependencyKind::GreedyDepend
    } else {
        base_kind
    };

    Ok(CompoundDependency {
        kind,
        possibilities,
    })
}

fn parse_atom(
    raw: &str,
    ensure_abstract: &mut impl FnMut(&str) -> Arc<str>,
) -> Result<DependencyAtom> {
    let Some(paren_start) = raw.find('(') else {
        if raw.is_empty() || !is_valid_name(raw) {
            return Err(ResolverError::ParseDepExpr {
                token: raw.to_string(),
                reason: "empty or invalid package name".to_string(),
            });
        }
        return Ok(DependencyAtom {
            target: ensure_abstract(raw),
            constraint: VersionConstraint::None,
            version: None,
        });
    };

    let name = raw[..paren_start].trim();
    if name.is_empty() || !is_valid_name(name) {
        return Err(ResolverError::ParseDepExpr {
            token: raw.to_string(),
            reason: "empty or invalid package name".to_string(),
        });
    }

    let Some(paren_end) = raw.rfind(')') else {
        return Err(ResolverError::ParseDepExpr {
            token: raw.to_string(),
            reason: "missing closing paren".to_string(),
        });
    };
    if paren_end < paren_start {
        return Err(ResolverError::ParseDepExpr {
            token: raw.to_string(),
            reason: "missing closing paren".to_string(),
        });
    }

    let inner = raw[paren_start + 1..paren_end].trim();
    let (op, version_str) = split_operator(inner).ok_or_else(|| ResolverError::ParseDepExpr {
        token: raw.to_string(),
        reason: "unrecognized version operator".to_string(),
    })?;

    Ok(DependencyAtom {
        target: ensure_abstract(name),
        constraint: op,
        version: Some(Version::parse(version_str)),
    })
}

/// Operators in order of precedence: two-character operators must be tried
/// before their one-character legacy aliases so `<=` is never mistaken for
/// the legacy `<`.
const OPERATORS: &[(&str, VersionConstraint)] = &[
    ("<<", VersionConstraint::Earlier),
    ("<=", VersionConstraint::EarlierEqual),
    (">=", VersionConstraint::LaterEqual),
    (">>", VersionConstraint::Later),
    ("=", VersionConstraint::Equal),
    ("<", VersionConstraint::EarlierEqual),
    (">", VersionConstraint::LaterEqual),
];

fn split_operator(inner: &str) -> Option<(VersionConstraint, &str)> {
    for (token, constraint) in OPERATORS {
        if let Some(rest) = inner.strip_prefix(token) {
            let rest = rest.trim();
            if !rest.is_empty() && !rest.contains(')') {
                return Some((*constraint, rest));
            }
        }
    }
    None
}

fn is_valid_name(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'.' | b'-'))
}
