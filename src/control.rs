//! RFC-822-style stanza parser: streams a feed or status file and emits one
//! populated [`Package`] per blank-line-separated stanza.

use std::collections::HashSet;

use crate::catalog::{Alternative, Origin, Package, StateFlags, StateStatus, StateWant};
use crate::depexpr::{parse_dependency_field, CompoundDependency, DependencyKind};
use crate::version::Version;

/// Bitmask of fields a caller may suppress parsing of.
///
/// Mirrors the source's `pfm` (parse field mask): a global mask from
/// configuration is OR'd into the per-call mask before parsing begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldMask(u32);

impl FieldMask {
    /// Depends/Pre-Depends/Recommends/Suggests/Conflicts/Provides/Replaces.
    pub const DEPENDENCIES: Self = Self(1 << 0);
    /// Conffiles.
    pub const CONFFILES: Self = Self(1 << 1);
    /// Alternatives.
    pub const ALTERNATIVES: Self = Self(1 << 2);
    /// Description.
    pub const DESCRIPTION: Self = Self(1 << 3);

    /// Empty mask: nothing suppressed.
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    /// Whether `field` is suppressed by this mask.
    #[must_use]
    pub const fn suppresses(self, field: Self) -> bool {
        self.0 & field.0 != 0
    }

    /// Combines two masks.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// How `Description:` continuation lines are joined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptionStyle {
    /// Preserve newlines (interactive/TTY consumer).
    PreserveNewlines,
    /// Join continuation lines with spaces (non-interactive consumer).
    JoinWithSpaces,
}

/// Which kind of file is being streamed, and hence which [`Origin`] to
/// stamp onto every package produced.
#[derive(Clone, Debug)]
pub enum StanzaOrigin {
    /// A feed (package index) identified by this source id.
    Feed(String),
    /// A status file recording installed packages at this root.
    Status(String),
}

/// Parse-time options.
#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Fields suppressed globally, combined with any per-call mask.
    pub field_mask: FieldMask,
    /// How to join `Description:` continuation lines.
    pub description_style: DescriptionStyle,
    /// When set, a completed stanza is discarded unless `name_wants_detail`
    /// returns `true` for its package name (the §4.7 "details reload" pass).
    pub details_reload: bool,
    /// Which file this stanza stream came from.
    pub origin: StanzaOrigin,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            field_mask: FieldMask::none(),
            description_style: DescriptionStyle::JoinWithSpaces,
            details_reload: false,
            origin: StanzaOrigin::Feed("unknown-feed".to_string()),
        }
    }
}

/// Outcome of parsing one stanza.
pub enum StanzaResult {
    /// A fully populated package, ready for [`crate::catalog::Catalog::insert_concrete`].
    Package(Package),
    /// The stanza had no `Package:` field, or (during a details-reload
    /// pass) its name did not need detail; discarded silently.
    Discarded,
    /// The stanza had a name but no usable architecture/arch-priority.
    MissingIdentity {
        /// Name of the discarded package, for the NOTICE log line.
        name: String,
    },
}

/// What: Stream `text` (a full feed or status file) and invoke `on_stanza`
/// for each blank-line-separated block.
///
/// Inputs:
/// - `text`: the raw feed or status-file contents.
/// - `options`: field mask, description-joining style, details-reload
///   mode, and stanza origin for this stream.
/// - `ensure_abstract`: resolves a dependency/provides/replaces name into
///   a catalog handle, interning it if new.
/// - `arch_priority`: resolves an architecture string to its configured
///   priority (`0` meaning unsupported).
/// - `name_wants_detail`: consulted only when `options.details_reload` is
///   set; should return whether the named abstract package currently has
///   `need_detail` set.
/// - `on_stanza`: invoked once per stanza with its [`StanzaResult`].
///
/// Output: none; results are delivered entirely through `on_stanza`.
pub fn parse_stanzas(
    text: &str,
    options: ParseOptions,
    mut ensure_abstract: impl FnMut(&str) -> std::sync::Arc<str>,
    arch_priority: impl Fn(&str) -> i32,
    mut name_wants_detail: impl FnMut(&str) -> bool,
    mut on_stanza: impl FnMut(StanzaResult),
) {
    for raw_stanza in split_stanzas(text) {
        let fields = collect_fields(raw_stanza);
        on_stanza(parse_one_stanza(
            &fields,
            options,
            &mut ensure_abstract,
            &arch_priority,
            &mut name_wants_detail,
        ));
    }
}

fn split_stanzas(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// One logical `Field: value` entry, with continuation lines already
/// joined into `value`.
struct RawField<'a> {
    name: &'a str,
    value: String,
}

fn collect_fields(stanza: &str) -> Vec<RawField<'_>> {
    let lines: Vec<&str> = stanza.lines().collect();
    let mut fields = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.starts_with(' ') || line.starts_with('\t') {
            // Orphan continuation line with no preceding field; ignore.
            i += 1;
            continue;
        }
        let Some(colon) = line.find(':') else {
            i += 1;
            continue;
        };
        let name = line[..colon].trim();
        let mut value = line[colon + 1..].trim_start().to_string();
        i += 1;
        while i < lines.len() && (lines[i].starts_with(' ') || lines[i].starts_with('\t')) {
            value.push('\n');
            value.push_str(lines[i].trim_start());
            i += 1;
        }
        fields.push(RawField { name, value });
    }
    fields
}

fn find_field<'a>(fields: &'a [RawField<'a>], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .rev()
        .find(|f| field_name_eq(f.name, name))
        .map(|f| f.value.as_str())
}

fn field_name_eq(a: &str, b: &str) -> bool {
    // "MD5sum" and "MD5Sum" are both accepted; every other field name is
    // compared case-sensitively per the stanza format contract.
    if a.eq_ignore_ascii_case("md5sum") && b.eq_ignore_ascii_case("md5sum") {
        return true;
    }
    a == b
}

#[allow(clippy::too_many_lines)]
fn parse_one_stanza(
    fields: &[RawField<'_>],
    options: ParseOptions,
    ensure_abstract: &mut impl FnMut(&str) -> std::sync::Arc<str>,
    arch_priority: &impl Fn(&str) -> i32,
    name_wants_detail: &mut impl FnMut(&str) -> bool,
) -> StanzaResult {
    let Some(name) = find_field(fields, "Package") else {
        return StanzaResult::Discarded;
    };
    let name = name.trim();
    if name.is_empty() {
        return StanzaResult::Discarded;
    }

    if options.details_reload && !name_wants_detail(name) {
        return StanzaResult::Discarded;
    }

    let architecture = find_field(fields, "Architecture").unwrap_or_default().to_string();
    let arch_priority_value = arch_priority(&architecture);
    if architecture.is_empty() && arch_priority_value == 0 {
        return StanzaResult::MissingIdentity {
            name: name.to_string(),
        };
    }

    let version = Version::parse(find_field(fields, "Version").unwrap_or_default());

    let depends_mask = FieldMask::DEPENDENCIES;
    let (depends, pre_depends, recommends, suggests, greedy_depends, conflicts, provides, replaces) =
        if options.field_mask.suppresses(depends_mask) {
            (
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
            )
        } else {
            let mut all_depends = parse_field_compounds(
                fields,
                "Depends",
                DependencyKind::Depend,
                ensure_abstract,
            );
            let greedy_depends = take_greedy(&mut all_depends);
            let pre_depends = parse_field_compounds(
                fields,
                "Pre-Depends",
                DependencyKind::PreDepend,
                ensure_abstract,
            );
            let recommends = parse_field_compounds(
                fields,
                "Recommends",
                DependencyKind::Recommend,
                ensure_abstract,
            );
            let suggests = parse_field_compounds(
                fields,
                "Suggests",
                DependencyKind::Suggest,
                ensure_abstract,
            );
            let conflicts = parse_field_compounds(
                fields,
                "Conflicts",
                DependencyKind::Conflicts,
                ensure_abstract,
            );
            let provides = find_field(fields, "Provides")
                .map(|v| split_name_list(v, ensure_abstract))
                .unwrap_or_default();
            let replaces = find_field(fields, "Replaces")
                .map(|v| split_name_list(v, ensure_abstract))
                .unwrap_or_default();
            (
                all_depends,
                pre_depends,
                recommends,
                suggests,
                greedy_depends,
                conflicts,
                provides,
                replaces,
            )
        };

    let (state_want, state_status, mut state_flags) = find_field(fields, "Status")
        .map(|raw| parse_status(name, raw))
        .unwrap_or((StateWant::Unknown, StateStatus::NotInstalled, StateFlags::default()));

    if find_field(fields, "Essential").is_some_and(|v| v.eq_ignore_ascii_case("yes")) {
        state_flags.hold = true;
    }
    if find_field(fields, "Auto-Installed").is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("yes")) {
        state_flags.auto_installed = true;
    }

    let conffiles = if options.field_mask.suppresses(FieldMask::CONFFILES) {
        Vec::new()
    } else {
        find_field(fields, "Conffiles")
            .map(parse_conffiles)
            .unwrap_or_default()
    };

    let alternatives = if options.field_mask.suppresses(FieldMask::ALTERNATIVES) {
        Vec::new()
    } else {
        find_field(fields, "Alternatives")
            .map(parse_alternatives)
            .unwrap_or_default()
    };

    let description = if options.field_mask.suppresses(FieldMask::DESCRIPTION) {
        None
    } else {
        find_field(fields, "Description").map(|raw| match options.description_style {
            DescriptionStyle::PreserveNewlines => raw.to_string(),
            DescriptionStyle::JoinWithSpaces => raw.replace('\n', " "),
        })
    };

    let origin = match &options.origin {
        StanzaOrigin::Status(root) => Origin::Destination(root.clone()),
        StanzaOrigin::Feed(source_id) => Origin::Source(source_id.clone()),
    };

    let pkg = Package {
        name: ensure_abstract(name),
        version,
        architecture,
        arch_priority: arch_priority_value,
        origin,
        state_want,
        state_status,
        state_flags,
        provided_by_hand: false,
        depends,
        pre_depends,
        recommends,
        suggests,
        greedy_depends,
        conflicts,
        provides,
        replaces,
        conffiles,
        alternatives,
        description,
        maintainer: find_field(fields, "Maintainer").map(str::to_string),
        section: find_field(fields, "Section").map(str::to_string),
        source: find_field(fields, "Source").map(str::to_string),
        tags: find_field(fields, "Tags").map(str::to_string),
        filename: find_field(fields, "Filename").map(str::to_string),
        size: find_field(fields, "Size").and_then(|v| v.parse().ok()),
        installed_size: find_field(fields, "Installed-Size").and_then(|v| v.parse().ok()),
        checksums: ["MD5sum", "SHA256sum"]
            .iter()
            .filter_map(|field| find_field(fields, field).map(|v| ((*field).to_string(), v.to_string())))
            .collect(),
    };

    StanzaResult::Package(pkg)
}

fn parse_field_compounds(
    fields: &[RawField<'_>],
    field_name: &str,
    kind: DependencyKind,
    ensure_abstract: &mut impl FnMut(&str) -> std::sync::Arc<str>,
) -> Vec<CompoundDependency> {
    find_field(fields, field_name)
        .map(|raw| {
            parse_dependency_field(raw, kind, &mut *ensure_abstract).unwrap_or_else(|err| {
                tracing::error!(field = field_name, error = %err, "skipping malformed dependency field");
                Vec::new()
            })
        })
        .unwrap_or_default()
}

fn take_greedy(depends: &mut Vec<CompoundDependency>) -> Vec<CompoundDependency> {
    let mut greedy = Vec::new();
    depends.retain(|c| {
        if c.kind == DependencyKind::GreedyDepend {
            greedy.push(c.clone());
            false
        } else {
            true
        }
    });
    greedy
}

fn split_name_list(
    raw: &str,
    ensure_abstract: &mut impl FnMut(&str) -> std::sync::Arc<str>,
) -> Vec<std::sync::Arc<str>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| ensure_abstract(name.split_whitespace().next().unwrap_or(name)))
        .collect()
}

fn parse_status(package: &str, raw: &str) -> (StateWant, StateStatus, StateFlags) {
    let mut tokens = raw.split_whitespace();
    let want = match tokens.next() {
        Some("install") => StateWant::Install,
        Some("deinstall") => StateWant::Deinstall,
        Some("purge") => StateWant::Purge,
        Some(other) => {
            tracing::error!(package, token = other, "unrecognized Status want token, skipping field");
            StateWant::Unknown
        }
        None => StateWant::Unknown,
    };
    // The flag token ("ok", "hold", "reinstreq", ...) is optional in some
    // status files; if the second token is itself a status keyword, there
    // was no flag token and it IS the status. Otherwise it's a flag word
    // (only "hold" is meaningful here) and the real status follows.
    let mut flags = StateFlags::default();
    let second = tokens.next();
    let status_token = match second {
        Some("not-installed") | Some("unpacked") | Some("half-configured")
        | Some("installed") | Some("half-installed") | Some("config-files")
        | Some("post-inst-failed") | Some("removal-failed") => second,
        Some(flag_token) => {
            if flag_token == "hold" {
                flags.hold = true;
            }
            tokens.next()
        }
        None => None,
    };
    let status = match status_token {
        Some("not-installed") => StateStatus::NotInstalled,
        Some("unpacked") => StateStatus::Unpacked,
        Some("half-configured") => StateStatus::HalfConfigured,
        Some("installed") => StateStatus::Installed,
        Some("half-installed") => StateStatus::HalfInstalled,
        Some("config-files") => StateStatus::ConfigFiles,
        Some("post-inst-failed") => StateStatus::PostInstFailed,
        Some("removal-failed") => StateStatus::RemovalFailed,
        Some(other) => {
            tracing::error!(package, token = other, "unrecognized Status status token, skipping field");
            StateStatus::NotInstalled
        }
        None => StateStatus::NotInstalled,
    };
    (want, status, flags)
}

fn parse_conffiles(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let mut parts = line.split_whitespace();
            let path = parts.next()?;
            let Some(md5) = parts.next() else {
                tracing::error!(line, "malformed Conffiles line, skipping");
                return None;
            };
            Some((path.to_string(), md5.to_string()))
        })
        .collect()
}

fn parse_alternatives(raw: &str) -> Vec<Alternative> {
    raw.split(',')
        .filter_map(|item| {
            let item = item.trim();
            let mut parts = item.splitn(3, ':');
            let priority: i32 = parts.next()?.trim().parse().ok()?;
            let target_path = parts.next()?.trim();
            let source_path = parts.next()?.trim();
            if !target_path.starts_with('/') || source_path.is_empty() {
                return None;
            }
            Some(Alternative {
                priority,
                target_path: target_path.to_string(),
                source_path: source_path.to_string(),
            })
        })
        .collect()
}

/// Returns the set of package names referenced only as dependency targets,
/// with no concrete version of their own yet — the input to the §4.7
/// detail-reload driver's first pass.
#[must_use]
pub fn names_needing_detail<'a>(
    pkgs: impl Iterator<Item = &'a Package>,
) -> HashSet<std::sync::Arc<str>> {
    let mut names = HashSet::new();
    for pkg in pkgs {
        for compound in pkg
            .depends
            .iter()
            .chain(pkg.pre_depends.iter())
            .chain(pkg.recommends.iter())
            .chain(pkg.suggests.iter())
            .chain(pkg.greedy_depends.iter())
        {
            for atom in &compound.possibilities {
                names.insert(atom.target.clone());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_parse(text: &str) -> Vec<StanzaResult> {
        let mut results = Vec::new();
        let mut seen: Vec<std::sync::Arc<str>> = Vec::new();
        parse_stanzas(
            text,
            ParseOptions::default(),
            |name| {
                if let Some(existing) = seen.iter().find(|s: &&std::sync::Arc<str>| s.as_ref() == name) {
                    return existing.clone();
                }
                let handle: std::sync::Arc<str> = std::sync::Arc::from(name);
                seen.push(handle.clone());
                handle
            },
            |arch| if arch.is_empty() { 0 } else { 10 },
            |_| false,
            |r| results.push(r),
        );
        results
    }

    #[test]
    fn simple_stanza_produces_package() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\n";
        let results = run_parse(text);
        assert_eq!(results.len(), 1);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert_eq!(pkg.name.as_ref(), "foo");
                assert_eq!(pkg.version.upstream, "1.0");
            }
            _ => panic!("expected Package"),
        }
    }

    #[test]
    fn blank_stanza_without_package_field_is_discarded() {
        let text = "Version: 1.0-1\nArchitecture: all\n";
        let results = run_parse(text);
        assert!(matches!(results[0], StanzaResult::Discarded));
    }

    #[test]
    fn missing_architecture_and_priority_is_missing_identity() {
        let text = "Package: foo\nVersion: 1.0-1\n";
        let results = run_parse(text);
        assert!(matches!(results[0], StanzaResult::MissingIdentity { .. }));
    }

    #[test]
    fn continuation_lines_are_joined() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\nDescription: line one\n line two\n line three\n";
        let results = run_parse(text);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert_eq!(pkg.description.as_deref(), Some("line one line two line three"));
            }
            _ => panic!("expected Package"),
        }
    }

    #[test]
    fn multiple_stanzas_separated_by_blank_lines() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\n\nPackage: bar\nVersion: 2.0-1\nArchitecture: all\n";
        let results = run_parse(text);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn conffiles_parses_path_and_md5_pairs() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\nConffiles:\n /etc/foo.conf abc123\n /etc/bar.conf def456\n";
        let results = run_parse(text);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert_eq!(pkg.conffiles.len(), 2);
                assert_eq!(pkg.conffiles[0], ("/etc/foo.conf".to_string(), "abc123".to_string()));
            }
            _ => panic!("expected Package"),
        }
    }

    #[test]
    fn alternatives_skips_relative_target_or_empty_source() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\nAlternatives: 50:/usr/bin/editor:/usr/bin/vim, 10:rel/path:/usr/bin/nano\n";
        let results = run_parse(text);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert_eq!(pkg.alternatives.len(), 1);
                assert_eq!(pkg.alternatives[0].target_path, "/usr/bin/editor");
            }
            _ => panic!("expected Package"),
        }
    }

    #[test]
    fn greedy_depends_split_out_of_depends() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\nDepends: bar, plugin-x | plugin-y*\n";
        let results = run_parse(text);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert_eq!(pkg.depends.len(), 1);
                assert_eq!(pkg.greedy_depends.len(), 1);
            }
            _ => panic!("expected Package"),
        }
    }

    #[test]
    fn status_with_ok_flag_token_parses_real_status() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\nStatus: install ok installed\n";
        let results = run_parse(text);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert_eq!(pkg.state_want, StateWant::Install);
                assert_eq!(pkg.state_status, StateStatus::Installed);
                assert!(!pkg.state_flags.hold);
            }
            _ => panic!("expected Package"),
        }
    }

    #[test]
    fn status_with_hold_flag_token_sets_hold_and_parses_status() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\nStatus: install hold installed\n";
        let results = run_parse(text);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert_eq!(pkg.state_status, StateStatus::Installed);
                assert!(pkg.state_flags.hold);
            }
            _ => panic!("expected Package"),
        }
    }

    #[test]
    fn status_with_two_tokens_and_no_flag_parses_status_directly() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\nStatus: purge not-installed\n";
        let results = run_parse(text);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert_eq!(pkg.state_want, StateWant::Purge);
                assert_eq!(pkg.state_status, StateStatus::NotInstalled);
            }
            _ => panic!("expected Package"),
        }
    }

    #[test]
    fn md5sum_field_name_casing_is_accepted() {
        let text = "Package: foo\nVersion: 1.0-1\nArchitecture: all\nMD5Sum: deadbeef\n";
        let results = run_parse(text);
        match &results[0] {
            StanzaResult::Package(pkg) => {
                assert!(pkg.checksums.iter().any(|(k, v)| k == "MD5sum" && v == "deadbeef"));
            }
            _ => panic!("expected Package"),
        }
    }
}
