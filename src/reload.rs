//! Detail-reload driver (spec §4.7): packages referenced only by name via
//! `Provides`/`Depends` have no detail until their own feed stanza is
//! parsed. This module re-reads feeds, pass after pass, until every such
//! name has been resolved.

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::control::{parse_stanzas, ParseOptions, StanzaOrigin, StanzaResult};

/// A source of feed text, keyed by feed id. Stands in for reading package
/// index files off disk or over the network.
pub trait FeedSource {
    /// The feed ids known to this source; consulted once per driver pass.
    fn feed_ids(&self) -> Vec<String>;
    /// Opens the feed identified by `id` for reading.
    fn read(&self, id: &str) -> std::io::Result<Box<dyn Read>>;
}

/// Resolves an architecture string to its configured priority; 0 means
/// "not supported on this system".
pub trait ArchTable {
    /// Priority for `arch`, or 0 if unsupported.
    fn priority(&self, arch: &str) -> i32;
}

/// What: Drive the detail-reload loop to completion, pulling in full
/// records for every abstract package that was only ever referenced by
/// name.
///
/// Inputs:
/// - `catalog`: updated in place as each pass resolves more names.
/// - `feeds`: the feed set to re-read, once per pass.
/// - `archs`: resolves architecture strings to priorities for the parser.
///
/// Output: the number of passes performed over the feed set (`0` if
/// nothing needed detail to begin with), or an I/O error from a feed read.
///
/// Details: repeatedly walks the catalog counting abstract packages with
/// `need_detail` set but not yet marked this invocation, marks them, then
/// re-reads every feed requesting only stanzas for names that still need
/// detail. Stops once a pass finds nothing new to mark; termination is
/// guaranteed because `marked` only grows within one invocation.
pub fn reload_details(
    catalog: &mut Catalog,
    feeds: &dyn FeedSource,
    archs: &dyn ArchTable,
) -> std::io::Result<u32> {
    let mut marked: HashSet<Arc<str>> = HashSet::new();
    let mut passes = 0u32;

    loop {
        let pending: Vec<Arc<str>> = catalog
            .all_abstracts()
            .filter(|a| a.flags.need_detail && !marked.contains(&a.name))
            .map(|a| a.name.clone())
            .collect();

        if pending.is_empty() {
            break;
        }

        for name in &pending {
            marked.insert(name.clone());
        }

        let needs_detail: HashSet<Arc<str>> = catalog
            .all_abstracts()
            .filter(|a| a.flags.need_detail)
            .map(|a| a.name.clone())
            .collect();

        for feed_id in feeds.feed_ids() {
            let mut text = String::new();
            feeds.read(&feed_id)?.read_to_string(&mut text)?;
            let options = ParseOptions {
                details_reload: true,
                origin: StanzaOrigin::Feed(feed_id.clone()),
                ..ParseOptions::default()
            };
            let mut new_packages = Vec::new();
            parse_stanzas(
                &text,
                options,
                |n| catalog.ensure_abstract(n),
                |arch| archs.priority(arch),
                |n| needs_detail.contains(n),
                |result| {
                    if let StanzaResult::Package(pkg) = result {
                        new_packages.push(pkg);
                    } else if let StanzaResult::MissingIdentity { name } = result {
                        tracing::info!(notice = true, package = %name, "discarding stanza with no usable architecture");
                    }
                },
            );
            for pkg in new_packages {
                catalog.insert_concrete(pkg, false);
            }
        }

        passes += 1;
    }

    Ok(passes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeFeeds {
        contents: HashMap<String, String>,
        reads: RefCell<Vec<String>>,
    }

    impl FeedSource for FakeFeeds {
        fn feed_ids(&self) -> Vec<String> {
            self.contents.keys().cloned().collect()
        }

        fn read(&self, id: &str) -> std::io::Result<Box<dyn Read>> {
            self.reads.borrow_mut().push(id.to_string());
            let bytes = self.contents.get(id).cloned().unwrap_or_default().into_bytes();
            Ok(Box::new(std::io::Cursor::new(bytes)))
        }
    }

    struct FlatArchTable;
    impl ArchTable for FlatArchTable {
        fn priority(&self, arch: &str) -> i32 {
            if arch.is_empty() { 0 } else { 10 }
        }
    }

    #[test]
    fn reload_pulls_in_detail_for_referenced_only_name() {
        let mut catalog = Catalog::new();
        catalog.ensure_abstract("libfoo");
        assert!(catalog.get("libfoo").unwrap().flags.need_detail);

        let mut contents = HashMap::new();
        contents.insert(
            "main".to_string(),
            "Package: libfoo\nVersion: 1.0-1\nArchitecture: all\n\nPackage: unrelated\nVersion: 1.0-1\nArchitecture: all\n"
                .to_string(),
        );
        let feeds = FakeFeeds { contents, reads: RefCell::new(Vec::new()) };

        let passes = reload_details(&mut catalog, &feeds, &FlatArchTable).unwrap();
        assert_eq!(passes, 1);
        assert!(!catalog.get("libfoo").unwrap().flags.need_detail);
        assert_eq!(catalog.get("libfoo").unwrap().versions.len(), 1);
        // The unrelated stanza never needed detail and must be skipped.
        assert!(catalog.get("unrelated").is_none());
    }

    #[test]
    fn no_pending_names_performs_zero_passes() {
        let mut catalog = Catalog::new();
        let feeds = FakeFeeds { contents: HashMap::new(), reads: RefCell::new(Vec::new()) };
        let passes = reload_details(&mut catalog, &feeds, &FlatArchTable).unwrap();
        assert_eq!(passes, 0);
    }

    #[test]
    fn terminates_when_dependency_chain_is_never_resolved() {
        let mut catalog = Catalog::new();
        catalog.ensure_abstract("ghost");

        let feeds = FakeFeeds { contents: HashMap::new(), reads: RefCell::new(Vec::new()) };
        let passes = reload_details(&mut catalog, &feeds, &FlatArchTable).unwrap();
        // One pass marks "ghost"; no feed ever satisfies it, so the second
        // pass finds nothing new and the loop ends.
        assert_eq!(passes, 1);
        assert!(catalog.get("ghost").unwrap().flags.need_detail);
    }
}
