//! Directory listing.
//!
//! A directory's children are its explicit rows one level down plus one
//! synthesized directory per distinct first segment of deeper rows. When a
//! segment has both, the explicit row is authoritative.

use std::collections::btree_map::{BTreeMap, Entry as Slot};
use std::sync::Arc;

use super::entry::Entry;
use super::path;
use super::SqlarFs;
use crate::store::Children;
use crate::vfs::{VfsError, VfsResult};

impl SqlarFs {
    /// List a directory that has already been resolved.
    pub(crate) fn list_resolved(&self, dir_path: &str, dir: &Entry) -> VfsResult<Vec<Arc<Entry>>> {
        if !dir.is_dir() {
            return Err(VfsError::not_a_directory(dir_path));
        }
        let perm = dir.perm();
        if !self.perm_mask.can_read(perm) || !self.perm_mask.can_traverse(perm) {
            return Err(VfsError::permission_denied(dir_path));
        }

        let children = self
            .store
            .children(&path::child_prefix(dir_path))
            .map_err(|e| VfsError::store(dir_path, e))?;
        Ok(self.synthesize(dir_path, children))
    }

    /// Merge explicit and inferred children into a name-sorted entry set.
    ///
    /// Every directory entry produced here goes through the cache, so a later
    /// stat of the same path returns the same instance.
    fn synthesize(&self, dir_path: &str, children: Children) -> Vec<Arc<Entry>> {
        let prefix = path::child_prefix(dir_path);
        let mut entries: BTreeMap<String, Arc<Entry>> = BTreeMap::new();

        for row in children.rows {
            let Some(name) = row.name.strip_prefix(prefix.as_str()) else {
                tracing::warn!(dir = dir_path, row = %row.name, "row outside listed directory");
                continue;
            };
            if !path::is_valid_segment(name) {
                tracing::warn!(dir = dir_path, row = %row.name, "skipping row with invalid name");
                continue;
            }

            let mut entry = Arc::new(Entry::from_row(name, &row));
            if entry.is_dir() {
                entry = self.dirs.store(&path::join(dir_path, name), entry);
            }
            if let Slot::Vacant(slot) = entries.entry(name.to_string()) {
                slot.insert(entry);
            }
        }

        for name in children.subdirs {
            if !path::is_valid_segment(&name) {
                tracing::warn!(dir = dir_path, segment = %name, "skipping invalid inferred directory");
                continue;
            }
            match entries.get(&name) {
                Some(existing) if existing.is_dir() => continue,
                Some(_) => {
                    // A file row with rows below it: the directory reading wins.
                    tracing::warn!(dir = dir_path, name = %name, "dropping file shadowed by deeper rows");
                }
                None => {}
            }
            let entry = self.dirs.store(
                &path::join(dir_path, &name),
                Arc::new(Entry::synthesized_dir(name.as_str())),
            );
            entries.insert(name, entry);
        }

        entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::perm::PermMask;
    use crate::store::{Row, RowId};

    fn row(id: i64, name: &str, mode: i64) -> Row {
        Row::decode(id, name.to_string(), mode, 1_000, 0).unwrap()
    }

    fn names(entries: &[Arc<Entry>]) -> Vec<&str> {
        entries.iter().map(|e| e.name()).collect()
    }

    fn fs() -> SqlarFs {
        SqlarFs::with_perm_mask(crate::store::MemoryStore::new(), PermMask::Any)
    }

    #[test]
    fn test_sorted_and_merged() {
        let fs = fs();
        let children = Children {
            rows: vec![row(1, "sub/z.txt", 0o100644), row(2, "sub/a.txt", 0o100644)],
            subdirs: vec!["m".into(), "b".into()],
        };
        let entries = fs.synthesize("sub", children);
        assert_eq!(names(&entries), vec!["a.txt", "b", "m", "z.txt"]);
        assert!(entries[1].is_synthesized());
        assert_eq!(fs.dirs.len(), 2);
    }

    #[test]
    fn test_explicit_dir_wins_over_inferred() {
        let fs = fs();
        let children = Children {
            rows: vec![row(7, "docs", 0o040750)],
            subdirs: vec!["docs".into()],
        };
        let entries = fs.synthesize(".", children);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].row_id(), Some(RowId(7)));
        assert_eq!(entries[0].perm(), 0o750);
        assert!(Arc::ptr_eq(&entries[0], &fs.dirs.load("docs").unwrap()));
    }

    #[test]
    fn test_shadowed_file_not_mixed() {
        let fs = fs();
        let children = Children {
            rows: vec![row(3, "a", 0o100644)],
            subdirs: vec!["a".into()],
        };
        let entries = fs.synthesize(".", children);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_dir());
        assert!(entries[0].is_synthesized());
    }

    #[test]
    fn test_reuses_cached_entries() {
        let fs = fs();
        let cached = fs.dirs.store("sub/deep", Arc::new(Entry::synthesized_dir("deep")));
        let children = Children {
            rows: vec![],
            subdirs: vec!["deep".into()],
        };
        let entries = fs.synthesize("sub", children);
        assert!(Arc::ptr_eq(&entries[0], &cached));
    }

    #[test]
    fn test_invalid_names_skipped() {
        let fs = fs();
        let children = Children {
            rows: vec![row(1, "sub/..", 0o100644), row(2, "elsewhere/x", 0o100644)],
            subdirs: vec![".".into(), String::new()],
        };
        assert!(fs.synthesize("sub", children).is_empty());
    }
}
