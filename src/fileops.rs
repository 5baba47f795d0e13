// src/fileops.rs

//! Per-commit file operations against the parent tree.
//!
//! A commit's fileop list holds a Modify for every file that is new or
//! changed relative to the parent and a Delete for every parent file that
//! vanished. Paths are the translated output paths (CVS layout fragments
//! stripped), and the list is sorted so that entries inside a directory
//! precede the directory itself.

use crate::atom::Atom;
use crate::dag::{CommitId, Dag, FileRevId};
use crate::error::{Error, Result};
use crate::links::LinkTable;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

pub enum FileOp {
    Modify {
        /// Normalized mode: 0o644 or 0o755, nothing else.
        mode: u32,
        rev: FileRevId,
        path: String,
    },
    Delete {
        path: String,
    },
}

impl FileOp {
    pub fn path(&self) -> &str {
        match self {
            FileOp::Modify { path, .. } | FileOp::Delete { path } => path,
        }
    }
}

/// Cache of master-atom → translated output path.
#[derive(Default)]
pub struct PathCache {
    map: HashMap<Atom, String>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, atom: Atom, master: &str, strip: usize) -> Result<&str> {
        let cached = match self.map.entry(atom) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => v.insert(export_path(master, strip)?),
        };
        Ok(cached)
    }
}

/// Compute the ordered fileop list for `commit` against `parent`.
pub fn build_fileops(
    dag: &Dag,
    commit: CommitId,
    parent: Option<CommitId>,
    links: &LinkTable,
    paths: &mut PathCache,
    strip: usize,
) -> Result<Vec<FileOp>> {
    let mut ops = Vec::new();

    let parent_files: Vec<FileRevId> = match parent {
        Some(p) => dag.commit(p).files().collect(),
        None => Vec::new(),
    };

    for (pos, rev_id) in dag.commit(commit).files().enumerate() {
        let changed = match links.parent_of(pos) {
            // Absent in the parent tree.
            None => true,
            // Same master in both; changed iff the revisions differ.
            Some(ppos) => parent_files[ppos] != rev_id,
        };
        if changed {
            let rev = dag.rev(rev_id);
            let path = paths
                .translate(rev.master, dag.names().resolve(rev.master), strip)?
                .to_string();
            ops.push(FileOp::Modify {
                mode: clamp_mode(rev.mode),
                rev: rev_id,
                path,
            });
        }
    }

    for (ppos, &prev_id) in parent_files.iter().enumerate() {
        if links.child_of(ppos).is_none() {
            let rev = dag.rev(prev_id);
            let path = paths
                .translate(rev.master, dag.names().resolve(rev.master), strip)?
                .to_string();
            ops.push(FileOp::Delete { path });
        }
    }

    ops.sort_by(|a, b| path_order(a.path(), b.path()));
    Ok(ops)
}

/// Translate a master path into its output path: drop the strip prefix,
/// drop `Attic/` and `RCS/` components, drop a trailing `,v`, and rename
/// a `.cvsignore` basename to `.gitignore`.
pub fn export_path(master: &str, strip: usize) -> Result<String> {
    let bad = || Error::BadMasterPath(master.to_string());

    let stripped = master.get(strip..).ok_or_else(bad)?;
    let mut parts: Vec<&str> = stripped.split('/').collect();
    let base = parts.pop().ok_or_else(bad)?;
    parts.retain(|&c| c != "Attic" && c != "RCS");

    let mut base = base.strip_suffix(",v").unwrap_or(base);
    if base == ".cvsignore" {
        base = ".gitignore";
    }
    if base.is_empty() {
        return Err(bad());
    }

    let mut path = String::with_capacity(stripped.len());
    for part in parts {
        path.push_str(part);
        path.push('/');
    }
    path.push_str(base);
    Ok(path)
}

/// Whether a master's payload gets the CVS-ignore boilerplate prefix.
pub fn master_is_cvsignore(master: &str) -> bool {
    let base = match master.rfind('/') {
        Some(pos) => &master[pos + 1..],
        None => master,
    };
    base.strip_suffix(",v").unwrap_or(base) == ".cvsignore"
}

/// git fast-import only accepts 644 and 755 file modes.
pub fn clamp_mode(mode: u32) -> u32 {
    if mode & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

/// Path order for fileops: segment-wise comparison, with a path sorting
/// before any of its prefixes, so deletes of entries inside a directory
/// precede a replacement of the directory itself.
pub fn path_order(a: &str, b: &str) -> Ordering {
    let mut left = a.split('/');
    let mut right = b.split('/');
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) if x == y => continue,
            (Some(x), Some(y)) => return x.cmp(y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{DagBuilder, RevNumber};
    use crate::timestamp::CvsTime;

    fn rev(n: &str) -> RevNumber {
        RevNumber::parse(n).unwrap()
    }

    #[test]
    fn test_export_path_translations() {
        assert_eq!(export_path("module/foo.c,v", 0).unwrap(), "module/foo.c");
        assert_eq!(export_path("module/Attic/foo.c,v", 0).unwrap(), "module/foo.c");
        assert_eq!(export_path("RCS/bar,v", 0).unwrap(), "bar");
        assert_eq!(export_path("a/RCS/Attic/b,v", 0).unwrap(), "a/b");
        assert_eq!(export_path(".cvsignore,v", 0).unwrap(), ".gitignore");
        assert_eq!(export_path("sub/.cvsignore,v", 0).unwrap(), "sub/.gitignore");
        assert_eq!(export_path("plain", 0).unwrap(), "plain");
    }

    #[test]
    fn test_export_path_strip() {
        assert_eq!(export_path("repo/module/foo.c,v", 5).unwrap(), "module/foo.c");
    }

    #[test]
    fn test_export_path_rejects_degenerate_names() {
        assert!(export_path("Attic/,v", 0).is_err());
        assert!(export_path("ab", 10).is_err());
    }

    #[test]
    fn test_master_is_cvsignore() {
        assert!(master_is_cvsignore(".cvsignore,v"));
        assert!(master_is_cvsignore("dir/.cvsignore,v"));
        assert!(master_is_cvsignore("dir/.cvsignore"));
        assert!(!master_is_cvsignore("dir/cvsignore,v"));
        assert!(!master_is_cvsignore(".gitignore,v"));
    }

    #[test]
    fn test_clamp_mode() {
        assert_eq!(clamp_mode(0o644), 0o644);
        assert_eq!(clamp_mode(0o600), 0o644);
        assert_eq!(clamp_mode(0o755), 0o755);
        assert_eq!(clamp_mode(0o711), 0o755);
        assert_eq!(clamp_mode(0o444), 0o644);
        assert_eq!(clamp_mode(0o001), 0o755);
    }

    #[test]
    fn test_path_order_children_before_parent() {
        assert_eq!(path_order("a/b/c", "a/b"), Ordering::Less);
        assert_eq!(path_order("a/b", "a"), Ordering::Less);
        assert_eq!(path_order("a", "a/b/c"), Ordering::Greater);
        assert_eq!(path_order("a/b", "a/c"), Ordering::Less);
        assert_eq!(path_order("x", "x"), Ordering::Equal);
    }

    #[test]
    fn test_fileops_against_parent() {
        let mut b = DagBuilder::new();
        let kept = b.file_rev("m/kept.c,v", 0o644, rev("1.1"));
        let old = b.file_rev("m/changed.c,v", 0o644, rev("1.1"));
        let new = b.file_rev("m/changed.c,v", 0o644, rev("1.2"));
        let gone = b.file_rev("m/gone.c,v", 0o644, rev("1.1"));
        let fresh = b.file_rev("m/fresh.c,v", 0o755, rev("1.1"));

        let parent = b.commit("a", "p", CvsTime(1), None, &[kept, old, gone]);
        let child = b.commit("a", "c", CvsTime(2), Some(parent), &[kept, new, fresh]);
        let dag = b.build();

        let links = LinkTable::build(&dag, child, parent);
        let mut paths = PathCache::new();
        let ops = build_fileops(&dag, child, Some(parent), &links, &mut paths, 0).unwrap();

        let mut summary: Vec<String> = ops
            .iter()
            .map(|op| match op {
                FileOp::Modify { mode, path, .. } => format!("M {:o} {}", mode, path),
                FileOp::Delete { path } => format!("D {}", path),
            })
            .collect();
        summary.sort();
        assert_eq!(
            summary,
            vec![
                "D m/gone.c".to_string(),
                "M 644 m/changed.c".to_string(),
                "M 755 m/fresh.c".to_string(),
            ]
        );
    }

    #[test]
    fn test_rootless_commit_modifies_everything() {
        let mut b = DagBuilder::new();
        let f1 = b.file_rev("a.c,v", 0o644, rev("1.1"));
        let f2 = b.file_rev("b.c,v", 0o644, rev("1.1"));
        let c = b.commit("a", "init", CvsTime(1), None, &[f1, f2]);
        let dag = b.build();

        let links = LinkTable::rootless(dag.commit(c).file_count());
        let mut paths = PathCache::new();
        let ops = build_fileops(&dag, c, None, &links, &mut paths, 0).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| matches!(op, FileOp::Modify { .. })));
    }
}
