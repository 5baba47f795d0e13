// src/dag.rs

//! The merged revision DAG handed to the export engine.
//!
//! The parse/merge front end produces one [`Dag`] per run: a forest of
//! per-branch commit chains over shared, deduplicated file revisions.
//! Everything here is immutable once built; all per-run mutable state
//! (serials, marks, emitted flags, link tables) lives in the export
//! context instead, so the DAG itself stays an acyclic tree of plain
//! references.
//!
//! Commits keep their files grouped in directory buckets, but consumers
//! only ever see the flat, atom-ordered sequence via [`Commit::files`].

use crate::atom::{Atom, NameTable};
use crate::bloom::Bloom;
use crate::error::Result;
use crate::timestamp::CvsTime;
use std::collections::HashMap;
use std::fmt;

/// Arena index of a file revision.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FileRevId(u32);

impl FileRevId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena index of a commit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CommitId(u32);

impl CommitId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A dotted CVS revision number, e.g. `1.2` or `1.2.2.4`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct RevNumber(Vec<u16>);

impl RevNumber {
    pub fn parse(text: &str) -> Option<RevNumber> {
        let fields: Option<Vec<u16>> = text.split('.').map(|f| f.parse().ok()).collect();
        let fields = fields?;
        if fields.is_empty() {
            return None;
        }
        Some(RevNumber(fields))
    }
}

impl fmt::Display for RevNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

/// One versioned file at one CVS revision. Unchanged files are shared
/// between commits as the same `FileRevId`.
pub struct FileRev {
    /// Interned master path, e.g. `module/Attic/foo.c,v`.
    pub master: Atom,
    /// Interned directory part of the master path.
    pub(crate) dir: Atom,
    /// POSIX mode bits of the master file.
    pub mode: u32,
    /// Dotted revision number within the master.
    pub number: RevNumber,
}

struct DirBucket {
    files: Vec<FileRevId>,
}

/// A commit node in the merged DAG.
pub struct Commit {
    /// CVS author key, e.g. the login name.
    pub author: String,
    /// Log text, exactly as recorded.
    pub log: String,
    pub date: CvsTime,
    pub parent: Option<CommitId>,
    /// Set on the junction commit where a grafted branch joins its trunk;
    /// chain walks stop here, inclusive.
    pub tail: bool,
    bloom: Bloom,
    dirs: Vec<DirBucket>,
    nfiles: usize,
}

impl Commit {
    /// All file revisions in this commit, flat and in atom order.
    pub fn files(&self) -> impl Iterator<Item = FileRevId> + '_ {
        self.dirs.iter().flat_map(|d| d.files.iter().copied())
    }

    pub fn file_count(&self) -> usize {
        self.nfiles
    }

    /// Union of the name fingerprints of every file in this commit.
    pub fn bloom(&self) -> &Bloom {
        &self.bloom
    }
}

/// A branch head. `tail` marks heads whose chain was produced by grafting
/// and is already covered by another head; such chains are never replayed.
pub struct BranchRef {
    pub name: String,
    pub head: Option<CommitId>,
    pub tail: bool,
}

pub struct Tag {
    pub name: String,
    pub commit: CommitId,
}

/// The complete merged history plus the per-repository constants the
/// export engine needs.
pub struct Dag {
    names: NameTable,
    revs: Vec<FileRev>,
    commits: Vec<Commit>,
    pub heads: Vec<BranchRef>,
    pub tags: Vec<Tag>,
    /// Total bytes of file content across all masters; drives the
    /// adaptive fast/canonical mode choice.
    pub source_bytes: u64,
    /// The time window used when clustering file deltas into commits.
    pub commit_time_window: u32,
    /// Earliest date at which time-window clustering may have misfiled a
    /// change (masters without commitids); `None` when not vulnerable.
    pub skew_vulnerable: Option<CvsTime>,
    /// Number of distinct masters contributing revisions.
    pub master_count: usize,
}

impl Dag {
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn rev(&self, id: FileRevId) -> &FileRev {
        &self.revs[id.index()]
    }

    pub fn commit(&self, id: CommitId) -> &Commit {
        &self.commits[id.index()]
    }

    pub fn rev_count(&self) -> usize {
        self.revs.len()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn master_name(&self, id: FileRevId) -> &str {
        self.names.resolve(self.rev(id).master)
    }
}

/// Construction surface for the parse/merge front end (and for tests).
///
/// The builder deduplicates file revisions by (master, revision number),
/// keeps each commit's file sequence sorted by atom, and computes the
/// per-commit Bloom fingerprint.
#[derive(Default)]
pub struct DagBuilder {
    names: NameTable,
    revs: Vec<FileRev>,
    rev_index: HashMap<(Atom, RevNumber), FileRevId>,
    commits: Vec<Commit>,
    heads: Vec<BranchRef>,
    tags: Vec<Tag>,
    source_bytes: u64,
    commit_time_window: u32,
    skew_vulnerable: Option<CvsTime>,
}

impl DagBuilder {
    pub fn new() -> Self {
        DagBuilder {
            commit_time_window: 300,
            ..Default::default()
        }
    }

    /// Intern a file revision. Calling again with the same master and
    /// number returns the existing id, which is how unchanged files end
    /// up shared between commits.
    pub fn file_rev(&mut self, master: &str, mode: u32, number: RevNumber) -> FileRevId {
        let atom = self.names.intern(master);
        if let Some(&id) = self.rev_index.get(&(atom, number.clone())) {
            return id;
        }
        let dir = match master.rfind('/') {
            Some(pos) => self.names.intern(&master[..pos]),
            None => self.names.intern(""),
        };
        let id = FileRevId(self.revs.len() as u32);
        self.revs.push(FileRev {
            master: atom,
            dir,
            mode,
            number: number.clone(),
        });
        self.rev_index.insert((atom, number), id);
        id
    }

    /// Add a commit holding the given file snapshot. Files are re-sorted
    /// into (directory, master) atom order and bucketed by directory.
    pub fn commit(
        &mut self,
        author: &str,
        log: &str,
        date: CvsTime,
        parent: Option<CommitId>,
        files: &[FileRevId],
    ) -> CommitId {
        let mut ordered: Vec<FileRevId> = files.to_vec();
        ordered.sort_by_key(|&id| {
            let rev = &self.revs[id.index()];
            (rev.dir, rev.master)
        });

        let mut bloom = Bloom::EMPTY;
        let mut dirs: Vec<DirBucket> = Vec::new();
        for &id in &ordered {
            let rev = &self.revs[id.index()];
            bloom.union_with(self.names.bloom(rev.master));
            match dirs.last_mut() {
                Some(bucket) if self.revs[bucket.files[0].index()].dir == rev.dir => {
                    bucket.files.push(id);
                }
                _ => dirs.push(DirBucket { files: vec![id] }),
            }
        }

        let id = CommitId(self.commits.len() as u32);
        self.commits.push(Commit {
            author: author.to_string(),
            log: log.to_string(),
            date,
            parent,
            tail: false,
            bloom,
            dirs,
            nfiles: ordered.len(),
        });
        id
    }

    /// Mark a commit as a graft junction; chain walks stop at it.
    pub fn set_tail(&mut self, id: CommitId) {
        self.commits[id.index()].tail = true;
    }

    pub fn head(&mut self, name: &str, head: Option<CommitId>) {
        self.heads.push(BranchRef {
            name: name.to_string(),
            head,
            tail: false,
        });
    }

    /// A head whose chain is already covered by another head.
    pub fn tail_head(&mut self, name: &str, head: Option<CommitId>) {
        self.heads.push(BranchRef {
            name: name.to_string(),
            head,
            tail: true,
        });
    }

    pub fn tag(&mut self, name: &str, commit: CommitId) {
        self.tags.push(Tag {
            name: name.to_string(),
            commit,
        });
    }

    pub fn source_bytes(&mut self, bytes: u64) {
        self.source_bytes = bytes;
    }

    pub fn time_window(&mut self, seconds: u32) {
        self.commit_time_window = seconds;
    }

    pub fn skew_vulnerable(&mut self, earliest: CvsTime) {
        self.skew_vulnerable = Some(earliest);
    }

    pub fn build(self) -> Dag {
        let master_count = {
            let mut masters: Vec<Atom> = self.revs.iter().map(|r| r.master).collect();
            masters.sort_unstable();
            masters.dedup();
            masters.len()
        };
        Dag {
            names: self.names,
            revs: self.revs,
            commits: self.commits,
            heads: self.heads,
            tags: self.tags,
            source_bytes: self.source_bytes,
            commit_time_window: self.commit_time_window,
            skew_vulnerable: self.skew_vulnerable,
            master_count,
        }
    }
}

/// Author-map entry: how a CVS author key renders in committer lines.
pub struct AuthorEntry {
    pub full: String,
    pub email: String,
    pub timezone: Option<String>,
}

/// Lookup from CVS author keys to identities. Unmapped keys fall back to
/// the key itself with a UTC zone.
#[derive(Default)]
pub struct AuthorMap {
    map: HashMap<String, AuthorEntry>,
}

impl AuthorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, entry: AuthorEntry) {
        self.map.insert(key.to_string(), entry);
    }

    pub fn lookup(&self, key: &str) -> Option<&AuthorEntry> {
        self.map.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Supplies file-revision payloads during export.
///
/// Implementations must invoke `emit` exactly once per file revision, in
/// depth-first master order; the engine assigns serials in callback order.
pub trait BlobSource {
    fn generate(
        &mut self,
        emit: &mut dyn FnMut(FileRevId, &[u8]) -> Result<()>,
    ) -> Result<()>;
}

/// In-memory payload source, used by tests and the dagfile front end.
#[derive(Default)]
pub struct MemorySource {
    entries: Vec<(FileRevId, Vec<u8>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rev: FileRevId, payload: impl Into<Vec<u8>>) {
        self.entries.push((rev, payload.into()));
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|(_, p)| p.len() as u64).sum()
    }
}

impl BlobSource for MemorySource {
    fn generate(
        &mut self,
        emit: &mut dyn FnMut(FileRevId, &[u8]) -> Result<()>,
    ) -> Result<()> {
        for (rev, payload) in &self.entries {
            emit(*rev, payload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: u32) -> CvsTime {
        CvsTime(secs)
    }

    #[test]
    fn test_rev_number_parse_and_display() {
        let n = RevNumber::parse("1.2.2.4").unwrap();
        assert_eq!(n.to_string(), "1.2.2.4");
        assert!(RevNumber::parse("").is_none());
        assert!(RevNumber::parse("1..2").is_none());
        assert!(RevNumber::parse("1.x").is_none());
    }

    #[test]
    fn test_file_rev_dedup() {
        let mut b = DagBuilder::new();
        let r1 = b.file_rev("m/a.c,v", 0o644, RevNumber::parse("1.1").unwrap());
        let r2 = b.file_rev("m/a.c,v", 0o644, RevNumber::parse("1.1").unwrap());
        let r3 = b.file_rev("m/a.c,v", 0o644, RevNumber::parse("1.2").unwrap());
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);
    }

    #[test]
    fn test_commit_files_are_atom_ordered() {
        let mut b = DagBuilder::new();
        // Interned in one order, supplied to the commit in another.
        let rb = b.file_rev("m/b.c,v", 0o644, RevNumber::parse("1.1").unwrap());
        let ra = b.file_rev("m/a.c,v", 0o644, RevNumber::parse("1.1").unwrap());
        let c1 = b.commit("alice", "one", t(100), None, &[ra, rb]);
        let c2 = b.commit("alice", "two", t(200), Some(c1), &[rb, ra]);
        let dag = b.build();

        let order1: Vec<FileRevId> = dag.commit(c1).files().collect();
        let order2: Vec<FileRevId> = dag.commit(c2).files().collect();
        assert_eq!(order1, order2, "file order must be consistent across commits");
        assert_eq!(dag.commit(c1).file_count(), 2);
    }

    #[test]
    fn test_commit_bloom_covers_files() {
        let mut b = DagBuilder::new();
        let ra = b.file_rev("x/a.c,v", 0o644, RevNumber::parse("1.1").unwrap());
        let c = b.commit("alice", "log", t(1), None, &[ra]);
        let dag = b.build();

        let atom = dag.rev(ra).master;
        assert!(dag.commit(c).bloom().contains(dag.names().bloom(atom)));
    }

    #[test]
    fn test_master_count() {
        let mut b = DagBuilder::new();
        b.file_rev("a,v", 0o644, RevNumber::parse("1.1").unwrap());
        b.file_rev("a,v", 0o644, RevNumber::parse("1.2").unwrap());
        b.file_rev("b,v", 0o644, RevNumber::parse("1.1").unwrap());
        assert_eq!(b.build().master_count, 2);
    }
}
