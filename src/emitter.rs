// src/emitter.rs

//! The fast-import stream writer.
//!
//! Every record that references a mark is written after the record that
//! defines it: blob marks are defined either inline at generation time
//! (fast mode) or just before the first commit that references them
//! (canonical mode), and commit marks are defined before any `from` or
//! tag reset that points at them.

use crate::blobstore::BlobStore;
use crate::dag::{AuthorMap, CommitId, Dag, FileRevId};
use crate::error::{Error, Result};
use crate::export::{ExportOptions, ExportStats};
use crate::fileops::{self, FileOp, PathCache};
use crate::links::LinkTable;
use crate::marks::{Marks, Serial};
use crate::planner::PlanEntry;
use crate::timestamp::committer_timestamp;
use std::collections::HashMap;
use std::io::Write;

/// The boilerplate CVS itself applies to every checkout; prepended to
/// `.cvsignore` payloads and used for the synthetic root `.gitignore`.
pub const CVS_DEFAULT_IGNORES: &str = "\
# CVS default ignores begin
tags
TAGS
.make.state
.nse_depinfo
*~
#*
.#*
,*
_$*
*$
*.old
*.bak
*.BAK
*.orig
*.rej
.del-*
*.a
*.olb
*.o
*.obj
*.so
*.exe
*.Z
*.elc
*.ln
core
# CVS default ignores end
";

pub(crate) struct Emitter<'a> {
    dag: &'a Dag,
    authors: &'a AuthorMap,
    opts: &'a ExportOptions,
    out: &'a mut dyn Write,
    revision_map: Option<Box<dyn Write + 'a>>,
    store: Option<BlobStore>,
    marks: Marks,
    /// Serial per file revision; 0 until generation reaches it.
    rev_serials: Vec<Serial>,
    rev_emitted: Vec<bool>,
    commit_serials: HashMap<CommitId, Serial>,
    paths: PathCache,
    seen_gitignore: bool,
    emitted_any_commit: bool,
    stats: ExportStats,
}

impl<'a> Emitter<'a> {
    pub fn new(
        dag: &'a Dag,
        authors: &'a AuthorMap,
        opts: &'a ExportOptions,
        store: Option<BlobStore>,
        revision_map: Option<Box<dyn Write + 'a>>,
        out: &'a mut dyn Write,
    ) -> Emitter<'a> {
        Emitter {
            dag,
            authors,
            opts,
            out,
            revision_map,
            store,
            marks: Marks::new(opts.serial_limit),
            rev_serials: vec![0; dag.rev_count()],
            rev_emitted: vec![false; dag.rev_count()],
            commit_serials: HashMap::new(),
            paths: PathCache::new(),
            seen_gitignore: false,
            emitted_any_commit: false,
            stats: ExportStats::default(),
        }
    }

    /// Has this commit been cut off by the incremental threshold?
    pub fn suppressed(&self, id: CommitId) -> bool {
        match self.opts.fromtime {
            Some(cutoff) => self.dag.commit(id).date.to_unix() <= cutoff,
            None => false,
        }
    }

    /// Fast mode: write the blob inline during generation, mark and all.
    pub fn record_blob(&mut self, rev: FileRevId, payload: &[u8]) -> Result<()> {
        let serial = self.marks.next_serial()?;
        self.rev_serials[rev.index()] = serial;
        let mark = self.marks.next_mark();
        self.marks.bind(serial, mark);

        let prefix = self.ignore_prefix(rev);
        write!(
            self.out,
            "blob\nmark :{}\ndata {}\n",
            mark,
            prefix.len() + payload.len()
        )?;
        self.out.write_all(prefix.as_bytes())?;
        self.out.write_all(payload)?;
        self.out.write_all(b"\n")?;

        self.rev_emitted[rev.index()] = true;
        self.stats.blobs += 1;
        Ok(())
    }

    /// Canonical mode: spill the blob to the store during generation; it
    /// is emitted (and marked) at the first commit that references it.
    pub fn spill_blob(&mut self, rev: FileRevId, payload: &[u8]) -> Result<()> {
        let serial = self.marks.next_serial()?;
        self.rev_serials[rev.index()] = serial;
        let prefix = self.ignore_prefix(rev);
        let prefix = (!prefix.is_empty()).then_some(prefix);
        match &self.store {
            Some(store) => store.write(serial, prefix, payload),
            None => Err(Error::BlobMissing(serial)),
        }
    }

    fn ignore_prefix(&self, rev: FileRevId) -> &'static str {
        if fileops::master_is_cvsignore(self.dag.master_name(rev)) {
            CVS_DEFAULT_IGNORES
        } else {
            ""
        }
    }

    pub fn emit_commit(&mut self, entry: PlanEntry) -> Result<()> {
        let id = entry.commit;
        let commit = self.dag.commit(id);
        let branch = &self.dag.heads[entry.branch].name;

        let links = match commit.parent {
            Some(parent) => LinkTable::build(self.dag, id, parent),
            None => LinkTable::rootless(commit.file_count()),
        };
        let ops = fileops::build_fileops(
            self.dag,
            id,
            commit.parent,
            &links,
            &mut self.paths,
            self.opts.strip,
        )?;

        let want_revpairs =
            self.opts.embed_ids || self.opts.reposurgeon || self.revision_map.is_some();
        let mut revpairs: Vec<(String, Serial)> = Vec::new();
        if want_revpairs {
            for op in &ops {
                if let FileOp::Modify { rev, path, .. } = op {
                    let pair = format!("{} {}", path, self.dag.rev(*rev).number);
                    revpairs.push((pair, self.rev_serials[rev.index()]));
                }
            }
        }

        // Any blob this commit references and nothing has emitted yet is
        // streamed out of the store first, so its mark precedes the use.
        for op in &ops {
            if let FileOp::Modify { rev, .. } = op {
                if !self.rev_emitted[rev.index()] {
                    let serial = self.rev_serials[rev.index()];
                    let mark = self.marks.next_mark();
                    self.marks.bind(serial, mark);
                    write!(self.out, "blob\nmark :{}\n", mark)?;
                    match &self.store {
                        Some(store) => store.read_into(serial, &mut *self.out)?,
                        None => return Err(Error::BlobMissing(serial)),
                    }
                    self.rev_emitted[rev.index()] = true;
                    self.stats.blobs += 1;
                }
            }
        }

        writeln!(self.out, "commit {}{}", self.opts.branch_prefix, branch)?;
        let serial = self.marks.next_serial()?;
        self.commit_serials.insert(id, serial);
        let mark = self.marks.next_mark();
        self.marks.bind(serial, mark);
        writeln!(self.out, "mark :{}", mark)?;

        let (full, email, zone) = match self.authors.lookup(&commit.author) {
            Some(entry) => (
                entry.full.as_str(),
                entry.email.as_str(),
                entry.timezone.as_deref().unwrap_or("UTC"),
            ),
            None => (commit.author.as_str(), commit.author.as_str(), "UTC"),
        };
        let when = if self.opts.force_dates {
            i64::from(serial) * i64::from(self.dag.commit_time_window) * 2
        } else {
            commit.date.to_unix()
        };
        writeln!(
            self.out,
            "committer {} <{}> {}",
            full,
            email,
            committer_timestamp(when, zone)
        )?;

        let mut log = commit.log.clone();
        if self.opts.embed_ids {
            log.push('\n');
            for (pair, _) in &revpairs {
                log.push_str("CVS-ID: ");
                log.push_str(pair);
                log.push('\n');
            }
        }
        write!(self.out, "data {}\n{}\n", log.len(), log)?;

        if let Some(parent) = commit.parent {
            let parent_mark = self
                .commit_serials
                .get(&parent)
                .and_then(|&s| self.marks.mark_of(s));
            match parent_mark {
                Some(parent_mark) => writeln!(self.out, "from :{}", parent_mark)?,
                None if self.suppressed(parent) => {
                    // First survivor past the cutoff: anchor onto the
                    // recipient's existing branch tip.
                    writeln!(self.out, "from {}{}^0", self.opts.branch_prefix, branch)?;
                }
                None => {
                    let serial = self.commit_serials.get(&parent).copied().unwrap_or(0);
                    return Err(Error::MarkMissing(serial));
                }
            }
        }

        for op in &ops {
            match op {
                FileOp::Modify { mode, rev, path } => {
                    let serial = self.rev_serials[rev.index()];
                    let mark = self
                        .marks
                        .mark_of(serial)
                        .ok_or(Error::MarkMissing(serial))?;
                    writeln!(self.out, "M 100{:o} :{} {}", mode, mark, path)?;
                    if path == ".gitignore" {
                        self.seen_gitignore = true;
                    }
                }
                FileOp::Delete { path } => writeln!(self.out, "D {}", path)?,
            }
        }

        if !self.emitted_any_commit && !self.seen_gitignore {
            write!(
                self.out,
                "M 100644 inline .gitignore\ndata {}\n{}\n",
                CVS_DEFAULT_IGNORES.len(),
                CVS_DEFAULT_IGNORES
            )?;
            self.seen_gitignore = true;
        }

        if let Some(sink) = self.revision_map.as_mut() {
            for (pair, serial) in &revpairs {
                let mark = self.marks.mark_of(*serial).ok_or(Error::MarkMissing(*serial))?;
                writeln!(sink, "{} :{}", pair, mark)?;
            }
        }

        if self.opts.reposurgeon {
            let mut prop = String::new();
            for (pair, _) in &revpairs {
                prop.push_str(pair);
                prop.push('\n');
            }
            write!(self.out, "property cvs-revision {} {}", prop.len(), prop)?;
        }

        writeln!(self.out)?;
        self.emitted_any_commit = true;
        self.stats.commits += 1;
        Ok(())
    }

    /// Tag resets for every emitted target, branch resets for every head
    /// whose tip holds a mark, and the closing `done`.
    pub fn emit_trailer(&mut self) -> Result<()> {
        for tag in &self.dag.tags {
            let Some(mark) = self.commit_mark(tag.commit) else {
                continue;
            };
            write!(self.out, "reset refs/tags/{}\nfrom :{}\n\n", tag.name, mark)?;
        }
        for head in &self.dag.heads {
            let Some(top) = head.head else {
                continue;
            };
            let Some(mark) = self.commit_mark(top) else {
                continue;
            };
            write!(
                self.out,
                "reset {}{}\nfrom :{}\n\n",
                self.opts.branch_prefix, head.name, mark
            )?;
        }
        self.out.write_all(b"done\n")?;
        Ok(())
    }

    fn commit_mark(&self, id: CommitId) -> Option<u32> {
        self.commit_serials
            .get(&id)
            .and_then(|&serial| self.marks.mark_of(serial))
    }

    pub fn finish(self) -> (Option<BlobStore>, ExportStats) {
        (self.store, self.stats)
    }
}
