// src/commands.rs
//! Command handlers for the cvs-export CLI
//!
//! The parse/merge front end that reads CVS masters lives in its own
//! tool; the handlers here load the history from its interchange form, a
//! line-oriented "dagfile", and hand it to the export engine.
//!
//! # Dagfile format
//!
//! ```text
//! # comment
//! window 300                      time window used for clustering
//! skew 1034567890                 earliest skew-vulnerable Unix time
//! branch <name> [from <branch>]   declare a branch, optionally forked
//! file <octal-mode> <rev> <master-path>
//! data <len>
//! <len payload bytes>
//! commit <branch> <unix-time> <author-key>
//! data <len>
//! <len log bytes>
//! rev <rev> <master-path>         one line per file in the snapshot
//! end
//! tag <name> <branch>
//! ```
//!
//! `file` declares one file revision with its content; `rev` lines inside
//! a commit reference previously declared revisions. A commit's parent is
//! the current tip of its branch.

use anyhow::{anyhow, bail, Context, Result};
use cvs_export::{
    export_authors, AuthorEntry, AuthorMap, CommitId, CvsTime, Dag, DagBuilder, ExportOptions,
    Exporter, FileRevId, MemorySource, RevNumber,
};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub fn cmd_export(
    dagfile: &Path,
    opts: ExportOptions,
    revision_map: Option<&Path>,
    authormap: Option<&Path>,
) -> Result<()> {
    let (dag, mut source) = load_dagfile(dagfile)?;
    let authors = match authormap {
        Some(path) => load_author_map(path)?,
        None => AuthorMap::new(),
    };

    let mut exporter = Exporter::new(&dag, &authors, opts);
    if let Some(path) = revision_map {
        let sink = fs::File::create(path)
            .with_context(|| format!("cannot create revision map {}", path.display()))?;
        exporter = exporter.revision_map(Box::new(sink));
    }

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    exporter.run(&mut source, &mut out)?;
    out.flush()?;
    Ok(())
}

pub fn cmd_authors(dagfile: &Path) -> Result<()> {
    let (dag, _) = load_dagfile(dagfile)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    export_authors(&dag, &mut out)?;
    Ok(())
}

/// Parse an author map: `key = Full Name <email> ZONE` per line, the zone
/// optional. Blank lines and `#` comments are ignored.
fn load_author_map(path: &Path) -> Result<AuthorMap> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read author map {}", path.display()))?;
    let mut map = AuthorMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let context = || format!("{}:{}: malformed author entry", path.display(), lineno + 1);
        let (key, rest) = line.split_once('=').ok_or_else(|| anyhow!(context()))?;
        let rest = rest.trim();
        let open = rest.find('<').ok_or_else(|| anyhow!(context()))?;
        let close = rest.find('>').ok_or_else(|| anyhow!(context()))?;
        if close < open {
            bail!(context());
        }
        let timezone = rest[close + 1..].trim();
        map.insert(
            key.trim(),
            AuthorEntry {
                full: rest[..open].trim().to_string(),
                email: rest[open + 1..close].to_string(),
                timezone: (!timezone.is_empty()).then(|| timezone.to_string()),
            },
        );
    }
    Ok(map)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0, line: 0 }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        self.line += 1;
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        let text = std::str::from_utf8(&rest[..end])
            .with_context(|| format!("line {}: not valid UTF-8", self.line))?;
        self.pos += end + 1;
        Ok(Some(text.to_string()))
    }

    fn take_payload(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.pos + len > self.data.len() {
            bail!("line {}: payload of {} bytes runs past end of file", self.line, len);
        }
        let payload = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        // Swallow the newline separating the payload from the next line.
        if self.data.get(self.pos) == Some(&b'\n') {
            self.pos += 1;
        }
        Ok(payload)
    }

    /// Expect a `data <len>` line and return the following payload.
    fn data_block(&mut self) -> Result<Vec<u8>> {
        let line = self
            .next_line()?
            .ok_or_else(|| anyhow!("line {}: expected 'data <len>'", self.line))?;
        let len: usize = line
            .strip_prefix("data ")
            .and_then(|n| n.trim().parse().ok())
            .ok_or_else(|| anyhow!("line {}: expected 'data <len>', got {:?}", self.line, line))?;
        self.take_payload(len)
    }
}

struct BranchState {
    name: String,
    tip: Option<CommitId>,
}

/// Load a dagfile into a DAG plus its in-memory blob source.
fn load_dagfile(path: &Path) -> Result<(Dag, MemorySource)> {
    let data =
        fs::read(path).with_context(|| format!("cannot read dagfile {}", path.display()))?;
    let mut reader = Reader::new(&data);

    let mut builder = DagBuilder::new();
    let mut source = MemorySource::new();
    let mut revs: HashMap<(String, String), FileRevId> = HashMap::new();
    let mut branches: Vec<BranchState> = Vec::new();
    let mut branch_index: HashMap<String, usize> = HashMap::new();
    let mut commit_branch: HashMap<CommitId, usize> = HashMap::new();

    while let Some(line) = reader.next_line()? {
        let line = line.trim_end().to_string();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let lineno = reader.line;
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or_default();
        match keyword {
            "window" => {
                let secs: u32 = words
                    .next()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(|| anyhow!("line {}: bad window", lineno))?;
                builder.time_window(secs);
            }
            "skew" => {
                let unix: i64 = words
                    .next()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(|| anyhow!("line {}: bad skew time", lineno))?;
                let time = CvsTime::from_unix(unix)
                    .ok_or_else(|| anyhow!("line {}: skew time before the RCS epoch", lineno))?;
                builder.skew_vulnerable(time);
            }
            "branch" => {
                let name = words
                    .next()
                    .ok_or_else(|| anyhow!("line {}: branch needs a name", lineno))?;
                if branch_index.contains_key(name) {
                    bail!("line {}: branch {} already declared", lineno, name);
                }
                let tip = match (words.next(), words.next()) {
                    (Some("from"), Some(origin)) => {
                        let &idx = branch_index
                            .get(origin)
                            .ok_or_else(|| anyhow!("line {}: unknown branch {}", lineno, origin))?;
                        branches[idx].tip
                    }
                    (None, _) => None,
                    _ => bail!("line {}: expected 'branch <name> [from <branch>]'", lineno),
                };
                branch_index.insert(name.to_string(), branches.len());
                branches.push(BranchState {
                    name: name.to_string(),
                    tip,
                });
            }
            "file" => {
                let mode = words
                    .next()
                    .and_then(|w| u32::from_str_radix(w, 8).ok())
                    .ok_or_else(|| anyhow!("line {}: bad file mode", lineno))?;
                let number = words
                    .next()
                    .ok_or_else(|| anyhow!("line {}: file needs a revision", lineno))?
                    .to_string();
                let master = words.collect::<Vec<_>>().join(" ");
                if master.is_empty() {
                    bail!("line {}: file needs a master path", lineno);
                }
                let parsed = RevNumber::parse(&number)
                    .ok_or_else(|| anyhow!("line {}: bad revision {}", lineno, number))?;
                let payload = reader.data_block()?;
                let id = builder.file_rev(&master, mode, parsed);
                if revs.insert((master.clone(), number), id).is_some() {
                    bail!("line {}: duplicate file revision {}", lineno, master);
                }
                source.insert(id, payload);
            }
            "commit" => {
                let branch = words
                    .next()
                    .ok_or_else(|| anyhow!("line {}: commit needs a branch", lineno))?
                    .to_string();
                let unix: i64 = words
                    .next()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(|| anyhow!("line {}: bad commit time", lineno))?;
                let author = words.collect::<Vec<_>>().join(" ");
                if author.is_empty() {
                    bail!("line {}: commit needs an author", lineno);
                }
                let date = CvsTime::from_unix(unix)
                    .ok_or_else(|| anyhow!("line {}: commit time before the RCS epoch", lineno))?;
                let log = String::from_utf8(reader.data_block()?)
                    .with_context(|| format!("line {}: log is not valid UTF-8", lineno))?;

                let mut files = Vec::new();
                loop {
                    let Some(entry) = reader.next_line()? else {
                        bail!("line {}: commit not closed with 'end'", reader.line);
                    };
                    let entry = entry.trim_end();
                    if entry == "end" {
                        break;
                    }
                    let mut fields = entry.split_whitespace();
                    if fields.next() != Some("rev") {
                        bail!("line {}: expected 'rev <rev> <path>' or 'end'", reader.line);
                    }
                    let number = fields
                        .next()
                        .ok_or_else(|| anyhow!("line {}: rev needs a revision", reader.line))?;
                    let master = fields.collect::<Vec<_>>().join(" ");
                    let &id = revs.get(&(master.clone(), number.to_string())).ok_or_else(
                        || anyhow!("line {}: unknown revision {} {}", reader.line, master, number),
                    )?;
                    files.push(id);
                }

                let idx = *branch_index.entry(branch.clone()).or_insert_with(|| {
                    branches.push(BranchState {
                        name: branch.clone(),
                        tip: None,
                    });
                    branches.len() - 1
                });
                let parent = branches[idx].tip;
                let id = builder.commit(&author, &log, date, parent, &files);
                // A commit whose parent sits on another branch starts a
                // grafted chain; flag it so the walk stops there.
                if let Some(parent) = parent {
                    if commit_branch.get(&parent) != Some(&idx) {
                        builder.set_tail(id);
                    }
                }
                commit_branch.insert(id, idx);
                branches[idx].tip = Some(id);
            }
            "tag" => {
                let name = words
                    .next()
                    .ok_or_else(|| anyhow!("line {}: tag needs a name", lineno))?;
                let branch = words
                    .next()
                    .ok_or_else(|| anyhow!("line {}: tag needs a branch", lineno))?;
                let &idx = branch_index
                    .get(branch)
                    .ok_or_else(|| anyhow!("line {}: unknown branch {}", lineno, branch))?;
                let tip = branches[idx]
                    .tip
                    .ok_or_else(|| anyhow!("line {}: branch {} has no commits", lineno, branch))?;
                builder.tag(name, tip);
            }
            other => bail!("line {}: unknown directive {:?}", lineno, other),
        }
    }

    builder.source_bytes(source.total_bytes());
    for state in branches {
        builder.head(&state.name, state.tip);
    }
    Ok((builder.build(), source))
}
