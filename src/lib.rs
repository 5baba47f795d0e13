// src/lib.rs

//! CVS history export engine
//!
//! Converts a merged, in-memory CVS revision DAG into a git fast-import
//! stream: blobs, commits, file operations, tags, and branch resets, in a
//! deterministic order where every mark is defined before it is
//! referenced.
//!
//! # Architecture
//!
//! - The DAG (branch chains over shared file revisions) is immutable
//!   input; all per-run state lives in the export context
//! - Two orderings: fast (per-branch replay, blobs front-loaded inline)
//!   and canonical (timestamp-sorted commits, blobs spilled to a disk
//!   store and interleaved at first reference)
//! - Interned names with per-commit Bloom fingerprints make the
//!   commit-vs-parent file matching a single monotonic cursor scan
//! - Blob content streams through bounded memory in canonical mode via a
//!   radix-256 fan-out spill store

pub mod atom;
pub mod blobstore;
pub mod bloom;
pub mod dag;
pub mod emitter;
mod error;
pub mod export;
pub mod fileops;
pub mod links;
pub mod marks;
pub mod planner;
pub mod timestamp;

pub use dag::{
    AuthorEntry, AuthorMap, BlobSource, CommitId, Dag, DagBuilder, FileRevId, MemorySource,
    RevNumber,
};
pub use emitter::CVS_DEFAULT_IGNORES;
pub use error::{Error, Result};
pub use export::{export_authors, ExportOptions, ExportStats, Exporter, ReportMode};
pub use timestamp::{CvsTime, RCS_EPOCH};
