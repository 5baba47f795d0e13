// src/links.rs

//! Matching a commit's files against its parent's.
//!
//! Both commits hold their files in the same atom order, so matches
//! advance monotonically: one cursor over the parent sequence, never
//! rewound. A Bloom subset test on the parent's fingerprint skips files
//! that cannot be present at all, and the scan stops early once
//! min(|commit|, |parent|) matches have been found.
//!
//! The result is a per-commit side table, rebuilt for each commit and
//! discarded, so the DAG itself is never mutated.

use crate::dag::{CommitId, Dag, FileRevId};

pub struct LinkTable {
    child_to_parent: Vec<Option<u32>>,
    parent_to_child: Vec<Option<u32>>,
}

impl LinkTable {
    /// Table for a commit with no parent: nothing matches.
    pub fn rootless(file_count: usize) -> LinkTable {
        LinkTable {
            child_to_parent: vec![None; file_count],
            parent_to_child: Vec::new(),
        }
    }

    pub fn build(dag: &Dag, commit: CommitId, parent: CommitId) -> LinkTable {
        let child_files: Vec<FileRevId> = dag.commit(commit).files().collect();
        let parent_files: Vec<FileRevId> = dag.commit(parent).files().collect();
        let parent_bloom = dag.commit(parent).bloom();

        let mut table = LinkTable {
            child_to_parent: vec![None; child_files.len()],
            parent_to_child: vec![None; parent_files.len()],
        };

        let mut remaining = child_files.len().min(parent_files.len());
        let mut cursor = 0;
        for (i, &child) in child_files.iter().enumerate() {
            if remaining == 0 {
                break;
            }
            let name = dag.rev(child).master;
            if !parent_bloom.contains(dag.names().bloom(name)) {
                continue;
            }
            for (j, &candidate) in parent_files.iter().enumerate().skip(cursor) {
                if dag.rev(candidate).master == name {
                    table.child_to_parent[i] = Some(j as u32);
                    table.parent_to_child[j] = Some(i as u32);
                    cursor = j + 1;
                    remaining -= 1;
                    break;
                }
            }
        }
        table
    }

    /// Position in the parent sequence matching child position `pos`.
    pub fn parent_of(&self, pos: usize) -> Option<usize> {
        self.child_to_parent.get(pos).copied().flatten().map(|j| j as usize)
    }

    /// Position in the child sequence matching parent position `pos`.
    pub fn child_of(&self, pos: usize) -> Option<usize> {
        self.parent_to_child.get(pos).copied().flatten().map(|i| i as usize)
    }
}
