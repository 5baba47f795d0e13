// src/planner.rs

//! Commit emission order.
//!
//! Branch chains are singly linked from head toward root; planning first
//! flattens them into one array in branch order, each chain reversed to
//! root-to-head order, so every commit precedes its descendants. In
//! canonical mode the array is then stable-sorted by timestamp, provided
//! the timestamps agree with the topology; when they do not, the branch
//! order is kept and a warning is raised once.

use crate::dag::{CommitId, Dag};
use std::cmp::Ordering;
use tracing::warn;

/// One planned emission: a commit and the branch head it belongs to.
#[derive(Clone, Copy, Debug)]
pub struct PlanEntry {
    pub commit: CommitId,
    /// Index into `dag.heads`.
    pub branch: usize,
}

/// Flatten all non-tail branch chains, each in root-to-head order.
pub fn plan_branches(dag: &Dag) -> Vec<PlanEntry> {
    let mut plan = Vec::with_capacity(dag.commit_count());
    for (branch, head) in dag.heads.iter().enumerate() {
        if head.tail {
            continue;
        }
        let Some(top) = head.head else {
            continue;
        };
        let chain = chain_of(dag, top);
        plan.extend(
            chain
                .iter()
                .rev()
                .map(|&commit| PlanEntry { commit, branch }),
        );
    }
    plan
}

/// Walk a chain from head toward root, stopping (inclusively) at a commit
/// whose tail flag marks the graft junction.
fn chain_of(dag: &Dag, top: CommitId) -> Vec<CommitId> {
    let mut chain = Vec::new();
    let mut cursor = Some(top);
    while let Some(id) = cursor {
        chain.push(id);
        let commit = dag.commit(id);
        if commit.tail {
            break;
        }
        cursor = commit.parent;
    }
    chain
}

/// Sort the plan into canonical timestamp order if the timestamps are
/// consistent with the topology. Returns whether the sort was applied.
pub fn sort_canonical(dag: &Dag, plan: &mut [PlanEntry]) -> bool {
    let consistent = plan.iter().all(|entry| {
        let commit = dag.commit(entry.commit);
        commit
            .parent
            .map_or(true, |parent| dag.commit(parent).date <= commit.date)
    });
    if !consistent {
        warn!("commit timestamps disagree with branch topology; keeping branch order");
        return false;
    }
    plan.sort_by(|a, b| compare_commits(dag, a.commit, b.commit));
    true
}

/// Canonical commit order: timestamp, then parent/grandparent adjacency
/// (descendants after ancestors), then author, then log; remaining ties
/// chase both parent chains in lock-step.
fn compare_commits(dag: &Dag, a: CommitId, b: CommitId) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        if a == b {
            return Ordering::Equal;
        }
        let ca = dag.commit(a);
        let cb = dag.commit(b);

        let by_date = ca.date.cmp(&cb.date);
        if by_date != Ordering::Equal {
            return by_date;
        }
        if near_ancestor(dag, a, b) {
            return Ordering::Greater;
        }
        if near_ancestor(dag, b, a) {
            return Ordering::Less;
        }
        let by_author = ca.author.cmp(&cb.author);
        if by_author != Ordering::Equal {
            return by_author;
        }
        let by_log = ca.log.cmp(&cb.log);
        if by_log != Ordering::Equal {
            return by_log;
        }
        match (ca.parent, cb.parent) {
            (Some(pa), Some(pb)) => {
                a = pa;
                b = pb;
            }
            _ => return Ordering::Equal,
        }
    }
}

/// Is `target` the parent or grandparent of `of`?
fn near_ancestor(dag: &Dag, of: CommitId, target: CommitId) -> bool {
    match dag.commit(of).parent {
        Some(parent) if parent == target => true,
        Some(parent) => dag.commit(parent).parent == Some(target),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::DagBuilder;
    use crate::timestamp::CvsTime;

    fn t(secs: u32) -> CvsTime {
        CvsTime(secs)
    }

    #[test]
    fn test_plan_is_root_to_head_per_branch() {
        let mut b = DagBuilder::new();
        let c1 = b.commit("a", "c1", t(10), None, &[]);
        let c2 = b.commit("a", "c2", t(20), Some(c1), &[]);
        let s = b.commit("a", "s", t(30), Some(c1), &[]);
        b.set_tail(s);
        b.head("master", Some(c2));
        b.head("side", Some(s));
        let dag = b.build();

        let plan = plan_branches(&dag);
        let commits: Vec<CommitId> = plan.iter().map(|e| e.commit).collect();
        assert_eq!(commits, vec![c1, c2, s]);
        assert_eq!(plan[0].branch, 0);
        assert_eq!(plan[2].branch, 1);
    }

    #[test]
    fn test_tail_heads_are_skipped() {
        let mut b = DagBuilder::new();
        let c1 = b.commit("a", "c1", t(10), None, &[]);
        b.head("master", Some(c1));
        b.tail_head("grafted", Some(c1));
        let dag = b.build();

        assert_eq!(plan_branches(&dag).len(), 1);
    }

    #[test]
    fn test_tail_commit_stops_chain() {
        let mut b = DagBuilder::new();
        let trunk = b.commit("a", "trunk", t(10), None, &[]);
        let junction = b.commit("a", "junction", t(20), Some(trunk), &[]);
        let tip = b.commit("a", "tip", t(30), Some(junction), &[]);
        b.set_tail(junction);
        b.head("branch", Some(tip));
        let dag = b.build();

        let plan = plan_branches(&dag);
        let commits: Vec<CommitId> = plan.iter().map(|e| e.commit).collect();
        // The walk stops at the junction, inclusively; trunk is not replayed.
        assert_eq!(commits, vec![junction, tip]);
    }

    #[test]
    fn test_canonical_sort_merges_branches_by_time() {
        let mut b = DagBuilder::new();
        let c1 = b.commit("a", "c1", t(10), None, &[]);
        let c2 = b.commit("a", "c2", t(40), Some(c1), &[]);
        let s = b.commit("a", "s", t(20), Some(c1), &[]);
        b.set_tail(s);
        b.head("master", Some(c2));
        b.head("side", Some(s));
        let dag = b.build();

        let mut plan = plan_branches(&dag);
        assert!(sort_canonical(&dag, &mut plan));
        let commits: Vec<CommitId> = plan.iter().map(|e| e.commit).collect();
        assert_eq!(commits, vec![c1, s, c2]);
    }

    #[test]
    fn test_equal_dates_keep_child_after_parent() {
        let mut b = DagBuilder::new();
        let c1 = b.commit("a", "first", t(10), None, &[]);
        let c2 = b.commit("a", "second", t(10), Some(c1), &[]);
        let c3 = b.commit("a", "third", t(10), Some(c2), &[]);
        b.head("master", Some(c3));
        let dag = b.build();

        let mut plan = plan_branches(&dag);
        assert!(sort_canonical(&dag, &mut plan));
        let commits: Vec<CommitId> = plan.iter().map(|e| e.commit).collect();
        assert_eq!(commits, vec![c1, c2, c3]);
    }

    #[test]
    fn test_inconsistent_timestamps_keep_branch_order() {
        let mut b = DagBuilder::new();
        let c1 = b.commit("a", "c1", t(50), None, &[]);
        let c2 = b.commit("a", "c2", t(10), Some(c1), &[]);
        b.head("master", Some(c2));
        let dag = b.build();

        let mut plan = plan_branches(&dag);
        assert!(!sort_canonical(&dag, &mut plan));
        let commits: Vec<CommitId> = plan.iter().map(|e| e.commit).collect();
        assert_eq!(commits, vec![c1, c2]);
    }

    #[test]
    fn test_empty_heads_yield_empty_plan() {
        let mut b = DagBuilder::new();
        b.head("master", None);
        let dag = b.build();
        assert!(plan_branches(&dag).is_empty());
    }
}
