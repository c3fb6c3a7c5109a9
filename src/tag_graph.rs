//! Reachability checks over one user's tag hierarchy.
//!
//! A relation `parent -> child` is only accepted when the child cannot already
//! reach the parent through existing relations. The graph is rebuilt from the
//! stored edges on every check; no reachability is cached between calls.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// Outcome of checking a proposed `parent -> child` relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DagCheck {
    Valid,
    SelfLoop,
    WouldCycle,
}

impl DagCheck {
    pub fn is_valid(self) -> bool {
        matches!(self, DagCheck::Valid)
    }

    pub fn reason(self) -> &'static str {
        match self {
            DagCheck::Valid => "Relation is valid",
            DagCheck::SelfLoop => "A tag cannot be related to itself",
            DagCheck::WouldCycle => "Adding this relation would create a cycle",
        }
    }
}

/// Serializable form of a [`DagCheck`], as returned to API callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
}

impl From<DagCheck> for ValidationResult {
    fn from(check: DagCheck) -> Self {
        ValidationResult {
            is_valid: check.is_valid(),
            message: check.reason().to_string(),
        }
    }
}

/// Adjacency list of `parent -> children`, keyed by tag id.
#[derive(Debug, Default, Clone)]
pub struct TagGraph {
    children: HashMap<i32, Vec<i32>>,
}

impl TagGraph {
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut graph = TagGraph::default();
        for (parent, child) in edges {
            graph.add_edge(parent, child);
        }
        graph
    }

    pub fn add_edge(&mut self, parent: i32, child: i32) {
        self.children.entry(parent).or_default().push(child);
    }

    pub fn children_of(&self, tag_id: i32) -> &[i32] {
        self.children.get(&tag_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `to` is reachable from `from` by following zero or more edges.
    pub fn reaches(&self, from: i32, to: i32) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for &next in self.children_of(current) {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }

        false
    }

    /// Decides whether adding `parent -> child` keeps the graph acyclic.
    pub fn check_edge(&self, parent: i32, child: i32) -> DagCheck {
        if parent == child {
            return DagCheck::SelfLoop;
        }
        if self.reaches(child, parent) {
            return DagCheck::WouldCycle;
        }
        DagCheck::Valid
    }

    /// Returns one directed cycle if the stored edges contain any.
    ///
    /// Stored data should never contain one; this exists to surface integrity
    /// problems when a graph snapshot is read.
    pub fn find_cycle(&self) -> Option<Vec<i32>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            InProgress,
            Done,
        }

        let mut marks: HashMap<i32, Mark> = HashMap::new();
        let mut roots: Vec<i32> = self.children.keys().copied().collect();
        roots.sort_unstable();

        for root in roots {
            if marks.contains_key(&root) {
                continue;
            }
            // Each frame is (node, index of the next child to visit).
            let mut path: Vec<(i32, usize)> = vec![(root, 0)];
            marks.insert(root, Mark::InProgress);

            while let Some(frame) = path.last_mut() {
                let (node, next_index) = *frame;
                let children = self.children_of(node);
                if next_index >= children.len() {
                    marks.insert(node, Mark::Done);
                    path.pop();
                    continue;
                }
                frame.1 += 1;
                let child = children[next_index];
                match marks.get(&child) {
                    Some(Mark::InProgress) => {
                        let start = path.iter().position(|(id, _)| *id == child).unwrap_or(0);
                        let mut cycle: Vec<i32> = path[start..].iter().map(|(id, _)| *id).collect();
                        cycle.push(child);
                        return Some(cycle);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child, Mark::InProgress);
                        path.push((child, 0));
                    }
                }
            }
        }

        None
    }

    pub fn is_acyclic(&self) -> bool {
        self.find_cycle().is_none()
    }
}
