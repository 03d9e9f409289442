// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{BTreeMap, BTreeSet};

use bio::stats::LogProb;
use itertools::Itertools;

use crate::errors::{invalid_tree, Error, Result};
use crate::model::ClusterId;

pub mod likelihood;
pub mod proposal;

/// Node of a phylogenetic tree: either the synthetic root (`ROOT`) or a
/// cluster id.
pub type NodeId = ClusterId;

/// The synthetic root representing normal/founder cells, with CCF fixed at
/// 1 in every sample.
pub const ROOT: NodeId = 0;

/// Ordered sequence of sampled trees with their log-likelihoods.
pub type Trace = Vec<(Tree, LogProb)>;

/// A rooted tree over cluster ids plus the synthetic root. Every non-root
/// node has exactly one parent; child lists are kept sorted so traversal
/// order is deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree {
    parents: BTreeMap<NodeId, NodeId>,
    children: BTreeMap<NodeId, Vec<NodeId>>,
}

impl Tree {
    /// The flat initial tree: every cluster is a child of the root.
    pub fn from_clustering(cluster_ids: impl IntoIterator<Item = ClusterId>) -> Result<Self> {
        let ids: Vec<ClusterId> = cluster_ids.into_iter().collect();
        if ids.is_empty() {
            return Err(invalid_tree(
                "clustering contains no clusters eligible for tree building",
            ));
        }
        if ids.contains(&ROOT) {
            return Err(Error::ReservedClusterId { node: ROOT });
        }
        let edges: Vec<(NodeId, NodeId)> = ids.iter().map(|&id| (ROOT, id)).collect();
        Tree::from_edges(&edges)
    }

    /// Build a tree from parent-child pairs, validating the structure:
    /// exactly one tree, rooted at the synthetic root, no cycles, no node
    /// with more than one parent.
    pub fn from_edges(edges: &[(NodeId, NodeId)]) -> Result<Self> {
        let mut parents = BTreeMap::new();
        let mut children: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        children.entry(ROOT).or_default();
        for &(parent, child) in edges {
            if child == ROOT {
                return Err(invalid_tree("the synthetic root cannot have a parent"));
            }
            if parents.insert(child, parent).is_some() {
                return Err(invalid_tree(format!(
                    "node {} has more than one parent",
                    child
                )));
            }
            children.entry(parent).or_default().push(child);
            children.entry(child).or_default();
        }
        for childlist in children.values_mut() {
            childlist.sort_unstable();
        }
        let tree = Tree { parents, children };
        tree.validate()?;
        Ok(tree)
    }

    /// Check reachability of every node from the root. Multi-parent nodes
    /// are rejected at construction, so any unreachable node indicates a
    /// cycle or a disconnected component.
    fn validate(&self) -> Result<()> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                return Err(invalid_tree(format!("node {} is visited twice", node)));
            }
            stack.extend(self.children(node));
        }
        if visited.len() != self.children.len() {
            let orphan = self
                .children
                .keys()
                .find(|node| !visited.contains(node))
                .expect("bug: visited count mismatch without orphan");
            return Err(invalid_tree(format!(
                "node {} is disconnected from the root or part of a cycle",
                orphan
            )));
        }
        Ok(())
    }

    /// Replace the full edge set. Fails with `InvalidTree` if the result is
    /// not a single valid tree over exactly the same node set.
    pub fn set_new_edges(&mut self, edges: &[(NodeId, NodeId)]) -> Result<()> {
        let candidate = Tree::from_edges(edges)?;
        if candidate.nodes() != self.nodes() {
            return Err(invalid_tree(
                "edge list does not span exactly the expected clusters",
            ));
        }
        *self = candidate;
        Ok(())
    }

    /// All nodes (root included), ascending.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.children.keys().cloned().collect()
    }

    /// All cluster nodes (root excluded), ascending.
    pub fn cluster_nodes(&self) -> Vec<NodeId> {
        self.children.keys().cloned().filter(|&n| n != ROOT).collect()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.children.contains_key(&node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).cloned()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children
            .get(&node)
            .map(|children| children.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestors of `node`, ordered root first, excluding the node itself.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// All nodes below `node` (the node itself excluded); order is not part
    /// of the contract.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).to_vec();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current));
        }
        result
    }

    pub fn siblings(&self, node: NodeId) -> Vec<NodeId> {
        match self.parent(node) {
            Some(parent) => self
                .children(parent)
                .iter()
                .cloned()
                .filter(|&sibling| sibling != node)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).contains(&ancestor)
    }

    /// Parent-child pairs, sorted by child id.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.parents
            .iter()
            .map(|(&child, &parent)| (parent, child))
            .sorted_by_key(|&(_, child)| child)
            .collect()
    }

    /// Textual edge-list encoding, e.g. `0-1,1-2,1-3`. The inverse of
    /// [`parse_edge_string`].
    pub fn to_edge_string(&self) -> String {
        self.edges()
            .iter()
            .map(|(parent, child)| format!("{}-{}", parent, child))
            .join(",")
    }

    /// Move `node` together with its subtree below `new_parent`. Fails if
    /// the edge would create a cycle, i.e. if `new_parent` lies inside the
    /// subtree of `node`.
    pub(crate) fn reattach_subtree(&mut self, node: NodeId, new_parent: NodeId) -> Result<()> {
        if node == ROOT {
            return Err(invalid_tree("the synthetic root cannot be moved"));
        }
        if new_parent == node || self.descendants(node).contains(&new_parent) {
            return Err(invalid_tree(format!(
                "reattaching node {} below {} would create a cycle",
                node, new_parent
            )));
        }
        if !self.contains(new_parent) {
            return Err(invalid_tree(format!("unknown node {}", new_parent)));
        }
        let old_parent = self
            .parent(node)
            .expect("bug: non-root node without parent");
        let childlist = self
            .children
            .get_mut(&old_parent)
            .expect("bug: parent without child list");
        childlist.retain(|&child| child != node);
        let childlist = self
            .children
            .get_mut(&new_parent)
            .expect("bug: missing child list");
        childlist.push(node);
        childlist.sort_unstable();
        self.parents.insert(node, new_parent);
        Ok(())
    }

    /// Exchange the positions of two cluster nodes by relabeling, which
    /// preserves validity for any pair, including ancestor-descendant pairs.
    pub(crate) fn swap_labels(&mut self, a: NodeId, b: NodeId) {
        assert!(a != ROOT && b != ROOT, "bug: cannot swap the root");
        let relabel = |node: NodeId| {
            if node == a {
                b
            } else if node == b {
                a
            } else {
                node
            }
        };
        let edges: Vec<(NodeId, NodeId)> = self
            .edges()
            .iter()
            .map(|&(parent, child)| (relabel(parent), relabel(child)))
            .collect();
        *self = Tree::from_edges(&edges).expect("bug: label swap must preserve validity");
    }
}

/// Parse the textual edge-list encoding produced by [`Tree::to_edge_string`].
pub fn parse_edge_string(encoded: &str) -> Result<Vec<(NodeId, NodeId)>> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(Error::InvalidEdgeList {
            token: String::new(),
        });
    }
    encoded
        .split(',')
        .map(|token| {
            let invalid = || Error::InvalidEdgeList {
                token: token.to_owned(),
            };
            let (parent, child) = token.trim().splitn(2, '-').collect_tuple().ok_or_else(invalid)?;
            Ok((
                parent.parse().map_err(|_| invalid())?,
                child.parse().map_err(|_| invalid())?,
            ))
        })
        .collect()
}
