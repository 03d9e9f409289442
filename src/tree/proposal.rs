// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use rand::Rng;

use crate::tree::{NodeId, Tree, ROOT};

/// Structural moves the sampler chooses from, uniformly.
const N_MOVES: u32 = 3;

/// Propose a mutated copy of `tree`. The accepted tree is never touched; a
/// rejected proposal is simply dropped.
///
/// All moves pick uniformly from explicitly enumerated candidate sets and
/// every move is its own inverse kind with candidate sets of equal size
/// given the node set, so the Metropolis rule is applied without a Hastings
/// correction. A move without candidates degenerates to the identity
/// proposal.
pub(crate) fn propose<R: Rng>(tree: &Tree, rng: &mut R) -> Tree {
    let mut proposed = tree.clone();
    let nodes = tree.cluster_nodes();
    if nodes.len() < 2 {
        // a single cluster only admits the flat tree
        return proposed;
    }
    match rng.gen_range(0..N_MOVES) {
        0 => reattach(&mut proposed, &nodes, rng),
        1 => swap(&mut proposed, &nodes, rng),
        _ => spr(&mut proposed, &nodes, rng),
    }
    proposed
}

/// Move a node (with its subtree) below a new parent other than its current
/// one.
fn reattach<R: Rng>(tree: &mut Tree, nodes: &[NodeId], rng: &mut R) {
    let node = nodes[rng.gen_range(0..nodes.len())];
    let parent = tree.parent(node).expect("bug: cluster node without parent");
    let targets = regraft_targets(tree, node, Some(parent));
    if let Some(&target) = choose(&targets, rng) {
        tree.reattach_subtree(node, target)
            .expect("bug: enumerated reattach target must be valid");
    }
}

/// Exchange the positions of two clusters in the tree.
fn swap<R: Rng>(tree: &mut Tree, nodes: &[NodeId], rng: &mut R) {
    let a = nodes[rng.gen_range(0..nodes.len())];
    let b = nodes[rng.gen_range(0..nodes.len())];
    if a != b {
        tree.swap_labels(a, b);
    }
}

/// Subtree prune and regraft: like `reattach`, but the current parent stays
/// a candidate, so the move may reproduce the current tree.
fn spr<R: Rng>(tree: &mut Tree, nodes: &[NodeId], rng: &mut R) {
    let node = nodes[rng.gen_range(0..nodes.len())];
    let targets = regraft_targets(tree, node, None);
    if let Some(&target) = choose(&targets, rng) {
        tree.reattach_subtree(node, target)
            .expect("bug: enumerated regraft target must be valid");
    }
}

/// Nodes that can become the parent of `node` without creating a cycle:
/// everything outside the subtree rooted at `node`.
fn regraft_targets(tree: &Tree, node: NodeId, exclude: Option<NodeId>) -> Vec<NodeId> {
    let subtree = tree.descendants(node);
    tree.nodes()
        .into_iter()
        .filter(|&candidate| {
            candidate != node && !subtree.contains(&candidate) && Some(candidate) != exclude
        })
        .collect()
}

fn choose<'a, R: Rng, T>(candidates: &'a [T], rng: &mut R) -> Option<&'a T> {
    if candidates.is_empty() {
        None
    } else {
        Some(&candidates[rng.gen_range(0..candidates.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_proposals_preserve_validity() {
        let initial = Tree::from_edges(&[(ROOT, 1), (1, 2), (1, 3), (3, 4), (ROOT, 5)]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut current = initial.clone();
        for _ in 0..1000 {
            let proposed = propose(&current, &mut rng);
            assert_eq!(proposed.nodes(), initial.nodes());
            // re-building from the edge list re-runs full validation
            Tree::from_edges(&proposed.edges()).unwrap();
            current = proposed;
        }
    }

    #[test]
    fn test_regraft_targets_exclude_subtree() {
        let tree = Tree::from_edges(&[(ROOT, 1), (1, 2), (2, 3)]).unwrap();
        let targets = regraft_targets(&tree, 2, Some(1));
        assert_eq!(targets, vec![ROOT]);
    }

    #[test]
    fn test_single_cluster_proposal_is_identity() {
        let tree = Tree::from_edges(&[(ROOT, 1)]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(propose(&tree, &mut rng), tree);
    }

    #[test]
    fn test_proposals_are_reproducible() {
        let tree = Tree::from_edges(&[(ROOT, 1), (1, 2), (1, 3)]).unwrap();
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50).map(|_| propose(&tree, &mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }
}
