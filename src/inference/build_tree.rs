// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::BTreeMap;
use std::time::Duration;

use bio::stats::LogProb;
use derive_builder::Builder;
use derive_new::new;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use progress_logger::ProgressLogger;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::errors::Result;
use crate::model::{ClusterId, Patient};
use crate::tree::likelihood::SumRuleEvaluator;
use crate::tree::proposal::propose;
use crate::tree::{NodeId, Trace, Tree, ROOT};

/// Metropolis sampler over tree topologies. Starts from the flat tree (all
/// clusters below the root), proposes structural moves, and accepts with
/// probability `min(1, exp(LL_proposed - LL_current))`. Every iteration is
/// recorded in the trace; rejected steps repeat the previous entry.
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct BuildTreeEngine<'a> {
    patient: &'a Patient,
    #[builder(default = "0.1")]
    burn_in_fraction: f64,
    #[builder(default = "42")]
    seed: u64,
    /// Independent chains run in parallel, each with its own deep copy of
    /// the tree state and a seed derived from `seed`.
    #[builder(default = "1")]
    n_chains: usize,
    #[builder(setter(skip), default)]
    trace: Trace,
    #[builder(setter(skip), default)]
    top: Option<(Tree, LogProb)>,
}

impl<'a> BuildTreeEngine<'a> {
    /// Run the sampler for `n_iter` iterations per chain. Afterwards the
    /// post-burn-in trace, the top tree and the ancestry marginals are
    /// available.
    pub fn build_tree(&mut self, n_iter: usize) -> Result<()> {
        info!(
            "building tree for patient {}: {} clusters, {} samples, {} iterations, {} chain(s)",
            self.patient.name(),
            self.patient.tree_cluster_ids().len(),
            self.patient.n_samples(),
            n_iter,
            self.n_chains
        );
        let chain_traces: Vec<Result<Trace>> = (0..self.n_chains)
            .into_par_iter()
            .map(|chain| self.run_chain(n_iter, self.seed.wrapping_add(chain as u64)))
            .collect();
        let burn_in = (n_iter as f64 * self.burn_in_fraction).floor() as usize;
        self.trace.clear();
        for chain_trace in chain_traces {
            let chain_trace = chain_trace?;
            self.trace
                .extend(chain_trace.into_iter().skip(burn_in));
        }
        // ties are broken in favor of the most recent tree
        self.top = self
            .trace
            .iter()
            .fold(None, |best: Option<(Tree, LogProb)>, (tree, ll)| match best {
                Some((_, best_ll)) if best_ll > *ll => best,
                _ => Some((tree.clone(), *ll)),
            });
        if let Some((_, best_ll)) = &self.top {
            info!("top tree log-likelihood: {:.4}", **best_ll);
        }
        Ok(())
    }

    fn run_chain(&self, n_iter: usize, seed: u64) -> Result<Trace> {
        let mut evaluator = SumRuleEvaluator::new(self.patient)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut current = Tree::from_clustering(self.patient.tree_cluster_ids())?;
        let mut current_ll = evaluator.compute(&current)?;
        let mut trace = Trace::with_capacity(n_iter);
        let mut n_accepted = 0usize;
        let mut progress = ProgressLogger::builder()
            .with_items_name("iterations")
            .with_frequency(Duration::from_secs(20))
            .start();
        for _ in 0..n_iter {
            let proposed = propose(&current, &mut rng);
            let proposed_ll = evaluator.compute(&proposed)?;
            if accept(current_ll, proposed_ll, &mut rng) {
                current = proposed;
                current_ll = proposed_ll;
                n_accepted += 1;
            }
            trace.push((current.clone(), current_ll));
            progress.update(1u64);
        }
        progress.stop();
        debug!(
            "chain with seed {} accepted {}/{} proposals",
            seed, n_accepted, n_iter
        );
        Ok(trace)
    }

    /// The highest-scoring tree observed after burn-in.
    pub fn top_tree(&self) -> Option<&Tree> {
        self.top.as_ref().map(|(tree, _)| tree)
    }

    pub fn top_log_likelihood(&self) -> Option<LogProb> {
        self.top.as_ref().map(|(_, ll)| *ll)
    }

    /// The post-burn-in trace (all chains concatenated).
    pub fn mcmc_trace(&self) -> &Trace {
        &self.trace
    }

    /// Whether any sampled tree satisfies the sum rule with nonzero
    /// probability. Callers must treat a non-viable run as fatal.
    pub fn is_viable(&self) -> bool {
        self.trace
            .iter()
            .any(|(_, ll)| **ll > f64::NEG_INFINITY)
    }

    /// Distinct sampled trees ranked by posterior frequency, then by
    /// log-likelihood.
    pub fn ranked_trees(&self) -> Vec<RankedTree> {
        let mut by_edges: BTreeMap<Vec<(NodeId, NodeId)>, (Tree, LogProb, usize)> =
            BTreeMap::new();
        for (tree, ll) in &self.trace {
            let entry = by_edges
                .entry(tree.edges())
                .or_insert_with(|| (tree.clone(), *ll, 0));
            entry.2 += 1;
        }
        by_edges
            .into_iter()
            .map(|(_, (tree, log_likelihood, posterior_count))| RankedTree {
                tree,
                log_likelihood,
                posterior_count,
            })
            .sorted_by(|a, b| {
                b.posterior_count
                    .cmp(&a.posterior_count)
                    .then_with(|| {
                        b.log_likelihood
                            .partial_cmp(&a.log_likelihood)
                            .expect("bug: log-likelihood is NaN")
                    })
            })
            .collect()
    }

    /// Per cluster: the ancestor path in the top tree (root excluded, the
    /// cluster itself included) together with the marginal probability, over
    /// the post-burn-in trace, that each path member is an ancestor of the
    /// cluster.
    pub fn get_cell_ancestry(&self) -> BTreeMap<ClusterId, CellAncestry> {
        let top_tree = match self.top_tree() {
            Some(tree) => tree,
            None => return BTreeMap::new(),
        };
        let n_trees = self.trace.len().max(1) as f64;
        let mut result = BTreeMap::new();
        for cluster in top_tree.cluster_nodes() {
            let mut path: Vec<NodeId> = top_tree
                .ancestors(cluster)
                .into_iter()
                .filter(|&node| node != ROOT)
                .collect();
            path.push(cluster);
            let marginal_probs = path
                .iter()
                .map(|&node| {
                    if node == cluster {
                        1.0
                    } else {
                        self.trace
                            .iter()
                            .filter(|(tree, _)| tree.is_ancestor(node, cluster))
                            .count() as f64
                            / n_trees
                    }
                })
                .collect();
            result.insert(
                cluster,
                CellAncestry {
                    ancestors: path,
                    marginal_probs,
                },
            );
        }
        result
    }
}

fn accept<R: Rng>(current_ll: LogProb, proposed_ll: LogProb, rng: &mut R) -> bool {
    // comparing first keeps `-inf - -inf` out of the acceptance ratio
    if proposed_ll >= current_ll {
        return true;
    }
    let ratio = (*proposed_ll - *current_ll).exp();
    rng.gen::<f64>() < ratio
}

/// A distinct tree from the ensemble with its posterior visit count.
#[derive(Clone, Debug, new, Getters, CopyGetters)]
pub struct RankedTree {
    #[getset(get = "pub")]
    tree: Tree,
    #[getset(get_copy = "pub")]
    log_likelihood: LogProb,
    #[getset(get_copy = "pub")]
    posterior_count: usize,
}

/// Ancestor path of a cluster with per-ancestor marginal probabilities from
/// the sampled ensemble.
#[derive(Clone, Debug, Getters)]
pub struct CellAncestry {
    /// Path from below the root down to the cluster itself.
    #[getset(get = "pub")]
    ancestors: Vec<NodeId>,
    /// For each path member, the fraction of the ensemble in which it is an
    /// ancestor of the cluster (1.0 for the cluster itself).
    #[getset(get = "pub")]
    marginal_probs: Vec<f64>,
}
