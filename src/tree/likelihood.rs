// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{BTreeMap, HashMap};

use bio::stats::LogProb;

use crate::errors::{Error, Result};
use crate::model::{CcfDensity, Patient, SumDensity, GRID_SIZE};
use crate::tree::{NodeId, Tree, ROOT};

lazy_static! {
    /// Complementary CDF of the synthetic root: CCF is 1 in every sample,
    /// so the root dominates any grid value.
    static ref ROOT_CCDF: Vec<LogProb> = CcfDensity::point_mass(GRID_SIZE - 1).ccdf();
}

/// Scores trees under the phylogenetic sum rule: in every sample, a parent
/// clone's CCF must be at least the combined CCF of its children. The total
/// log-likelihood is the sum over samples and parent-children groups of
/// `ln P(parent >= sum of children)`.
///
/// The score is a pure function of (tree, densities); repeated evaluations
/// are served from a cache keyed by the tree's edge list.
pub struct SumRuleEvaluator {
    densities: BTreeMap<NodeId, Vec<CcfDensity>>,
    ccdfs: BTreeMap<NodeId, Vec<Vec<LogProb>>>,
    n_samples: usize,
    cache: HashMap<Vec<(NodeId, NodeId)>, LogProb>,
}

impl SumRuleEvaluator {
    /// Precompute per-sample densities and complementary CDFs for every
    /// non-blacklisted cluster of the patient.
    pub fn new(patient: &Patient) -> Result<Self> {
        let n_samples = patient.n_samples();
        let mut densities = BTreeMap::new();
        let mut ccdfs = BTreeMap::new();
        for cluster_id in patient.tree_cluster_ids() {
            let cluster = patient.cluster(cluster_id)?;
            let per_sample: Vec<CcfDensity> =
                (0..n_samples).map(|idx| cluster.density(idx)).collect();
            ccdfs.insert(
                cluster_id,
                per_sample.iter().map(|density| density.ccdf()).collect(),
            );
            densities.insert(cluster_id, per_sample);
        }
        Ok(SumRuleEvaluator {
            densities,
            ccdfs,
            n_samples,
            cache: HashMap::new(),
        })
    }

    /// Log-likelihood of the given tree.
    pub fn compute(&mut self, tree: &Tree) -> Result<LogProb> {
        let key = tree.edges();
        if let Some(&ll) = self.cache.get(&key) {
            return Ok(ll);
        }
        let mut ll = LogProb::ln_one();
        for sample_idx in 0..self.n_samples {
            for node in tree.nodes() {
                let children = tree.children(node);
                if children.is_empty() {
                    continue;
                }
                let sum = children.iter().try_fold(
                    SumDensity::identity(),
                    |acc, &child| -> Result<SumDensity> {
                        Ok(acc.convolve(self.density(child, sample_idx)?))
                    },
                )?;
                ll = ll + sum.ln_prob_dominated_by(self.ccdf(node, sample_idx)?);
            }
        }
        self.cache.insert(key, ll);
        Ok(ll)
    }

    fn density(&self, node: NodeId, sample_idx: usize) -> Result<&CcfDensity> {
        self.densities
            .get(&node)
            .map(|per_sample| &per_sample[sample_idx])
            .ok_or(Error::UnknownCluster { cluster_id: node })
    }

    fn ccdf(&self, node: NodeId, sample_idx: usize) -> Result<&[LogProb]> {
        if node == ROOT {
            return Ok(&ROOT_CCDF);
        }
        self.ccdfs
            .get(&node)
            .map(|per_sample| per_sample[sample_idx].as_slice())
            .ok_or(Error::UnknownCluster { cluster_id: node })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{grid_value, Cluster, Sample};
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn gaussian_masses(mean: f64, sd: f64) -> Vec<f64> {
        (0..GRID_SIZE)
            .map(|i| {
                let x = grid_value(i);
                (-0.5 * ((x - mean) / sd).powi(2)).exp()
            })
            .collect()
    }

    fn dominance_patient() -> Patient {
        let mut patient = Patient::new("PT01", HashSet::new());
        patient
            .add_sample(Sample::new("TP1", 0.0, 0.9).unwrap())
            .unwrap();
        patient
            .add_sample(Sample::new("TP2", 120.0, 0.8).unwrap())
            .unwrap();
        let sample_names = vec!["TP1".to_owned(), "TP2".to_owned()];
        let mut clusters = std::collections::BTreeMap::new();
        for (id, mean_tp1, mean_tp2) in [(1, 0.95, 0.97), (2, 0.6, 0.55), (3, 0.3, 0.25)] {
            let mut cluster = Cluster::new(id, sample_names.clone());
            cluster
                .add_sample_density("TP1", &gaussian_masses(mean_tp1, 0.05))
                .unwrap();
            cluster
                .add_sample_density("TP2", &gaussian_masses(mean_tp2, 0.05))
                .unwrap();
            clusters.insert(id, cluster);
        }
        patient.set_clustering_results(clusters).unwrap();
        patient
    }

    #[test]
    fn test_idempotence() {
        let patient = dominance_patient();
        let tree = Tree::from_edges(&[(ROOT, 1), (1, 2), (2, 3)]).unwrap();
        let mut evaluator = SumRuleEvaluator::new(&patient).unwrap();
        let first = evaluator.compute(&tree).unwrap();
        let second = evaluator.compute(&tree).unwrap();
        assert_relative_eq!(*first, *second);
        // also without the cache
        let mut fresh = SumRuleEvaluator::new(&patient).unwrap();
        assert_relative_eq!(*first, *fresh.compute(&tree).unwrap());
    }

    #[test]
    fn test_sum_rule_ordering() {
        let patient = dominance_patient();
        let mut evaluator = SumRuleEvaluator::new(&patient).unwrap();
        let consistent = Tree::from_edges(&[(ROOT, 1), (1, 2), (2, 3)]).unwrap();
        // inverted dominance violates the sum rule at every internal node in
        // every sample
        let inverted = Tree::from_edges(&[(ROOT, 3), (3, 2), (2, 1)]).unwrap();
        let ll_consistent = evaluator.compute(&consistent).unwrap();
        let ll_inverted = evaluator.compute(&inverted).unwrap();
        assert!(ll_consistent > ll_inverted);
    }

    #[test]
    fn test_chain_beats_flat_for_nested_ccfs() {
        let patient = dominance_patient();
        let mut evaluator = SumRuleEvaluator::new(&patient).unwrap();
        let chain = Tree::from_edges(&[(ROOT, 1), (1, 2), (2, 3)]).unwrap();
        let flat = Tree::from_edges(&[(ROOT, 1), (ROOT, 2), (ROOT, 3)]).unwrap();
        // under the root, the three clusters sum to ~1.85, far beyond 1
        assert!(evaluator.compute(&chain).unwrap() > evaluator.compute(&flat).unwrap());
    }

    #[test]
    fn test_degenerate_density_scores_without_panicking() {
        let mut patient = dominance_patient();
        let sample_names = vec!["TP1".to_owned(), "TP2".to_owned()];
        let mut clusters = patient.clustering_results().clone();
        let mut degenerate = Cluster::new(4, sample_names);
        let mut masses = vec![0.0; GRID_SIZE];
        masses[0] = 1.0;
        degenerate.add_sample_density("TP1", &masses).unwrap();
        degenerate.add_sample_density("TP2", &masses).unwrap();
        clusters.insert(4, degenerate);
        patient.set_clustering_results(clusters).unwrap();
        let tree = Tree::from_edges(&[(ROOT, 1), (1, 2), (2, 3), (3, 4)]).unwrap();
        let mut evaluator = SumRuleEvaluator::new(&patient).unwrap();
        evaluator.compute(&tree).unwrap();
    }

    #[test]
    fn test_unknown_cluster_is_reported() {
        let patient = dominance_patient();
        let mut evaluator = SumRuleEvaluator::new(&patient).unwrap();
        let tree = Tree::from_edges(&[(ROOT, 1), (1, 7)]).unwrap();
        assert_eq!(
            evaluator.compute(&tree),
            Err(Error::UnknownCluster { cluster_id: 7 })
        );
    }
}
