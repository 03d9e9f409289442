// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{BTreeMap, BTreeSet};

use derive_new::new;
use getset::{CopyGetters, Getters};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_derive::Serialize;

use crate::errors::{Error, Result};
use crate::model::{grid_value, CcfDensity, ClusterId, MutationKey, Patient, GRID_SIZE};
use crate::tree::{NodeId, Tree, ROOT};
use crate::utils::summarize_draws;

/// Re-estimates mutation and cluster CCF posteriors subject to the ancestry
/// constraints of the patient's top tree, and derives per-clone cell
/// abundances from the corrected values.
///
/// Correction walks the tree top-down in a fixed preorder (children in
/// ascending id order): the feasible CCF range of a node is what its
/// parent's draw leaves after earlier siblings took their share. Densities
/// are truncated to that range and renormalized before sampling.
pub struct CellPopulationEngine<'a> {
    patient: &'a Patient,
    rng: StdRng,
}

impl<'a> CellPopulationEngine<'a> {
    pub fn new(patient: &'a Patient, seed: u64) -> Self {
        CellPopulationEngine {
            patient,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw `n_iter` constrained samples per cluster and mutation in every
    /// sample and summarize them. Infeasible ranges are clipped to the
    /// boundary and reported, never fatal.
    pub fn compute_constrained_ccf(&mut self, n_iter: usize) -> Result<ConstrainedCcf> {
        let tree = self
            .patient
            .top_tree()
            .ok_or_else(|| Error::MissingTopTree {
                patient: self.patient.name().clone(),
            })?;
        let order = preorder(tree);
        let n_samples = self.patient.n_samples();

        let mut cluster_draws: BTreeMap<ClusterId, Vec<Vec<f64>>> = order
            .iter()
            .map(|&node| (node, vec![Vec::with_capacity(n_iter); n_samples]))
            .collect();
        let mut mutation_draws: BTreeMap<MutationKey, Vec<Vec<f64>>> = BTreeMap::new();
        let mut infeasible = BTreeSet::new();

        for sample_idx in 0..n_samples {
            let sample_name = self.patient.sample_list()[sample_idx].sample_name().clone();
            // densities are fixed across iterations, fetch them once
            let cluster_densities: BTreeMap<NodeId, CcfDensity> = order
                .iter()
                .map(|&node| Ok((node, self.patient.cluster(node)?.density(sample_idx))))
                .collect::<Result<_>>()?;

            for _ in 0..n_iter {
                let mut assigned: BTreeMap<NodeId, usize> = BTreeMap::new();
                assigned.insert(ROOT, GRID_SIZE - 1);
                let mut consumed: BTreeMap<NodeId, usize> = BTreeMap::new();

                for &node in &order {
                    let parent = tree.parent(node).expect("bug: non-root node without parent");
                    let parent_ccf = assigned[&parent];
                    let available =
                        parent_ccf.saturating_sub(consumed.get(&parent).copied().unwrap_or(0));

                    let ccf = match cluster_densities[&node].truncate_upper(available) {
                        Some(truncated) => truncated.sample(&mut self.rng),
                        None => {
                            infeasible.insert(InfeasibleConstraint::new(
                                sample_name.clone(),
                                node,
                                None,
                            ));
                            available
                        }
                    };
                    assigned.insert(node, ccf);
                    *consumed.entry(parent).or_insert(0) += ccf;
                    cluster_draws
                        .get_mut(&node)
                        .expect("bug: draw storage missing")[sample_idx]
                        .push(grid_value(ccf));

                    for (key, densities) in self.patient.cluster(node)?.mutations() {
                        let density = densities.get(sample_idx).ok_or_else(|| {
                            Error::MissingMutationDensity {
                                var_str: key.var_str.clone(),
                                sample: sample_name.clone(),
                            }
                        })?;
                        let mutation_ccf = match density.truncate_upper(available) {
                            Some(truncated) => truncated.sample(&mut self.rng),
                            None => {
                                infeasible.insert(InfeasibleConstraint::new(
                                    sample_name.clone(),
                                    node,
                                    Some(key.clone()),
                                ));
                                available
                            }
                        };
                        mutation_draws
                            .entry(key.clone())
                            .or_insert_with(|| vec![Vec::with_capacity(n_iter); n_samples])
                            [sample_idx]
                            .push(grid_value(mutation_ccf));
                    }
                }
            }
        }

        for constraint in &infeasible {
            warn!(
                "infeasible CCF range in sample {} for cluster {}{}: clipped to the ancestor bound",
                constraint.sample_name,
                constraint.cluster_id,
                constraint
                    .mutation
                    .as_ref()
                    .map(|key| format!(" (mutation {})", key))
                    .unwrap_or_default()
            );
        }

        Ok(ConstrainedCcf {
            mutations: summarize(&mutation_draws),
            clusters: summarize(&cluster_draws),
            cluster_draws,
            infeasible: infeasible.into_iter().collect(),
        })
    }

    /// Per cluster and sample: the cell fraction attributable to the clone
    /// itself, i.e. its corrected CCF minus what its direct children claim,
    /// floored at zero.
    pub fn get_cell_abundance(
        &self,
        constrained: &ConstrainedCcf,
    ) -> Result<BTreeMap<ClusterId, Vec<f64>>> {
        let tree = self
            .patient
            .top_tree()
            .ok_or_else(|| Error::MissingTopTree {
                patient: self.patient.name().clone(),
            })?;
        let n_samples = self.patient.n_samples();
        let mut abundance = BTreeMap::new();
        for cluster in tree.cluster_nodes() {
            let own = constrained
                .clusters
                .get(&cluster)
                .ok_or(Error::UnknownCluster {
                    cluster_id: cluster,
                })?;
            let values = (0..n_samples)
                .map(|sample_idx| {
                    let children: f64 = tree
                        .children(cluster)
                        .iter()
                        .filter_map(|child| constrained.clusters.get(child))
                        .map(|summaries| summaries[sample_idx].mean())
                        .sum();
                    (own[sample_idx].mean() - children).max(0.0)
                })
                .collect();
            abundance.insert(cluster, values);
        }
        Ok(abundance)
    }
}

/// Preorder over the cluster nodes of the tree (root excluded); parents
/// always precede their children, siblings are visited in ascending order.
fn preorder(tree: &Tree) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(ROOT).iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        order.push(node);
        stack.extend(tree.children(node).iter().rev().cloned());
    }
    order
}

fn summarize<K: Clone + Ord>(
    draws: &BTreeMap<K, Vec<Vec<f64>>>,
) -> BTreeMap<K, Vec<CcfSummary>> {
    draws
        .iter()
        .map(|(key, per_sample)| {
            let summaries = per_sample
                .iter()
                .map(|draws| {
                    let (mean, low, high) = summarize_draws(draws);
                    CcfSummary::new(mean, low, high)
                })
                .collect();
            (key.clone(), summaries)
        })
        .collect()
}

/// Mean and central 95% interval of a corrected CCF posterior.
#[derive(Clone, Copy, Debug, PartialEq, new, CopyGetters, Serialize)]
#[getset(get_copy = "pub")]
pub struct CcfSummary {
    mean: f64,
    low: f64,
    high: f64,
}

/// A (sample, cluster[, mutation]) combination whose feasible CCF range
/// collapsed to empty during correction.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, new, Getters)]
#[getset(get = "pub")]
pub struct InfeasibleConstraint {
    sample_name: String,
    cluster_id: ClusterId,
    mutation: Option<MutationKey>,
}

/// Corrected CCF posteriors for all mutations and clusters, plus the raw
/// per-cluster draws (consumed by the growth-kinetics bootstrap).
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct ConstrainedCcf {
    mutations: BTreeMap<MutationKey, Vec<CcfSummary>>,
    clusters: BTreeMap<ClusterId, Vec<CcfSummary>>,
    cluster_draws: BTreeMap<ClusterId, Vec<Vec<f64>>>,
    infeasible: Vec<InfeasibleConstraint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cluster, Sample};
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

    fn patient_with_chain(means: &[(ClusterId, f64, f64)]) -> Patient {
        let mut patient = Patient::new("PT01", HashSet::new());
        patient
            .add_sample(Sample::new("TP1", 0.0, 0.9).unwrap())
            .unwrap();
        patient
            .add_sample(Sample::new("TP2", 120.0, 0.8).unwrap())
            .unwrap();
        let sample_names = vec!["TP1".to_owned(), "TP2".to_owned()];
        let mut clusters = BTreeMap::new();
        for &(id, mean_tp1, mean_tp2) in means {
            let mut cluster = Cluster::new(id, sample_names.clone());
            cluster
                .add_sample_density("TP1", &gaussian_masses(mean_tp1, 0.03))
                .unwrap();
            cluster
                .add_sample_density("TP2", &gaussian_masses(mean_tp2, 0.03))
                .unwrap();
            cluster
                .add_mutation(
                    MutationKey::new(format!("1:{}:A>T", 100 + id), id),
                    vec![
                        CcfDensity::from_linear(&gaussian_masses(mean_tp1, 0.05)).unwrap(),
                        CcfDensity::from_linear(&gaussian_masses(mean_tp2, 0.05)).unwrap(),
                    ],
                )
                .unwrap();
            clusters.insert(id, cluster);
        }
        patient.set_clustering_results(clusters).unwrap();
        patient
    }

    #[test]
    fn test_abundance_of_dominant_clone() {
        let mut patient = patient_with_chain(&[(1, 0.98, 0.98), (2, 0.6, 0.6), (3, 0.3, 0.3)]);
        patient.set_top_tree(Tree::from_edges(&[(ROOT, 1), (1, 2), (2, 3)]).unwrap());
        let mut engine = CellPopulationEngine::new(&patient, 7);
        let constrained = engine.compute_constrained_ccf(500).unwrap();
        let abundance = engine.get_cell_abundance(&constrained).unwrap();
        // clone 1 keeps what clone 2 does not claim
        assert_relative_eq!(abundance[&1][0], 0.4, epsilon = 0.07);
        assert_relative_eq!(abundance[&2][0], 0.3, epsilon = 0.07);
    }

    #[test]
    fn test_abundance_is_non_negative() {
        let mut patient = patient_with_chain(&[(1, 0.5, 0.5), (2, 0.45, 0.5), (3, 0.4, 0.45)]);
        patient.set_top_tree(Tree::from_edges(&[(ROOT, 1), (1, 2), (2, 3)]).unwrap());
        let mut engine = CellPopulationEngine::new(&patient, 11);
        let constrained = engine.compute_constrained_ccf(300).unwrap();
        let abundance = engine.get_cell_abundance(&constrained).unwrap();
        for values in abundance.values() {
            for &value in values {
                assert!(value >= 0.0);
            }
        }
    }

    #[test]
    fn test_constrained_summaries_respect_ancestry() {
        let mut patient = patient_with_chain(&[(1, 0.9, 0.9), (2, 0.5, 0.5), (3, 0.2, 0.2)]);
        patient.set_top_tree(Tree::from_edges(&[(ROOT, 1), (1, 2), (2, 3)]).unwrap());
        let mut engine = CellPopulationEngine::new(&patient, 3);
        let constrained = engine.compute_constrained_ccf(300).unwrap();
        for sample_idx in 0..2 {
            let c1 = constrained.clusters()[&1][sample_idx].mean();
            let c2 = constrained.clusters()[&2][sample_idx].mean();
            let c3 = constrained.clusters()[&3][sample_idx].mean();
            assert!(c1 >= c2 - 0.05);
            assert!(c2 >= c3 - 0.05);
        }
        for summaries in constrained.mutations().values() {
            for summary in summaries {
                assert!(summary.low() <= summary.mean() && summary.mean() <= summary.high());
                assert!((0.0..=1.0).contains(&summary.mean()));
            }
        }
    }

    #[test]
    fn test_infeasible_range_is_clipped_and_reported() {
        // child mass sits far above what the parent can concede
        let mut patient = patient_with_chain(&[(1, 0.2, 0.2), (2, 0.8, 0.8)]);
        patient.set_top_tree(Tree::from_edges(&[(ROOT, 1), (1, 2)]).unwrap());
        let mut engine = CellPopulationEngine::new(&patient, 5);
        let constrained = engine.compute_constrained_ccf(200).unwrap();
        assert!(constrained
            .infeasible()
            .iter()
            .any(|c| *c.cluster_id() == 2));
        // clipped to the parent's CCF, well below the unconstrained mean
        assert!(constrained.clusters()[&2][0].mean() < 0.3);
    }
}
