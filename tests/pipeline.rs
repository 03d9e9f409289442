// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end run of the inference pipeline on a synthetic patient with a
//! clean clonal structure: tree search, constrained CCF correction, cell
//! abundances and growth kinetics.

use std::collections::{BTreeMap, HashSet};

use phyloclone::inference::{
    BuildTreeEngineBuilder, CellPopulationEngine, GrowthKineticsEngine,
};
use phyloclone::model::{grid_value, CcfDensity, Cluster, MutationKey, Patient, Sample, GRID_SIZE};
use phyloclone::tree::{parse_edge_string, Tree};

fn gaussian_masses(mean: f64, sd: f64) -> Vec<f64> {
    (0..GRID_SIZE)
        .map(|i| {
            let x = grid_value(i);
            (-0.5 * ((x - mean) / sd).powi(2)).exp()
        })
        .collect()
}

/// Two samples, three clusters with clean dominance: cluster 1 is clonal,
/// cluster 2 grows between the timepoints, cluster 3 stays small.
fn synthetic_patient() -> Patient {
    let mut patient = Patient::new("PT01", HashSet::new());
    patient
        .add_sample(Sample::new("TP1", 0.0, 0.9).unwrap())
        .unwrap();
    patient
        .add_sample(Sample::new("TP2", 100.0, 0.85).unwrap())
        .unwrap();
    let sample_names = vec!["TP1".to_owned(), "TP2".to_owned()];
    let mut clusters = BTreeMap::new();
    for (id, mean_tp1, mean_tp2) in [(1, 0.98, 0.98), (2, 0.6, 0.75), (3, 0.3, 0.2)] {
        let mut cluster = Cluster::new(id, sample_names.clone());
        cluster
            .add_sample_density("TP1", &gaussian_masses(mean_tp1, 0.04))
            .unwrap();
        cluster
            .add_sample_density("TP2", &gaussian_masses(mean_tp2, 0.04))
            .unwrap();
        for m in 0..2 {
            cluster
                .add_mutation(
                    MutationKey::new(format!("{}:{}:A>G", id, 1000 + m), id),
                    vec![
                        CcfDensity::from_linear(&gaussian_masses(mean_tp1, 0.06)).unwrap(),
                        CcfDensity::from_linear(&gaussian_masses(mean_tp2, 0.06)).unwrap(),
                    ],
                )
                .unwrap();
        }
        clusters.insert(id, cluster);
    }
    patient.set_clustering_results(clusters).unwrap();
    patient
}

#[test]
fn pipeline_recovers_structure_and_kinetics() {
    let mut patient = synthetic_patient();

    // tree search
    let (top_tree, trace, ancestry) = {
        let mut engine = BuildTreeEngineBuilder::default()
            .patient(&patient)
            .seed(99)
            .build()
            .unwrap();
        engine.build_tree(800).unwrap();
        assert!(engine.is_viable());
        (
            engine.top_tree().unwrap().clone(),
            engine.mcmc_trace().clone(),
            engine.get_cell_ancestry(),
        )
    };

    // clusters 2 and 3 descend from the clonal cluster 1
    assert!(top_tree.is_ancestor(1, 2));
    assert!(top_tree.is_ancestor(1, 3));

    // ancestry consistency across the whole tree
    for a in top_tree.nodes() {
        for b in top_tree.nodes() {
            assert_eq!(
                top_tree.is_ancestor(a, b),
                top_tree.descendants(a).contains(&b)
            );
        }
    }

    // edge list round trip preserves structure
    let encoded = top_tree.to_edge_string();
    let mut rebuilt = Tree::from_clustering(patient.tree_cluster_ids()).unwrap();
    rebuilt.set_new_edges(&parse_edge_string(&encoded).unwrap()).unwrap();
    for node in top_tree.nodes() {
        assert_eq!(top_tree.ancestors(node), rebuilt.ancestors(node));
        assert_eq!(top_tree.children(node), rebuilt.children(node));
    }

    patient.set_top_tree(top_tree);
    patient.set_tree_ensemble(trace);
    assert!(ancestry.contains_key(&2));

    // constrained CCF and abundances
    let mut cp_engine = CellPopulationEngine::new(&patient, 99);
    let constrained = cp_engine.compute_constrained_ccf(400).unwrap();
    let abundance = cp_engine.get_cell_abundance(&constrained).unwrap();
    for values in abundance.values() {
        for &value in values {
            assert!(value >= 0.0);
        }
    }
    for summaries in constrained.mutations().values() {
        for summary in summaries {
            assert!((0.0..=1.0).contains(&summary.mean()));
            assert!(summary.low() <= summary.high());
        }
    }

    // growth kinetics: cluster 2 expands, cluster 3 shrinks
    let mut gk_engine = GrowthKineticsEngine::new(&patient, 99);
    let rates = gk_engine.estimate_growth_rate(&constrained, 200).unwrap();
    assert!(rates[&2].rate() > 0.0);
    assert!(rates[&3].rate() < 0.0);
}

#[test]
fn growth_kinetics_needs_two_timepoints() {
    let mut patient = Patient::new("PT02", HashSet::new());
    patient
        .add_sample(Sample::new("TP1", 0.0, 0.9).unwrap())
        .unwrap();
    let mut clusters = BTreeMap::new();
    let mut cluster = Cluster::new(1, vec!["TP1".to_owned()]);
    cluster
        .add_sample_density("TP1", &gaussian_masses(0.8, 0.05))
        .unwrap();
    clusters.insert(1, cluster);
    patient.set_clustering_results(clusters).unwrap();
    patient.set_top_tree(Tree::from_clustering(vec![1]).unwrap());

    let mut cp_engine = CellPopulationEngine::new(&patient, 1);
    let constrained = cp_engine.compute_constrained_ccf(50).unwrap();
    let mut gk_engine = GrowthKineticsEngine::new(&patient, 1);
    assert!(matches!(
        gk_engine.estimate_growth_rate(&constrained, 50),
        Err(phyloclone::errors::Error::InsufficientTimepoints { found: 1 })
    ));
}
