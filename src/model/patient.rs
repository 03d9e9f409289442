// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{BTreeMap, HashSet};

use getset::Getters;

use crate::errors::{Error, Result};
use crate::model::{Cluster, ClusterId, Sample};
use crate::tree::{Trace, Tree, ROOT};

/// All per-patient state the inference engines operate on: the ordered
/// samples, the clustering results, and the inferred trees. This registry
/// replaces any global lookup tables; engines receive it by reference.
#[derive(Clone, Debug, Default, Getters)]
pub struct Patient {
    #[getset(get = "pub")]
    name: String,
    #[getset(get = "pub")]
    driver_genes: HashSet<String>,
    #[getset(get = "pub")]
    sample_list: Vec<Sample>,
    #[getset(get = "pub")]
    clustering_results: BTreeMap<ClusterId, Cluster>,
    top_tree: Option<Tree>,
    tree_ensemble: Option<Trace>,
}

impl Patient {
    pub fn new(name: impl Into<String>, driver_genes: HashSet<String>) -> Self {
        Patient {
            name: name.into(),
            driver_genes,
            ..Default::default()
        }
    }

    pub fn add_sample(&mut self, sample: Sample) -> Result<()> {
        if self
            .sample_list
            .iter()
            .any(|s| s.sample_name() == sample.sample_name())
        {
            return Err(Error::DuplicateSample {
                sample: sample.sample_name().clone(),
            });
        }
        self.sample_list.push(sample);
        Ok(())
    }

    pub fn n_samples(&self) -> usize {
        self.sample_list.len()
    }

    pub fn sample_idx(&self, sample_name: &str) -> Result<usize> {
        self.sample_list
            .iter()
            .position(|s| s.sample_name() == sample_name)
            .ok_or_else(|| Error::UnknownSample {
                sample: sample_name.to_owned(),
            })
    }

    /// Install the clustering results. Cluster ids have to avoid the id of
    /// the synthetic root.
    pub fn set_clustering_results(&mut self, clusters: BTreeMap<ClusterId, Cluster>) -> Result<()> {
        if clusters.contains_key(&ROOT) {
            return Err(Error::ReservedClusterId { node: ROOT });
        }
        self.clustering_results = clusters;
        Ok(())
    }

    pub fn cluster(&self, cluster_id: ClusterId) -> Result<&Cluster> {
        self.clustering_results
            .get(&cluster_id)
            .ok_or(Error::UnknownCluster { cluster_id })
    }

    pub fn cluster_mut(&mut self, cluster_id: ClusterId) -> Result<&mut Cluster> {
        self.clustering_results
            .get_mut(&cluster_id)
            .ok_or(Error::UnknownCluster { cluster_id })
    }

    /// Ids of the clusters that take part in tree building, i.e. all
    /// non-blacklisted clusters, in ascending order.
    pub fn tree_cluster_ids(&self) -> Vec<ClusterId> {
        self.clustering_results
            .values()
            .filter(|cluster| !cluster.blacklisted())
            .map(|cluster| cluster.cluster_id())
            .collect()
    }

    /// Number of distinct timepoints across the patient's samples.
    pub fn n_distinct_timepoints(&self) -> usize {
        self.sample_list
            .iter()
            .map(|s| s.timepoint())
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }

    pub fn top_tree(&self) -> Option<&Tree> {
        self.top_tree.as_ref()
    }

    pub fn set_top_tree(&mut self, tree: Tree) {
        self.top_tree = Some(tree);
    }

    pub fn tree_ensemble(&self) -> Option<&Trace> {
        self.tree_ensemble.as_ref()
    }

    pub fn set_tree_ensemble(&mut self, trace: Trace) {
        self.tree_ensemble = Some(trace);
    }
}
