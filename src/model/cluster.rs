// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::BTreeMap;

use getset::CopyGetters;

use crate::errors::{Error, Result};
use crate::model::{CcfDensity, ClusterId, MutationKey};

/// A cluster's posterior-mean CCF has to reach this value in at least one
/// sample; otherwise the cluster is considered a germline-like or artifact
/// cluster and blacklisted from tree building.
const BLACKLIST_CCF_THRESHOLD: f64 = 0.1;

/// A mutation cluster (clone): per-sample aggregate CCF densities plus the
/// member mutations it was derived from. Densities are kept aligned with the
/// patient's sample order.
#[derive(Clone, Debug, CopyGetters)]
pub struct Cluster {
    #[getset(get_copy = "pub")]
    cluster_id: ClusterId,
    sample_names: Vec<String>,
    densities: Vec<Option<CcfDensity>>,
    #[getset(get_copy = "pub")]
    blacklisted: bool,
    mutations: BTreeMap<MutationKey, Vec<CcfDensity>>,
}

impl Cluster {
    pub fn new(cluster_id: ClusterId, sample_names: Vec<String>) -> Self {
        let n = sample_names.len();
        Cluster {
            cluster_id,
            sample_names,
            densities: vec![None; n],
            blacklisted: false,
            mutations: BTreeMap::new(),
        }
    }

    /// Record the cluster-level CCF density observed in the given sample.
    pub fn add_sample_density(&mut self, sample_name: &str, masses: &[f64]) -> Result<()> {
        let idx = self.sample_idx(sample_name)?;
        self.densities[idx] = Some(CcfDensity::from_linear(masses)?);
        Ok(())
    }

    /// Attach a member mutation with its per-sample densities (aligned with
    /// the patient's sample order).
    pub fn add_mutation(&mut self, key: MutationKey, densities: Vec<CcfDensity>) -> Result<()> {
        if densities.len() != self.sample_names.len() {
            return Err(Error::MissingMutationDensity {
                var_str: key.var_str,
                sample: self
                    .sample_names
                    .get(densities.len())
                    .cloned()
                    .unwrap_or_default(),
            });
        }
        self.mutations.insert(key, densities);
        Ok(())
    }

    pub fn mutations(&self) -> &BTreeMap<MutationKey, Vec<CcfDensity>> {
        &self.mutations
    }

    /// Aggregate density of the cluster in the given sample. Falls back to
    /// the uniform density if neither a cluster-level density was loaded nor
    /// members are known.
    pub fn density(&self, sample_idx: usize) -> CcfDensity {
        match &self.densities[sample_idx] {
            Some(density) => density.clone(),
            None => CcfDensity::ln_product(
                self.mutations
                    .values()
                    .filter_map(|densities| densities.get(sample_idx)),
            ),
        }
    }

    /// Re-derive all per-sample aggregate densities from the current members.
    /// Called whenever membership changes after load.
    pub fn recompute_density(&mut self) {
        for sample_idx in 0..self.sample_names.len() {
            self.densities[sample_idx] = Some(CcfDensity::ln_product(
                self.mutations
                    .values()
                    .filter_map(|densities| densities.get(sample_idx)),
            ));
        }
    }

    /// Blacklist clusters whose posterior-mean CCF stays below the threshold
    /// in every sample.
    pub fn set_blacklist_status(&mut self) {
        let n = self.sample_names.len();
        self.blacklisted = (0..n).all(|idx| self.density(idx).expected_ccf() < BLACKLIST_CCF_THRESHOLD);
        if self.blacklisted {
            warn!(
                "cluster {} is blacklisted from tree building: mean CCF < {} in all samples",
                self.cluster_id, BLACKLIST_CCF_THRESHOLD
            );
        }
    }

    fn sample_idx(&self, sample_name: &str) -> Result<usize> {
        self.sample_names
            .iter()
            .position(|name| name == sample_name)
            .ok_or_else(|| Error::UnknownSample {
                sample: sample_name.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{grid_value, GRID_SIZE};
    use approx::assert_relative_eq;

    fn gaussian_masses(mean: f64, sd: f64) -> Vec<f64> {
        (0..GRID_SIZE)
            .map(|i| {
                let x = grid_value(i);
                (-0.5 * ((x - mean) / sd).powi(2)).exp()
            })
            .collect()
    }

    fn two_sample_cluster(id: ClusterId) -> Cluster {
        Cluster::new(id, vec!["TP1".to_owned(), "TP2".to_owned()])
    }

    #[test]
    fn test_density_from_members() {
        let mut cluster = two_sample_cluster(1);
        let member = vec![
            CcfDensity::from_linear(&gaussian_masses(0.5, 0.05)).unwrap(),
            CcfDensity::from_linear(&gaussian_masses(0.4, 0.05)).unwrap(),
        ];
        cluster
            .add_mutation(MutationKey::new("1:100:A>T", 1), member)
            .unwrap();
        assert_relative_eq!(cluster.density(0).expected_ccf(), 0.5, epsilon = 1e-2);
        assert_relative_eq!(cluster.density(1).expected_ccf(), 0.4, epsilon = 1e-2);
    }

    #[test]
    fn test_recompute_density_follows_membership() {
        let mut cluster = two_sample_cluster(1);
        cluster
            .add_sample_density("TP1", &gaussian_masses(0.5, 0.05))
            .unwrap();
        cluster
            .add_sample_density("TP2", &gaussian_masses(0.5, 0.05))
            .unwrap();
        let member = vec![
            CcfDensity::from_linear(&gaussian_masses(0.8, 0.05)).unwrap(),
            CcfDensity::from_linear(&gaussian_masses(0.8, 0.05)).unwrap(),
        ];
        cluster
            .add_mutation(MutationKey::new("2:200:C>G", 1), member)
            .unwrap();
        // loaded table density still wins until membership is re-aggregated
        assert_relative_eq!(cluster.density(0).expected_ccf(), 0.5, epsilon = 1e-2);
        cluster.recompute_density();
        assert_relative_eq!(cluster.density(0).expected_ccf(), 0.8, epsilon = 1e-2);
    }

    #[test]
    fn test_blacklist_low_ccf() {
        let mut cluster = two_sample_cluster(4);
        cluster
            .add_sample_density("TP1", &gaussian_masses(0.02, 0.01))
            .unwrap();
        cluster
            .add_sample_density("TP2", &gaussian_masses(0.03, 0.01))
            .unwrap();
        cluster.set_blacklist_status();
        assert!(cluster.blacklisted());
    }

    #[test]
    fn test_no_blacklist_when_one_sample_is_high() {
        let mut cluster = two_sample_cluster(2);
        cluster
            .add_sample_density("TP1", &gaussian_masses(0.02, 0.01))
            .unwrap();
        cluster
            .add_sample_density("TP2", &gaussian_masses(0.6, 0.05))
            .unwrap();
        cluster.set_blacklist_status();
        assert!(!cluster.blacklisted());
    }

    #[test]
    fn test_unknown_sample() {
        let mut cluster = two_sample_cluster(1);
        assert!(matches!(
            cluster.add_sample_density("TP9", &gaussian_masses(0.5, 0.1)),
            Err(Error::UnknownSample { .. })
        ));
    }
}
