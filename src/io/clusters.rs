use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::io::{ccf_headers, column_index, tsv_reader};
use crate::model::{Cluster, ClusterId, Patient};

/// Load the per-cluster CCF table (one row per cluster and sample, 101
/// posterior columns) and install the clustering results on the patient.
/// Blacklist status is set once all rows are in.
pub fn load_clustering_results(path: &Path, patient: &mut Patient) -> Result<()> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers()?.clone();
    let sample_col = column_index(&headers, "Sample_ID", path)?;
    let cluster_col = column_index(&headers, "Cluster_ID", path)?;
    let ccf_cols = ccf_headers()
        .iter()
        .map(|name| column_index(&headers, name, path))
        .collect::<Result<Vec<usize>>>()?;

    let sample_names: Vec<String> = patient
        .sample_list()
        .iter()
        .map(|sample| sample.sample_name().clone())
        .collect();

    let mut clusters: BTreeMap<ClusterId, Cluster> = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let sample_id = &record[sample_col];
        let cluster_id: ClusterId = record[cluster_col]
            .parse()
            .with_context(|| format!("invalid cluster id {:?} in {}", &record[cluster_col], path.display()))?;
        let masses = ccf_cols
            .iter()
            .map(|&col| record[col].parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .with_context(|| {
                format!(
                    "invalid CCF posterior for cluster {} in {}",
                    cluster_id,
                    path.display()
                )
            })?;
        clusters
            .entry(cluster_id)
            .or_insert_with(|| {
                debug!("added cluster {}", cluster_id);
                Cluster::new(cluster_id, sample_names.clone())
            })
            .add_sample_density(sample_id, &masses)?;
    }
    for cluster in clusters.values_mut() {
        cluster.set_blacklist_status();
    }
    patient.set_clustering_results(clusters)?;
    Ok(())
}
