use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::inference::{CellAncestry, ConstrainedCcf, GrowthRate, RankedTree};
use crate::io::{column_index, tsv_reader, tsv_writer};
use crate::model::{ClusterId, Patient};
use crate::tree::{parse_edge_string, NodeId};

/// Write the ranked tree ensemble. The `edges` column is the textual
/// encoding understood by [`load_tree_edges`], so a tree can be re-hydrated
/// later instead of re-running the sampler.
pub fn write_tree_tsv(ranked: &[RankedTree], path: &Path) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(&["n", "log_likelihood", "posterior_count", "edges"])?;
    for (rank, tree) in ranked.iter().enumerate() {
        writer.write_record(&[
            (rank + 1).to_string(),
            format!("{:.6}", *tree.log_likelihood()),
            tree.posterior_count().to_string(),
            tree.tree().to_edge_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read back the edge list of the top-ranked tree from a tree TSV.
pub fn load_tree_edges(path: &Path) -> Result<Vec<(NodeId, NodeId)>> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers()?.clone();
    let edges_col = column_index(&headers, "edges", path)?;
    let record = reader
        .records()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no trees in {}", path.display()))?
        .with_context(|| format!("unable to read {}", path.display()))?;
    Ok(parse_edge_string(&record[edges_col])?)
}

pub fn write_constrained_ccf_tsv(
    patient: &Patient,
    constrained: &ConstrainedCcf,
    ancestry: &BTreeMap<ClusterId, CellAncestry>,
    path: &Path,
) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(&[
        "Patient_ID",
        "Sample_ID",
        "Mutation",
        "Cluster_Assignment",
        "constrained_ccf_mean",
        "constrained_ccf_low",
        "constrained_ccf_high",
        "cluster_ancestry",
    ])?;
    for (key, summaries) in constrained.mutations() {
        let ancestry_str = ancestry
            .get(&key.cluster_id)
            .map(|cell| cell.ancestors().iter().join("-"))
            .unwrap_or_default();
        for (sample, summary) in patient.sample_list().iter().zip(summaries) {
            writer.write_record(&[
                patient.name().clone(),
                sample.sample_name().clone(),
                key.var_str.clone(),
                key.cluster_id.to_string(),
                format!("{:.4}", summary.mean()),
                format!("{:.4}", summary.low()),
                format!("{:.4}", summary.high()),
                ancestry_str.clone(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_cell_abundance_tsv(
    patient: &Patient,
    abundance: &BTreeMap<ClusterId, Vec<f64>>,
    path: &Path,
) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(&["Patient_ID", "Sample_ID", "Cluster_ID", "cell_abundance"])?;
    for (cluster_id, values) in abundance {
        for (sample, value) in patient.sample_list().iter().zip(values) {
            writer.write_record(&[
                patient.name().clone(),
                sample.sample_name().clone(),
                cluster_id.to_string(),
                format!("{:.4}", value),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_growth_rate_tsv(
    patient: &Patient,
    rates: &BTreeMap<ClusterId, GrowthRate>,
    path: &Path,
) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(&[
        "Patient_ID",
        "Cluster_ID",
        "growth_rate",
        "ci_low",
        "ci_high",
        "n_resamples",
    ])?;
    for (cluster_id, rate) in rates {
        writer.write_record(&[
            patient.name().clone(),
            cluster_id.to_string(),
            format!("{:.6}", rate.rate()),
            format!("{:.6}", rate.low()),
            format!("{:.6}", rate.high()),
            rate.n_resamples().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
