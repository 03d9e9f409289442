use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::errors::Error;
use crate::io::{ccf_headers, column_index, tsv_reader};
use crate::model::{CcfDensity, Mutation, MutationKey, Patient};

/// Load the per-mutation CCF table (one row per mutation and sample) and
/// attach the mutations to their assigned clusters, keyed by the composite
/// (variant string, cluster id). Every mutation has to come with a posterior
/// for every sample of the patient.
pub fn load_mutation_ccfs(path: &Path, patient: &mut Patient) -> Result<()> {
    let mut reader = tsv_reader(path)?;
    let headers = reader.headers()?.clone();
    let sample_col = column_index(&headers, "Sample_ID", path)?;
    let gene_col = column_index(&headers, "Hugo_Symbol", path)?;
    let chrom_col = column_index(&headers, "Chromosome", path)?;
    let pos_col = column_index(&headers, "Start_position", path)?;
    let ref_col = column_index(&headers, "Reference_Allele", path)?;
    let alt_col = column_index(&headers, "Tumor_Seq_Allele", path)?;
    let cluster_col = column_index(&headers, "Cluster_Assignment", path)?;
    let ccf_cols = ccf_headers()
        .iter()
        .map(|name| column_index(&headers, name, path))
        .collect::<Result<Vec<usize>>>()?;

    let n_samples = patient.n_samples();
    let mut densities: BTreeMap<MutationKey, Vec<Option<CcfDensity>>> = BTreeMap::new();

    for record in reader.records() {
        let record = record?;
        let var_str = format!(
            "{}:{}:{}>{}",
            &record[chrom_col], &record[pos_col], &record[ref_col], &record[alt_col]
        );
        let cluster_id = record[cluster_col]
            .parse()
            .with_context(|| format!("invalid cluster assignment for {}", var_str))?;
        let sample_idx = patient.sample_idx(&record[sample_col])?;
        let masses = ccf_cols
            .iter()
            .map(|&col| record[col].parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .with_context(|| format!("invalid CCF posterior for mutation {}", var_str))?;
        let mutation = Mutation::new(
            var_str,
            Some(record[gene_col].to_owned()),
            cluster_id,
            CcfDensity::from_linear(&masses)?,
        );
        if let Some(gene) = mutation.gene() {
            if patient.driver_genes().contains(gene) {
                info!("driver mutation {} ({})", mutation.var_str(), gene);
            }
        }
        densities
            .entry(mutation.key())
            .or_insert_with(|| vec![None; n_samples])[sample_idx] =
            Some(mutation.ccf_1d().clone());
    }

    for (key, per_sample) in densities {
        let complete = per_sample
            .into_iter()
            .enumerate()
            .map(|(sample_idx, density)| {
                density.ok_or_else(|| Error::MissingMutationDensity {
                    var_str: key.var_str.clone(),
                    sample: patient.sample_list()[sample_idx].sample_name().clone(),
                })
            })
            .collect::<std::result::Result<Vec<CcfDensity>, Error>>()?;
        patient
            .cluster_mut(key.cluster_id)?
            .add_mutation(key, complete)?;
    }
    Ok(())
}
