use std::path::Path;

use anyhow::Result;

use crate::errors::Error;

pub mod clusters;
pub mod mutations;
pub mod report;
pub mod sif;

pub use clusters::load_clustering_results;
pub use mutations::load_mutation_ccfs;
pub use sif::load_sample_info;

/// Names of the per-grid-point CCF posterior columns, `postDP_ccf_0.0`
/// through `postDP_ccf_1.0`. Multiples of ten carry one decimal, everything
/// else two, matching the upstream clustering output.
pub(crate) fn ccf_headers() -> Vec<String> {
    (0..crate::model::GRID_SIZE)
        .map(|i| {
            let value = i as f64 / 100.0;
            if i % 10 == 0 {
                format!("postDP_ccf_{:.1}", value)
            } else {
                format!("postDP_ccf_{:.2}", value)
            }
        })
        .collect()
}

/// Index of a required column in a header row.
pub(crate) fn column_index(
    headers: &csv::StringRecord,
    name: &str,
    path: &Path,
) -> Result<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| {
            Error::MissingColumn {
                name: name.to_owned(),
                path: path.to_owned(),
            }
            .into()
        })
}

pub(crate) fn tsv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    use anyhow::Context;
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("unable to read {}", path.display()))
}

pub(crate) fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    use anyhow::Context;
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("unable to write {}", path.display()))
}
