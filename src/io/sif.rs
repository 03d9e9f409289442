use std::path::Path;

use anyhow::{Context, Result};
use serde_derive::Deserialize;

use crate::io::tsv_reader;
use crate::model::{Patient, Sample};

/// One row of the sample information file. Columns beyond the ones named
/// here (e.g. maf and seg file paths) are ignored.
#[derive(Debug, Deserialize)]
struct SifRecord {
    sample_id: String,
    purity: f64,
    timepoint: f64,
}

/// Load the tab-separated sample information file and register its samples
/// with the patient, preserving file order.
pub fn load_sample_info(path: &Path, patient: &mut Patient) -> Result<()> {
    let mut reader = tsv_reader(path)?;
    for record in reader.deserialize() {
        let record: SifRecord =
            record.with_context(|| format!("invalid sample info record in {}", path.display()))?;
        debug!("adding sample {}", record.sample_id);
        patient.add_sample(Sample::new(
            record.sample_id,
            record.timepoint,
            record.purity,
        )?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    #[test]
    fn test_load_sample_info() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tmaf_fn\tseg_fn\tpurity\ttimepoint").unwrap();
        writeln!(file, "TP1\ttp1.maf\ttp1.seg\t0.9\t0.0").unwrap();
        writeln!(file, "TP2\ttp2.maf\ttp2.seg\t0.75\t120.0").unwrap();
        let mut patient = Patient::new("PT01", HashSet::new());
        load_sample_info(file.path(), &mut patient).unwrap();
        assert_eq!(patient.n_samples(), 2);
        assert_eq!(patient.sample_list()[1].purity(), 0.75);
        assert_eq!(*patient.sample_list()[1].timepoint(), 120.0);
    }

    #[test]
    fn test_invalid_purity_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tpurity\ttimepoint").unwrap();
        writeln!(file, "TP1\t1.5\t0.0").unwrap();
        let mut patient = Patient::new("PT01", HashSet::new());
        assert!(load_sample_info(file.path(), &mut patient).is_err());
    }
}
