// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use getset::{CopyGetters, Getters};
use ordered_float::NotNan;

use crate::errors::{Error, Result};

/// One sequenced sample of a patient. Immutable after loading.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct Sample {
    #[getset(get = "pub")]
    sample_name: String,
    /// Position of the sample on the patient's timeline (e.g. days since
    /// diagnosis). Ordered, not necessarily unique across samples.
    #[getset(get_copy = "pub")]
    timepoint: NotNan<f64>,
    /// Tumor purity of the sample.
    #[getset(get_copy = "pub")]
    purity: f64,
}

impl Sample {
    pub fn new(sample_name: impl Into<String>, timepoint: f64, purity: f64) -> Result<Self> {
        let sample_name = sample_name.into();
        if !(purity > 0.0 && purity <= 1.0) {
            return Err(Error::InvalidPurity {
                sample: sample_name,
                purity,
            });
        }
        let timepoint = NotNan::new(timepoint).map_err(|_| Error::InvalidTimepoint {
            sample: sample_name.clone(),
        })?;
        Ok(Sample {
            sample_name,
            timepoint,
            purity,
        })
    }
}
