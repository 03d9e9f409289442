// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::BTreeMap;

use getset::CopyGetters;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusty_machine::learning::lin_reg::LinRegressor;
use rusty_machine::learning::SupModel;
use rusty_machine::linalg::{Matrix, Vector};
use serde_derive::Serialize;

use crate::errors::{Error, Result};
use crate::inference::cell_population::ConstrainedCcf;
use crate::model::{ClusterId, Patient};
use crate::utils::summarize_draws;

/// Cell fractions are floored at half a grid bin before taking logs, so a
/// clone that vanished at a timepoint yields a strongly negative but finite
/// growth observation.
const MIN_CELL_FRACTION: f64 = 0.005;

/// Fits per-clone growth rates across the patient's timepoints: for each
/// bootstrap resample, one constrained CCF draw per sample is purity-adjusted
/// and log cell fraction is regressed on timepoint; the slope distribution
/// over resamples yields the rate estimate and its interval.
pub struct GrowthKineticsEngine<'a> {
    patient: &'a Patient,
    rng: StdRng,
}

impl<'a> GrowthKineticsEngine<'a> {
    pub fn new(patient: &'a Patient, seed: u64) -> Self {
        GrowthKineticsEngine {
            patient,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Estimate a growth rate per cluster with `n_iter` bootstrap resamples
    /// of the constrained CCF draws.
    pub fn estimate_growth_rate(
        &mut self,
        constrained: &ConstrainedCcf,
        n_iter: usize,
    ) -> Result<BTreeMap<ClusterId, GrowthRate>> {
        let found = self.patient.n_distinct_timepoints();
        if found < 2 {
            return Err(Error::InsufficientTimepoints { found });
        }

        let samples = self.patient.sample_list();
        let mut rates = BTreeMap::new();
        for (&cluster_id, per_sample_draws) in constrained.cluster_draws() {
            let mut slopes = Vec::with_capacity(n_iter);
            for _ in 0..n_iter {
                let mut times = Vec::with_capacity(samples.len());
                let mut log_fractions = Vec::with_capacity(samples.len());
                for (sample_idx, sample) in samples.iter().enumerate() {
                    let draws = &per_sample_draws[sample_idx];
                    if draws.is_empty() {
                        continue;
                    }
                    let ccf = draws[self.rng.gen_range(0..draws.len())];
                    let fraction = (ccf * sample.purity()).max(MIN_CELL_FRACTION);
                    times.push(sample.timepoint().into_inner());
                    log_fractions.push(fraction.ln());
                }
                if times.len() < 2 {
                    continue;
                }
                let inputs = Matrix::new(times.len(), 1, times);
                let targets = Vector::new(log_fractions);
                let mut model = LinRegressor::default();
                if model.train(&inputs, &targets).is_err() {
                    // degenerate resample (singular design), skip it
                    continue;
                }
                if let Some(params) = model.parameters() {
                    slopes.push(params[1]);
                }
            }
            if slopes.is_empty() {
                return Err(Error::DegenerateGrowthFit { cluster_id });
            }
            let (rate, low, high) = summarize_draws(&slopes);
            debug!(
                "cluster {}: growth rate {:.4} [{:.4}, {:.4}] from {} resamples",
                cluster_id,
                rate,
                low,
                high,
                slopes.len()
            );
            rates.insert(
                cluster_id,
                GrowthRate {
                    rate,
                    low,
                    high,
                    n_resamples: slopes.len(),
                },
            );
        }
        Ok(rates)
    }
}

/// Per-clone exponential growth rate (slope of log cell fraction over the
/// timepoint axis) with a central 95% bootstrap interval.
#[derive(Clone, Copy, Debug, PartialEq, CopyGetters, Serialize)]
#[getset(get_copy = "pub")]
pub struct GrowthRate {
    rate: f64,
    low: f64,
    high: f64,
    n_resamples: usize,
}
