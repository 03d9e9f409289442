// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use bio::stats::LogProb;
use rand::Rng;

use crate::errors::{Error, Result};
use crate::model::{grid_value, GRID_SIZE};
use crate::utils::NUMERICAL_EPSILON;

/// A truncated feasible range counts as empty once its remaining mass drops
/// below this natural-log threshold (ln of 1e-12).
const EMPTY_RANGE_LN: f64 = -27.631021115928547;

/// A discretized CCF posterior over the fixed grid, held in log space and
/// normalized to total mass one.
#[derive(Clone, Debug, PartialEq)]
pub struct CcfDensity {
    bins: Vec<LogProb>,
}

impl CcfDensity {
    /// Build a density from linear per-bin masses and renormalize. Zero-mass
    /// bins stay at `ln_zero`; no floor is applied, so impossible
    /// configurations keep their genuine zero probability downstream. A
    /// density without any mass is rejected.
    pub fn from_linear(masses: &[f64]) -> Result<Self> {
        if masses.len() != GRID_SIZE {
            return Err(Error::InvalidDensity {
                expected: GRID_SIZE,
                found: masses.len(),
            });
        }
        if masses.iter().all(|&m| m <= 0.0) {
            return Err(Error::EmptyDensity);
        }
        // negative masses would produce NaN in log space
        let bins = masses.iter().map(|&m| LogProb(m.max(0.0).ln())).collect();
        let mut density = CcfDensity { bins };
        density.normalize();
        Ok(density)
    }

    /// The uniform density over the grid.
    pub fn uniform() -> Self {
        CcfDensity {
            bins: vec![LogProb((1.0 / GRID_SIZE as f64).ln()); GRID_SIZE],
        }
    }

    /// A density with all mass in a single bin.
    pub fn point_mass(index: usize) -> Self {
        let mut masses = vec![0.0; GRID_SIZE];
        masses[index.min(GRID_SIZE - 1)] = 1.0;
        CcfDensity::from_linear(&masses).expect("bug: grid-sized mass vector")
    }

    fn normalize(&mut self) {
        let total = LogProb::ln_sum_exp(&self.bins);
        for bin in &mut self.bins {
            *bin = LogProb(**bin - *total);
        }
    }

    pub fn bins(&self) -> &[LogProb] {
        &self.bins
    }

    /// Aggregate member densities into one clone density: the normalized
    /// log-space product, treating each member histogram as an independent
    /// likelihood of the same underlying clone CCF. Without members, or if
    /// the members' supports are contradictory (empty product), the uniform
    /// density is returned.
    pub fn ln_product<'a>(densities: impl IntoIterator<Item = &'a CcfDensity>) -> CcfDensity {
        let mut bins = vec![LogProb::ln_one(); GRID_SIZE];
        let mut any = false;
        for density in densities {
            any = true;
            for (bin, other) in bins.iter_mut().zip(density.bins.iter()) {
                *bin = LogProb(**bin + **other);
            }
        }
        if !any || *LogProb::ln_sum_exp(&bins) == f64::NEG_INFINITY {
            return CcfDensity::uniform();
        }
        let mut density = CcfDensity { bins };
        density.normalize();
        density
    }

    /// Posterior mean CCF.
    pub fn expected_ccf(&self) -> f64 {
        self.bins
            .iter()
            .enumerate()
            .map(|(i, bin)| bin.exp() * grid_value(i))
            .sum()
    }

    /// Complementary CDF: entry `i` is `ln P(X >= grid_value(i))`.
    pub fn ccdf(&self) -> Vec<LogProb> {
        let mut ccdf = vec![LogProb::ln_zero(); GRID_SIZE];
        let mut acc = LogProb::ln_zero();
        for i in (0..GRID_SIZE).rev() {
            acc = acc.ln_add_exp(self.bins[i]);
            ccdf[i] = acc.cap_numerical_overshoot(NUMERICAL_EPSILON);
        }
        ccdf
    }

    /// Restrict the density to grid indices `0..=max_index` and renormalize.
    /// Returns `None` if no real mass is left below the bound, i.e. the
    /// feasible range is empty.
    pub fn truncate_upper(&self, max_index: usize) -> Option<CcfDensity> {
        let max_index = max_index.min(GRID_SIZE - 1);
        let feasible = LogProb::ln_sum_exp(&self.bins[..=max_index]);
        if *feasible < EMPTY_RANGE_LN {
            return None;
        }
        let bins = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, bin)| {
                if i <= max_index {
                    LogProb(**bin - *feasible)
                } else {
                    LogProb::ln_zero()
                }
            })
            .collect();
        Some(CcfDensity { bins })
    }

    /// Draw a grid index by inversion sampling. If rounding leaves residual
    /// probability at the end of the scan, the draw falls back to the last
    /// bin carrying mass, so truncation bounds are always respected.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        let u: f64 = rng.gen();
        let mut acc = 0.0;
        let mut last_support = 0;
        for (i, bin) in self.bins.iter().enumerate() {
            let mass = bin.exp();
            if mass > 0.0 {
                last_support = i;
            }
            acc += mass;
            if u <= acc {
                return i;
            }
        }
        last_support
    }

    /// Convolve with another density, yielding the distribution of the sum of
    /// the two CCFs.
    pub fn convolve(&self, other: &CcfDensity) -> SumDensity {
        SumDensity::identity().convolve(self).convolve(other)
    }
}

/// Distribution of a sum of independent CCFs: grid bins up to 1.0 plus one
/// overflow bucket for mass beyond the grid. Overflow mass can never be
/// dominated by a parent CCF and thus scores zero in the sum rule.
#[derive(Clone, Debug)]
pub struct SumDensity {
    bins: Vec<LogProb>,
    overflow: LogProb,
}

impl SumDensity {
    /// Point mass at zero, the neutral element of convolution.
    pub fn identity() -> Self {
        let mut bins = vec![LogProb::ln_zero(); GRID_SIZE];
        bins[0] = LogProb::ln_one();
        SumDensity {
            bins,
            overflow: LogProb::ln_zero(),
        }
    }

    pub fn convolve(&self, density: &CcfDensity) -> SumDensity {
        let mut bins = vec![LogProb::ln_zero(); GRID_SIZE];
        // Mass that has already left the grid stays there.
        let mut overflow = self.overflow;
        for (i, a) in self.bins.iter().enumerate() {
            if **a == f64::NEG_INFINITY {
                continue;
            }
            for (j, b) in density.bins.iter().enumerate() {
                if **b == f64::NEG_INFINITY {
                    continue;
                }
                let term = LogProb(**a + **b);
                let k = i + j;
                if k < GRID_SIZE {
                    bins[k] = bins[k].ln_add_exp(term);
                } else {
                    overflow = overflow.ln_add_exp(term);
                }
            }
        }
        SumDensity { bins, overflow }
    }

    pub fn overflow(&self) -> LogProb {
        self.overflow
    }

    /// `ln P(parent >= sum)` given the parent's complementary CDF over the
    /// grid.
    pub fn ln_prob_dominated_by(&self, parent_ccdf: &[LogProb]) -> LogProb {
        let terms: Vec<LogProb> = self
            .bins
            .iter()
            .zip(parent_ccdf.iter())
            .map(|(sum_bin, ccdf)| LogProb(**sum_bin + **ccdf))
            .collect();
        LogProb::ln_sum_exp(&terms).cap_numerical_overshoot(NUMERICAL_EPSILON)
    }
}
