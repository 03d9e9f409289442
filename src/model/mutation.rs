// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;

use getset::Getters;
use serde_derive::Serialize;

use crate::model::{CcfDensity, ClusterId};

/// Stable composite key of a mutation: its variant string together with the
/// cluster it has been assigned to. Used wherever mutations are indexed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MutationKey {
    pub var_str: String,
    pub cluster_id: ClusterId,
}

impl MutationKey {
    pub fn new(var_str: impl Into<String>, cluster_id: ClusterId) -> Self {
        MutationKey {
            var_str: var_str.into(),
            cluster_id,
        }
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.var_str, self.cluster_id)
    }
}

/// A somatic mutation as observed in one sample: variant identity, cluster
/// assignment and the 1-D CCF posterior in that sample.
#[derive(Clone, Debug, Getters)]
pub struct Mutation {
    /// Variant string `chrom:pos:ref>alt`.
    #[getset(get = "pub")]
    var_str: String,
    #[getset(get = "pub")]
    gene: Option<String>,
    cluster_assignment: ClusterId,
    #[getset(get = "pub")]
    ccf_1d: CcfDensity,
}

impl Mutation {
    pub fn new(
        var_str: impl Into<String>,
        gene: Option<String>,
        cluster_assignment: ClusterId,
        ccf_1d: CcfDensity,
    ) -> Self {
        Mutation {
            var_str: var_str.into(),
            gene,
            cluster_assignment,
            ccf_1d,
        }
    }

    pub fn key(&self) -> MutationKey {
        MutationKey::new(self.var_str.clone(), self.cluster_assignment)
    }
}
