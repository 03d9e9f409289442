// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::ClusterId;
use crate::tree::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("invalid tree: {msg}")]
    InvalidTree { msg: String },
    #[error("no viable tree: every sampled topology violates the sum rule in at least one sample")]
    NoViableTree,
    #[error("growth kinetics requires at least two distinct timepoints, found {found}")]
    InsufficientTimepoints { found: usize },
    #[error("invalid edge list token {token:?}, expected <parent>-<child> with numeric node ids")]
    InvalidEdgeList { token: String },
    #[error("cluster {cluster_id} is not part of the clustering results")]
    UnknownCluster { cluster_id: ClusterId },
    #[error("cluster id {node} is reserved for the synthetic root")]
    ReservedClusterId { node: NodeId },
    #[error("sample {sample} is not part of the patient")]
    UnknownSample { sample: String },
    #[error("sample {sample} has been added twice")]
    DuplicateSample { sample: String },
    #[error("invalid purity {purity} for sample {sample}, must be in (0,1]")]
    InvalidPurity { sample: String, purity: f64 },
    #[error("invalid timepoint for sample {sample}, must be a finite number")]
    InvalidTimepoint { sample: String },
    #[error("CCF density must provide {expected} grid values, got {found}")]
    InvalidDensity { expected: usize, found: usize },
    #[error("CCF density carries no mass")]
    EmptyDensity,
    #[error("missing required column {name} in {path}")]
    MissingColumn { name: String, path: PathBuf },
    #[error("mutation {var_str} in sample {sample} lacks a CCF posterior")]
    MissingMutationDensity { var_str: String, sample: String },
    #[error("no tree has been assigned to patient {patient}")]
    MissingTopTree { patient: String },
    #[error("growth rate fit failed for cluster {cluster_id}: every bootstrap regression was degenerate")]
    DegenerateGrowthFit { cluster_id: ClusterId },
}

pub(crate) fn invalid_tree(msg: impl Into<String>) -> Error {
    Error::InvalidTree { msg: msg.into() }
}
