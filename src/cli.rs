// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use structopt::StructOpt;

use crate::errors::Error;
use crate::inference::{BuildTreeEngineBuilder, CellPopulationEngine, GrowthKineticsEngine};
use crate::io;
use crate::io::report;
use crate::model::Patient;
use crate::tree::Tree;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "phyloclone",
    about = "Reconstruction of clonal evolution from multi-sample cancer cell fraction posteriors."
)]
pub enum Phyloclone {
    #[structopt(
        name = "build-tree",
        about = "Sample phylogenetic trees over mutation clusters, reconcile CCF posteriors \
                 against the top tree and derive per-clone cell abundances."
    )]
    BuildTree {
        #[structopt(long, help = "Patient identifier used in all output tables.")]
        indiv_id: String,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Sample information file (sample_id, purity, timepoint; tab-separated)."
        )]
        sif: PathBuf,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Per-cluster CCF posterior table from the clustering step."
        )]
        cluster_ccf: PathBuf,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Per-mutation CCF posterior table from the clustering step."
        )]
        mutation_ccf: PathBuf,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Optional list of driver genes, one symbol per line."
        )]
        driver_genes: Option<PathBuf>,
        #[structopt(long, default_value = "250", help = "Number of MCMC iterations.")]
        n_iter: usize,
        #[structopt(long, default_value = "1", help = "Number of independent MCMC chains.")]
        n_chains: usize,
        #[structopt(
            long,
            default_value = "0.1",
            help = "Fraction of each chain discarded as burn-in."
        )]
        burn_in: f64,
        #[structopt(long, default_value = "42", help = "Seed for all random draws.")]
        seed: u64,
        #[structopt(
            long,
            default_value = ".",
            parse(from_os_str),
            help = "Directory the output tables are written to."
        )]
        output_dir: PathBuf,
    },
    #[structopt(
        name = "growth-kinetics",
        about = "Estimate per-clone growth rates across timepoints, given a previously built tree."
    )]
    GrowthKinetics {
        #[structopt(long, help = "Patient identifier used in all output tables.")]
        indiv_id: String,
        #[structopt(long, parse(from_os_str))]
        sif: PathBuf,
        #[structopt(long, parse(from_os_str))]
        cluster_ccf: PathBuf,
        #[structopt(long, parse(from_os_str))]
        mutation_ccf: PathBuf,
        #[structopt(
            long,
            parse(from_os_str),
            help = "Tree TSV written by build-tree; its top-ranked tree is used."
        )]
        tree_tsv: PathBuf,
        #[structopt(long, default_value = "250", help = "Number of bootstrap resamples.")]
        n_iter: usize,
        #[structopt(long, default_value = "42", help = "Seed for all random draws.")]
        seed: u64,
        #[structopt(long, default_value = ".", parse(from_os_str))]
        output_dir: PathBuf,
    },
}

pub fn run(opt: Phyloclone) -> Result<()> {
    match opt {
        Phyloclone::BuildTree {
            indiv_id,
            sif,
            cluster_ccf,
            mutation_ccf,
            driver_genes,
            n_iter,
            n_chains,
            burn_in,
            seed,
            output_dir,
        } => run_build_tree(
            &indiv_id,
            &sif,
            &cluster_ccf,
            &mutation_ccf,
            driver_genes.as_deref(),
            n_iter,
            n_chains,
            burn_in,
            seed,
            &output_dir,
        ),
        Phyloclone::GrowthKinetics {
            indiv_id,
            sif,
            cluster_ccf,
            mutation_ccf,
            tree_tsv,
            n_iter,
            seed,
            output_dir,
        } => run_growth_kinetics(
            &indiv_id,
            &sif,
            &cluster_ccf,
            &mutation_ccf,
            &tree_tsv,
            n_iter,
            seed,
            &output_dir,
        ),
    }
}

fn load_patient(
    indiv_id: &str,
    sif: &Path,
    cluster_ccf: &Path,
    mutation_ccf: &Path,
    driver_genes: Option<&Path>,
) -> Result<Patient> {
    let driver_genes: HashSet<String> = match driver_genes {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?
            .lines()
            .map(|line| line.trim().to_owned())
            .filter(|line| !line.is_empty())
            .collect(),
        None => HashSet::new(),
    };
    let mut patient = Patient::new(indiv_id, driver_genes);
    io::load_sample_info(sif, &mut patient)?;
    io::load_clustering_results(cluster_ccf, &mut patient)?;
    io::load_mutation_ccfs(mutation_ccf, &mut patient)?;
    Ok(patient)
}

#[allow(clippy::too_many_arguments)]
fn run_build_tree(
    indiv_id: &str,
    sif: &Path,
    cluster_ccf: &Path,
    mutation_ccf: &Path,
    driver_genes: Option<&Path>,
    n_iter: usize,
    n_chains: usize,
    burn_in: f64,
    seed: u64,
    output_dir: &Path,
) -> Result<()> {
    let mut patient = load_patient(indiv_id, sif, cluster_ccf, mutation_ccf, driver_genes)?;

    let (top_tree, trace, ranked, ancestry) = {
        let mut engine = BuildTreeEngineBuilder::default()
            .patient(&patient)
            .seed(seed)
            .n_chains(n_chains)
            .burn_in_fraction(burn_in)
            .build()?;
        engine.build_tree(n_iter)?;
        if !engine.is_viable() {
            return Err(Error::NoViableTree.into());
        }
        (
            engine
                .top_tree()
                .expect("bug: viable run without top tree")
                .clone(),
            engine.mcmc_trace().clone(),
            engine.ranked_trees(),
            engine.get_cell_ancestry(),
        )
    };
    patient.set_top_tree(top_tree);
    patient.set_tree_ensemble(trace);

    let mut cp_engine = CellPopulationEngine::new(&patient, seed);
    let constrained = cp_engine.compute_constrained_ccf(n_iter)?;
    let abundance = cp_engine.get_cell_abundance(&constrained)?;

    report::write_tree_tsv(&ranked, &output_dir.join(format!("{}_build_tree_posteriors.tsv", indiv_id)))?;
    report::write_constrained_ccf_tsv(
        &patient,
        &constrained,
        &ancestry,
        &output_dir.join(format!("{}_constrained_ccf.tsv", indiv_id)),
    )?;
    report::write_cell_abundance_tsv(
        &patient,
        &abundance,
        &output_dir.join(format!("{}_cell_abundances.tsv", indiv_id)),
    )?;
    info!("build-tree finished for patient {}", indiv_id);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_growth_kinetics(
    indiv_id: &str,
    sif: &Path,
    cluster_ccf: &Path,
    mutation_ccf: &Path,
    tree_tsv: &Path,
    n_iter: usize,
    seed: u64,
    output_dir: &Path,
) -> Result<()> {
    let mut patient = load_patient(indiv_id, sif, cluster_ccf, mutation_ccf, None)?;

    let edges = report::load_tree_edges(tree_tsv)?;
    let mut tree = Tree::from_clustering(patient.tree_cluster_ids())?;
    tree.set_new_edges(&edges)?;
    patient.set_top_tree(tree);

    let mut cp_engine = CellPopulationEngine::new(&patient, seed);
    let constrained = cp_engine.compute_constrained_ccf(n_iter)?;
    let mut gk_engine = GrowthKineticsEngine::new(&patient, seed);
    let rates = gk_engine.estimate_growth_rate(&constrained, n_iter)?;

    report::write_growth_rate_tsv(
        &patient,
        &rates,
        &output_dir.join(format!("{}_growth_rates.tsv", indiv_id)),
    )?;
    info!("growth-kinetics finished for patient {}", indiv_id);
    Ok(())
}
