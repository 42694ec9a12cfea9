// src/pipelines/phylogeny.rs: core alignment and tree inference

use std::path::{Path, PathBuf};

use log::info;

use crate::config::defs::{
    PipelineError, RunConfig, CORE_FULL_ALN, CORE_SNPS_ALN, IQTREE_TAG, SNIPPY_CORE_TAG,
    SNP_SITES_TAG,
};
use crate::utils::command::{iqtree, snippy_core, snp_sites};
use crate::utils::file::ensure_dir;
use crate::utils::streams::run_tool_to_completion;

/// Builds the whole-run phylogeny: merges the per-sample snippy alignments
/// with snippy-core, extracts SNP columns with snp-sites, and infers a tree
/// with iqtree. Caller guarantees at least two alignment directories.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `reference` - Resolved reference FASTA.
/// * `snippy_dirs` - Per-sample snippy output directories (fan-in).
///
/// # Returns
/// Path to the final treefile.
pub async fn run(
    config: &RunConfig,
    reference: &Path,
    snippy_dirs: &[PathBuf],
) -> Result<PathBuf, PipelineError> {
    let phylo_dir = config.out_dir.join("phylogeny");
    ensure_dir(&phylo_dir)?;

    info!(
        "Building core alignment from {} sample(s)",
        snippy_dirs.len()
    );
    let core_args = snippy_core::arg_generator(reference, snippy_dirs, "core");
    run_tool_to_completion(SNIPPY_CORE_TAG, &core_args, Some(&phylo_dir)).await?;

    let full_aln = phylo_dir.join(CORE_FULL_ALN);
    let snps_aln = phylo_dir.join(CORE_SNPS_ALN);
    let snp_args = snp_sites::arg_generator(&full_aln, &snps_aln);
    run_tool_to_completion(SNP_SITES_TAG, &snp_args, Some(&phylo_dir)).await?;

    let prefix = phylo_dir.join("core");
    let iqtree_args = iqtree::arg_generator(config, &snps_aln, &prefix);
    run_tool_to_completion(IQTREE_TAG, &iqtree_args, Some(&phylo_dir)).await?;

    let treefile = phylo_dir.join("core.treefile");
    if !treefile.exists() {
        return Err(PipelineError::InvalidToolOutput {
            tool: IQTREE_TAG.to_string(),
            error: format!("expected treefile missing: {}", treefile.display()),
        });
    }
    Ok(treefile)
}
