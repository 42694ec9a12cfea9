use std::path::PathBuf;
use std::sync::Arc;
use lazy_static::lazy_static;
use std::collections::HashMap;
use log::LevelFilter;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::cli::Arguments;
use crate::config::ResolvedInput;

// External software
pub const GZIP_EXT: &str = "gz";
pub const FASTQC_TAG: &str = "fastqc";
pub const FASTP_TAG: &str = "fastp";
pub const SENDSKETCH_TAG: &str = "sendsketch.sh";
pub const ARIBA_TAG: &str = "ariba";
pub const MLST_TAG: &str = "mlst";
pub const ABRICATE_TAG: &str = "abricate";
pub const SNIPPY_TAG: &str = "snippy";
pub const SNIPPY_CORE_TAG: &str = "snippy-core";
pub const SNP_SITES_TAG: &str = "snp-sites";
pub const IQTREE_TAG: &str = "iqtree";
pub const SENDMAIL_TAG: &str = "sendmail";
pub const MAIL_TAG: &str = "mail";

lazy_static! {
    /// Minimum versions the pipeline has been exercised against.
    pub static ref TOOL_VERSIONS: HashMap<&'static str, f32> = {
        let mut m = HashMap::new();
        m.insert(FASTQC_TAG, 0.11);
        m.insert(FASTP_TAG, 0.23);
        m.insert(SENDSKETCH_TAG, 38.9);
        m.insert(ARIBA_TAG, 2.14);
        m.insert(MLST_TAG, 2.23);
        m.insert(ABRICATE_TAG, 1.0);
        m.insert(SNIPPY_TAG, 4.6);
        m.insert(SNP_SITES_TAG, 2.5);
        m.insert(IQTREE_TAG, 2.2);

        m
    };
}

// Static filenames
pub const CORE_FULL_ALN: &str = "core.full.aln";
pub const CORE_SNPS_ALN: &str = "core.snps.aln";
pub const SPECIES_TABLE: &str = "all_species_ids.tsv";
pub const RUN_SUMMARY_JSON: &str = "run_summary.json";
pub const SOFTWARE_VERSIONS_TSV: &str = "software_versions.tsv";

// Static parameters
pub const FASTP_MIN_LEN: usize = 50;
pub const IQTREE_MODEL: &str = "GTR+G";

pub const FASTA_EXTS: &[&'static str] = &["fasta", "fa", "fna"];
pub const FASTQ_EXTS: &[&'static str] = &["fastq", "fq"];

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No files matched pattern '{0}'")]
    EmptyChannel(String),

    #[error("No mate found for sample '{sample}' (expected suffixes '{fwd}'/'{rev}')")]
    UnpairedSample {
        sample: String,
        fwd: String,
        rev: String,
    },

    #[error("{tool} failed: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("Failed to spawn {tool}: {error}. Is it installed and on PATH?")]
    ToolSpawn { tool: String, error: String },

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Invalid output from {tool}: {error}")]
    InvalidToolOutput { tool: String, error: String },
}

pub struct RunConfig {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub args: Arguments,
    pub input: ResolvedInput,
    pub max_cores: usize,
    /// Bounds how many samples run their external tools at once.
    pub sample_semaphore: Arc<Semaphore>,
    pub log_level: LevelFilter,
}
