/// Functions and structs for building command-line arguments for the
/// wrapped tools. Each tool gets a nested module with an `arg_generator`
/// and, where the tool reports one, a presence/version check.

use std::collections::HashMap;

use anyhow::Result;
use log::warn;

use crate::config::defs::{
    ABRICATE_TAG, ARIBA_TAG, FASTP_TAG, FASTQC_TAG, IQTREE_TAG, MLST_TAG, SENDSKETCH_TAG,
    SNIPPY_CORE_TAG, SNIPPY_TAG, SNP_SITES_TAG, TOOL_VERSIONS,
};

pub mod fastqc {
    use std::path::{Path, PathBuf};
    use anyhow::{anyhow, Result};
    use crate::config::defs::FASTQC_TAG;
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    pub async fn fastqc_presence_check() -> Result<String> {
        let args = vec!["--version".to_string()];
        let mut child = spawn_tool(FASTQC_TAG, &args, None)?;
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from fastqc --version"))?;
        let version = first_line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| anyhow!("Invalid fastqc --version output: {}", first_line))?
            .trim_start_matches('v')
            .to_string();
        Ok(version)
    }

    pub fn arg_generator(inputs: &[PathBuf], out_dir: &Path, threads: usize) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-q".to_string());
        args_vec.push("-t".to_string());
        args_vec.push(threads.to_string());
        args_vec.push("-o".to_string());
        args_vec.push(out_dir.to_string_lossy().to_string());
        for input in inputs {
            args_vec.push(input.to_string_lossy().to_string());
        }
        args_vec
    }
}

pub mod fastp {
    use std::path::PathBuf;
    use anyhow::{anyhow, Result};
    use crate::config::defs::{RunConfig, FASTP_MIN_LEN, FASTP_TAG};
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    /// File bindings for one trimming invocation.
    pub struct FastpConfig {
        pub in1: PathBuf,
        pub in2: Option<PathBuf>,
        pub out1: PathBuf,
        pub out2: Option<PathBuf>,
        pub json_report: PathBuf,
        pub html_report: PathBuf,
    }

    pub async fn fastp_presence_check() -> Result<String> {
        let args = vec!["-v".to_string()];
        let mut child = spawn_tool(FASTP_TAG, &args, None)?;
        // fastp prints its version on stderr
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stderr).await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from fastp -v"))?;
        let version = first_line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| anyhow!("Invalid fastp -v output: {}", first_line))?
            .to_string();
        Ok(version)
    }

    pub fn arg_generator(config: &RunConfig, view: &FastpConfig) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("-i".to_string());
        args_vec.push(view.in1.to_string_lossy().to_string());
        args_vec.push("-o".to_string());
        args_vec.push(view.out1.to_string_lossy().to_string());
        if let (Some(in2), Some(out2)) = (&view.in2, &view.out2) {
            args_vec.push("-I".to_string());
            args_vec.push(in2.to_string_lossy().to_string());
            args_vec.push("-O".to_string());
            args_vec.push(out2.to_string_lossy().to_string());
            args_vec.push("--detect_adapter_for_pe".to_string());
        }
        args_vec.push("-q".to_string());
        args_vec.push(config.args.quality.to_string());
        args_vec.push("--length_required".to_string());
        args_vec.push(FASTP_MIN_LEN.to_string());
        args_vec.push("-w".to_string());
        args_vec.push(config.max_cores.min(16).to_string());
        args_vec.push("-j".to_string());
        args_vec.push(view.json_report.to_string_lossy().to_string());
        args_vec.push("-h".to_string());
        args_vec.push(view.html_report.to_string_lossy().to_string());
        args_vec
    }
}

pub mod sendsketch {
    use std::path::{Path, PathBuf};
    use anyhow::{anyhow, Result};
    use crate::config::defs::SENDSKETCH_TAG;
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    pub async fn sendsketch_presence_check() -> Result<String> {
        let args = vec!["--version".to_string()];
        let mut child = spawn_tool(SENDSKETCH_TAG, &args, None)?;
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stderr).await?;
        let version_line = lines
            .iter()
            .find(|l| l.contains("BBMap version"))
            .ok_or_else(|| anyhow!("No version in sendsketch.sh --version output"))?;
        let version = version_line
            .split_whitespace()
            .last()
            .ok_or_else(|| anyhow!("Invalid sendsketch version line: {}", version_line))?
            .to_string();
        Ok(version)
    }

    pub fn arg_generator(input: &PathBuf, out_tsv: &Path) -> Vec<String> {
        vec![
            format!("in={}", input.to_string_lossy()),
            format!("out={}", out_tsv.to_string_lossy()),
            "overwrite=t".to_string(),
            "format=3".to_string(),
        ]
    }
}

pub mod ariba {
    use std::path::{Path, PathBuf};
    use anyhow::{anyhow, Result};
    use crate::config::defs::ARIBA_TAG;
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    pub async fn ariba_presence_check() -> Result<String> {
        let args = vec!["version".to_string()];
        let mut child = spawn_tool(ARIBA_TAG, &args, None)?;
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        let first_line = lines
            .iter()
            .find(|l| l.starts_with("ARIBA version"))
            .ok_or_else(|| anyhow!("No output from ariba version"))?;
        let version = first_line
            .split_whitespace()
            .last()
            .ok_or_else(|| anyhow!("Invalid ariba version output: {}", first_line))?
            .to_string();
        Ok(version)
    }

    /// `ariba run <db> <reads1> <reads2> <outdir>`; single-end runs pass
    /// the one file twice, which ARIBA accepts for unpaired data.
    pub fn arg_generator(db_dir: &Path, reads: &[PathBuf], out_dir: &Path) -> Vec<String> {
        let mut args_vec = vec![
            "run".to_string(),
            "--force".to_string(),
            db_dir.to_string_lossy().to_string(),
        ];
        match reads {
            [r1] => {
                args_vec.push(r1.to_string_lossy().to_string());
                args_vec.push(r1.to_string_lossy().to_string());
            }
            _ => {
                for r in reads {
                    args_vec.push(r.to_string_lossy().to_string());
                }
            }
        }
        args_vec.push(out_dir.to_string_lossy().to_string());
        args_vec
    }
}

pub mod mlst {
    use std::path::{Path, PathBuf};
    use anyhow::{anyhow, Result};
    use crate::config::defs::MLST_TAG;
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    pub async fn mlst_presence_check() -> Result<String> {
        let args = vec!["--version".to_string()];
        let mut child = spawn_tool(MLST_TAG, &args, None)?;
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from mlst --version"))?;
        let version = first_line
            .split_whitespace()
            .last()
            .ok_or_else(|| anyhow!("Invalid mlst --version output: {}", first_line))?
            .to_string();
        Ok(version)
    }

    pub fn arg_generator(assembly: &PathBuf, blast_db: &Path, definitions: &Path) -> Vec<String> {
        vec![
            "--blastdb".to_string(),
            blast_db.to_string_lossy().to_string(),
            "--datadir".to_string(),
            definitions.to_string_lossy().to_string(),
            assembly.to_string_lossy().to_string(),
        ]
    }
}

pub mod abricate {
    use std::path::{Path, PathBuf};
    use anyhow::{anyhow, Result};
    use crate::config::defs::ABRICATE_TAG;
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    pub async fn abricate_presence_check() -> Result<String> {
        let args = vec!["--version".to_string()];
        let mut child = spawn_tool(ABRICATE_TAG, &args, None)?;
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from abricate --version"))?;
        let version = first_line
            .split_whitespace()
            .last()
            .ok_or_else(|| anyhow!("Invalid abricate --version output: {}", first_line))?
            .to_string();
        Ok(version)
    }

    pub fn arg_generator(assembly: &PathBuf, db_dir: &Path) -> Vec<String> {
        let db_name = db_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resfinder".to_string());
        let datadir = db_dir
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        vec![
            "--datadir".to_string(),
            datadir,
            "--db".to_string(),
            db_name,
            "--nopath".to_string(),
            assembly.to_string_lossy().to_string(),
        ]
    }
}

pub mod snippy {
    use std::path::{Path, PathBuf};
    use anyhow::{anyhow, Result};
    use crate::config::defs::{RunConfig, SNIPPY_TAG};
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    pub async fn snippy_presence_check() -> Result<String> {
        let args = vec!["--version".to_string()];
        let mut child = spawn_tool(SNIPPY_TAG, &args, None)?;
        // snippy reports "snippy X.Y.Z" on stderr
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stderr).await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from snippy --version"))?;
        let version = first_line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| anyhow!("Invalid snippy --version output: {}", first_line))?
            .to_string();
        Ok(version)
    }

    pub fn arg_generator(
        config: &RunConfig,
        reference: &Path,
        reads: &[PathBuf],
        out_dir: &Path,
    ) -> Vec<String> {
        let mut args_vec = vec![
            "--cpus".to_string(),
            config.max_cores.to_string(),
            "--outdir".to_string(),
            out_dir.to_string_lossy().to_string(),
            "--ref".to_string(),
            reference.to_string_lossy().to_string(),
            "--force".to_string(),
        ];
        match reads {
            [r1] => {
                args_vec.push("--se".to_string());
                args_vec.push(r1.to_string_lossy().to_string());
            }
            [r1, r2] => {
                args_vec.push("--R1".to_string());
                args_vec.push(r1.to_string_lossy().to_string());
                args_vec.push("--R2".to_string());
                args_vec.push(r2.to_string_lossy().to_string());
            }
            _ => {}
        }
        args_vec
    }
}

pub mod snippy_core {
    use std::path::{Path, PathBuf};

    pub fn arg_generator(reference: &Path, sample_dirs: &[PathBuf], prefix: &str) -> Vec<String> {
        let mut args_vec = vec![
            "--ref".to_string(),
            reference.to_string_lossy().to_string(),
            "--prefix".to_string(),
            prefix.to_string(),
        ];
        for dir in sample_dirs {
            args_vec.push(dir.to_string_lossy().to_string());
        }
        args_vec
    }
}

pub mod snp_sites {
    use std::path::Path;
    use anyhow::{anyhow, Result};
    use crate::config::defs::SNP_SITES_TAG;
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    pub async fn snp_sites_presence_check() -> Result<String> {
        let args = vec!["-V".to_string()];
        let mut child = spawn_tool(SNP_SITES_TAG, &args, None)?;
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from snp-sites -V"))?;
        let version = first_line
            .split_whitespace()
            .last()
            .ok_or_else(|| anyhow!("Invalid snp-sites -V output: {}", first_line))?
            .to_string();
        Ok(version)
    }

    pub fn arg_generator(full_aln: &Path, out_aln: &Path) -> Vec<String> {
        vec![
            "-c".to_string(),
            "-o".to_string(),
            out_aln.to_string_lossy().to_string(),
            full_aln.to_string_lossy().to_string(),
        ]
    }
}

pub mod iqtree {
    use std::path::Path;
    use anyhow::{anyhow, Result};
    use num_cpus;
    use crate::config::defs::{RunConfig, IQTREE_MODEL, IQTREE_TAG};
    use crate::utils::streams::{read_child_output_to_vec, spawn_tool, ChildStream};

    pub async fn iqtree_presence_check() -> Result<String> {
        let args = vec!["--version".to_string()];
        let mut child = spawn_tool(IQTREE_TAG, &args, None)?;
        let lines = read_child_output_to_vec(&mut child, ChildStream::Stdout).await?;
        let first_line = lines
            .first()
            .ok_or_else(|| anyhow!("No output from iqtree --version"))?;
        let version = first_line
            .split_whitespace()
            .find(|w| w.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .ok_or_else(|| anyhow!("Invalid iqtree --version output: {}", first_line))?
            .to_string();
        Ok(version)
    }

    pub fn arg_generator(config: &RunConfig, snps_aln: &Path, prefix: &Path) -> Vec<String> {
        // Tree search is the one stage allowed to use every core.
        let num_cores = if config.max_cores > 0 {
            config.max_cores
        } else {
            num_cpus::get()
        };
        vec![
            "-s".to_string(),
            snps_aln.to_string_lossy().to_string(),
            "-m".to_string(),
            IQTREE_MODEL.to_string(),
            "-nt".to_string(),
            num_cores.to_string(),
            "--prefix".to_string(),
            prefix.to_string_lossy().to_string(),
            "-redo".to_string(),
        ]
    }
}

/// Collapses a version string to its major.minor prefix for comparison
/// against TOOL_VERSIONS. Returns None for strings with no leading number.
fn major_minor(version: &str) -> Option<f32> {
    let numeric: String = version
        .split('.')
        .take(2)
        .collect::<Vec<_>>()
        .join(".");
    numeric.parse::<f32>().ok()
}

/// Queries each activated tool for its version string, for the aggregate
/// report. A tool that cannot be queried is recorded as "unknown" and
/// logged, never fatal.
pub async fn check_versions(tools: &[&str]) -> HashMap<String, String> {
    let mut versions = HashMap::new();
    for tool in tools {
        let result: Result<String> = match *tool {
            FASTQC_TAG => fastqc::fastqc_presence_check().await,
            FASTP_TAG => fastp::fastp_presence_check().await,
            SENDSKETCH_TAG => sendsketch::sendsketch_presence_check().await,
            ARIBA_TAG => ariba::ariba_presence_check().await,
            MLST_TAG => mlst::mlst_presence_check().await,
            ABRICATE_TAG => abricate::abricate_presence_check().await,
            SNIPPY_TAG | SNIPPY_CORE_TAG => snippy::snippy_presence_check().await,
            SNP_SITES_TAG => snp_sites::snp_sites_presence_check().await,
            IQTREE_TAG => iqtree::iqtree_presence_check().await,
            other => Err(anyhow::anyhow!("Unknown tool: {}", other)),
        };
        match result {
            Ok(version) => {
                if let (Some(min), Some(found)) =
                    (TOOL_VERSIONS.get(tool), major_minor(&version))
                {
                    if found < *min {
                        warn!(
                            "{} version {} is older than the tested minimum {}",
                            tool, version, min
                        );
                    }
                }
                versions.insert(tool.to_string(), version);
            }
            Err(e) => {
                warn!("Could not determine {} version: {}", tool, e);
                versions.insert(tool.to_string(), "unknown".to_string());
            }
        }
    }
    versions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_minor() {
        assert_eq!(major_minor("0.23.4"), Some(0.23));
        assert_eq!(major_minor("38.96"), Some(38.96));
        assert_eq!(major_minor("v1.2"), None);
    }
}
