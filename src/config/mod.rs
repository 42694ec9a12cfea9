pub mod defs;
pub mod genomes;

use std::path::{Path, PathBuf};

use crate::cli::args::{Arguments, Profile};
use crate::config::defs::PipelineError;
use crate::config::genomes::resolve_genome;

pub const S3_PREFIX: &str = "s3://";

/// How reads enter the pipeline. Carries the glob pattern the channel
/// router will expand.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    SingleEnd(String),
    PairedEnd(String),
    Assemblies(String),
}

/// Secondary values derived from the raw arguments during resolution.
/// `mlst_def` is only carried for assembly input; ARIBA-prepared read
/// databases bundle their own scheme definitions.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub mode: InputMode,
    pub reference: Option<PathBuf>,
    pub mlst_db: Option<PathBuf>,
    pub mlst_def: Option<PathBuf>,
    pub amr_db: Option<PathBuf>,
}

/// Validates cross-field constraints and derives secondary values.
/// Every violation is fatal before any task runs; main maps the error to
/// exit code 1.
///
/// # Arguments
///
/// * `args` - The parsed command-line arguments.
/// * `cwd` - The current working directory, for relative path resolution.
///
/// # Returns
/// ResolvedInput with the input mode and derived reference/database paths.
pub fn resolve(args: &Arguments, cwd: &Path) -> Result<ResolvedInput, PipelineError> {
    let mode = match (&args.se_reads, &args.pe_reads, &args.assemblies) {
        (Some(p), None, None) => InputMode::SingleEnd(p.clone()),
        (None, Some(p), None) => InputMode::PairedEnd(p.clone()),
        (None, None, Some(p)) => InputMode::Assemblies(p.clone()),
        (None, None, None) => {
            return Err(PipelineError::InvalidConfig(
                "One of --se_reads, --pe_reads or --assemblies is required".to_string(),
            ));
        }
        _ => {
            return Err(PipelineError::InvalidConfig(
                "--se_reads, --pe_reads and --assemblies are mutually exclusive".to_string(),
            ));
        }
    };

    if matches!(mode, InputMode::PairedEnd(_)) && args.forward_suffix == args.reverse_suffix {
        return Err(PipelineError::InvalidConfig(format!(
            "--forward_suffix and --reverse_suffix must differ (both are '{}')",
            args.forward_suffix
        )));
    }

    let reference = resolve_reference(args, cwd)?;

    if matches!(mode, InputMode::Assemblies(_)) && reference.is_some() {
        return Err(PipelineError::InvalidConfig(
            "Reference-based alignment needs reads; --genome/--fasta cannot be combined with --assemblies"
                .to_string(),
        ));
    }

    let mlst_db = match &args.mlst_db {
        Some(db) => {
            let db = absolutize(db, cwd);
            if !db.exists() {
                return Err(PipelineError::InvalidConfig(format!(
                    "MLST database path does not exist: {}",
                    db.display()
                )));
            }
            Some(db)
        }
        None => None,
    };

    let mlst_def = match &args.mlst_def {
        Some(def) => {
            let def = absolutize(def, cwd);
            if !def.exists() {
                return Err(PipelineError::InvalidConfig(format!(
                    "MLST definitions path does not exist: {}",
                    def.display()
                )));
            }
            Some(def)
        }
        None => None,
    };

    if matches!(mode, InputMode::Assemblies(_)) {
        if mlst_db.is_some() != mlst_def.is_some() {
            return Err(PipelineError::InvalidConfig(
                "Assembly MLST typing needs both --mlst_db and --mlst_def".to_string(),
            ));
        }
    } else if mlst_def.is_some() {
        return Err(PipelineError::InvalidConfig(
            "--mlst_def only applies to --assemblies; ARIBA databases carry their own scheme definitions"
                .to_string(),
        ));
    }

    let amr_db = match &args.amr_db {
        Some(db) => {
            let db = absolutize(db, cwd);
            if !db.exists() {
                return Err(PipelineError::InvalidConfig(format!(
                    "AMR database path does not exist: {}",
                    db.display()
                )));
            }
            Some(db)
        }
        None => None,
    };

    validate_cloud(args)?;
    validate_email(args)?;

    Ok(ResolvedInput {
        mode,
        reference,
        mlst_db,
        mlst_def,
        amr_db,
    })
}

/// `--fasta` overrides the registered genome table; `--genome` goes through
/// it. Either way the resolved file must exist.
fn resolve_reference(args: &Arguments, cwd: &Path) -> Result<Option<PathBuf>, PipelineError> {
    if let Some(fasta) = &args.fasta {
        let path = absolutize(fasta, cwd);
        if !path.exists() {
            return Err(PipelineError::InvalidConfig(format!(
                "Reference FASTA does not exist: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    if let Some(key) = &args.genome {
        let base = absolutize(&args.genome_base, cwd);
        let path = resolve_genome(key, &base)?;
        if !path.exists() {
            return Err(PipelineError::InvalidConfig(format!(
                "Registered genome '{}' resolves to missing file {}",
                key,
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    Ok(None)
}

fn validate_cloud(args: &Arguments) -> Result<(), PipelineError> {
    match args.profile {
        Profile::Awsbatch => {
            if args.awsqueue.is_none() || args.awsregion.is_none() {
                return Err(PipelineError::InvalidConfig(
                    "Profile 'awsbatch' requires both --awsqueue and --awsregion".to_string(),
                ));
            }
            if !args.outdir.starts_with(S3_PREFIX) {
                return Err(PipelineError::InvalidConfig(format!(
                    "Profile 'awsbatch' requires an {} output directory, got '{}'",
                    S3_PREFIX, args.outdir
                )));
            }
        }
        Profile::Standard => {
            if args.outdir.starts_with(S3_PREFIX) {
                return Err(PipelineError::InvalidConfig(
                    "Remote output directories need --profile awsbatch".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn validate_email(args: &Arguments) -> Result<(), PipelineError> {
    for addr in [&args.email, &args.email_on_fail].into_iter().flatten() {
        if !addr.contains('@') {
            return Err(PipelineError::InvalidConfig(format!(
                "'{}' does not look like an email address",
                addr
            )));
        }
    }
    Ok(())
}

fn absolutize(path: &str, cwd: &Path) -> PathBuf {
    let p = PathBuf::from(path);
    if p.is_absolute() {
        p
    } else {
        cwd.join(p)
    }
}
