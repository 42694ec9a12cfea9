// src/pipelines/typing.rs: per-sample typing flow and run-level fan-in

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::try_join_all;
use log::{debug, info, warn};

use crate::config::defs::{
    PipelineError, RunConfig, ABRICATE_TAG, ARIBA_TAG, FASTP_TAG, FASTQC_TAG, IQTREE_TAG,
    MLST_TAG, SENDSKETCH_TAG, SNIPPY_TAG, SNP_SITES_TAG, SPECIES_TABLE,
};
use crate::config::InputMode;
use crate::pipelines::report::ReportAggregator;
use crate::pipelines::phylogeny;
use crate::utils::channel::{Channel, Sample};
use crate::utils::command::{
    abricate, ariba, check_versions, fastp, fastqc, mlst, snippy,
};
use crate::utils::file::{ensure_dir, file_path_manipulator, sample_dir};
use crate::utils::sketch::{parse_sketch_file, write_species_row, write_species_table, SpeciesRow};
use crate::utils::streams::run_tool_to_completion;

/// Everything one sample contributes to the run-level fan-in steps.
#[derive(Debug)]
pub struct SampleOutputs {
    pub id: String,
    pub species: Option<SpeciesRow>,
    pub qc_dir: Option<PathBuf>,
    pub trim_report: Option<PathBuf>,
    pub mlst_report: Option<PathBuf>,
    pub amr_report: Option<PathBuf>,
    pub snippy_dir: Option<PathBuf>,
}

pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let channel = build_input_channel(&config)?;
    info!("Discovered {} sample(s)", channel.len());
    for sample in channel.iter() {
        debug!("  {} -> {:?}", sample.id, sample.files);
    }

    let tools = active_tools(&config);
    let versions: BTreeMap<String, String> =
        check_versions(&tools).await.into_iter().collect();

    let mut handles = Vec::with_capacity(channel.len());
    for sample in channel.into_samples() {
        let config = Arc::clone(&config);
        handles.push(tokio::spawn(async move {
            let _permit = config
                .sample_semaphore
                .acquire()
                .await
                .map_err(|e| PipelineError::IOError(e.to_string()))?;
            process_sample(&config, &sample).await
        }));
    }

    let joined = try_join_all(handles)
        .await
        .map_err(|e| PipelineError::ToolExecution {
            tool: "sample worker".to_string(),
            error: e.to_string(),
        })?;
    let outputs = joined.into_iter().collect::<Result<Vec<_>, _>>()?;

    finalize_run(&config, outputs, versions).await
}

/// Fan-in: species table, phylogeny, aggregate report.
async fn finalize_run(
    config: &RunConfig,
    outputs: Vec<SampleOutputs>,
    versions: BTreeMap<String, String>,
) -> Result<(), PipelineError> {
    let run_name = config
        .args
        .run_name
        .clone()
        .unwrap_or_else(|| "bactyper".to_string());
    let mut aggregator = ReportAggregator::new(&run_name, mode_label(&config.input.mode));
    aggregator.set_versions(versions);

    let species_rows: Vec<SpeciesRow> = outputs
        .iter()
        .filter_map(|o| o.species.clone())
        .collect();
    if !species_rows.is_empty() {
        let species_dir = config.out_dir.join("species");
        ensure_dir(&species_dir)?;
        let table = species_dir.join(SPECIES_TABLE);
        write_species_table(species_rows.clone(), &table)?;
        info!("Species table written to {}", table.display());
    }

    for output in &outputs {
        aggregator.add_sample(&output.id);
        if let Some(row) = &output.species {
            aggregator.add_species_row(row.clone());
        }
        if let Some(dir) = &output.qc_dir {
            aggregator.add_qc_report(dir);
        }
        if let Some(path) = &output.trim_report {
            aggregator.add_trimming_report(path);
        }
        if let Some(path) = &output.mlst_report {
            aggregator.add_mlst_report(path);
        }
        if let Some(path) = &output.amr_report {
            aggregator.add_amr_report(path);
        }
        if let Some(dir) = &output.snippy_dir {
            aggregator.add_alignment(dir);
        }
    }

    let snippy_dirs: Vec<PathBuf> = outputs
        .iter()
        .filter_map(|o| o.snippy_dir.clone())
        .collect();
    if let Some(reference) = &config.input.reference {
        if snippy_dirs.len() >= 2 {
            let treefile = phylogeny::run(config, reference, &snippy_dirs).await?;
            aggregator.set_phylogeny(&treefile);
        } else {
            warn!(
                "Phylogeny skipped: {} alignment(s), need at least 2",
                snippy_dirs.len()
            );
        }
    }

    let report_dir = config.out_dir.join("report");
    let summary_path = aggregator.write(&report_dir)?;
    info!("{}", aggregator.digest());
    info!("Run summary written to {}", summary_path.display());
    Ok(())
}

/// Builds the input channel for the resolved input mode. An empty glob
/// match aborts before any task starts.
pub fn build_input_channel(config: &RunConfig) -> Result<Channel, PipelineError> {
    match &config.input.mode {
        InputMode::SingleEnd(pattern) => Channel::from_glob(pattern),
        InputMode::PairedEnd(pattern) => Channel::from_paired_glob(
            pattern,
            &config.args.forward_suffix,
            &config.args.reverse_suffix,
        ),
        InputMode::Assemblies(pattern) => Channel::from_glob(pattern),
    }
}

/// The activation predicates, collapsed to the tool set this run will
/// actually touch. Used for version collection.
pub fn active_tools(config: &RunConfig) -> Vec<&'static str> {
    let mut tools = Vec::new();
    match &config.input.mode {
        InputMode::Assemblies(_) => {
            tools.push(SENDSKETCH_TAG);
            if config.input.mlst_db.is_some() {
                tools.push(MLST_TAG);
            }
            if config.input.amr_db.is_some() {
                tools.push(ABRICATE_TAG);
            }
        }
        _ => {
            tools.push(FASTQC_TAG);
            if !config.args.skip_trimming {
                tools.push(FASTP_TAG);
            }
            tools.push(SENDSKETCH_TAG);
            if config.input.mlst_db.is_some() || config.input.amr_db.is_some() {
                tools.push(ARIBA_TAG);
            }
            if config.input.reference.is_some() {
                tools.push(SNIPPY_TAG);
                tools.push(SNP_SITES_TAG);
                tools.push(IQTREE_TAG);
            }
        }
    }
    tools
}

async fn process_sample(
    config: &RunConfig,
    sample: &Sample,
) -> Result<SampleOutputs, PipelineError> {
    ensure_dir(&config.out_dir.join(&sample.id))?;
    match &config.input.mode {
        InputMode::Assemblies(_) => process_assembly(config, sample).await,
        _ => process_reads(config, sample).await,
    }
}

/// Reads flow: QC -> trim (or bypass) -> sketch -> ARIBA typing/AMR ->
/// snippy alignment. Each stage is gated by its activation predicate.
async fn process_reads(
    config: &RunConfig,
    sample: &Sample,
) -> Result<SampleOutputs, PipelineError> {
    let qc_dir = fastqc_qc(config, sample).await?;

    let (analysis_ready, trim_report) = trim_reads(config, sample).await?;

    let species = Some(sketch_species(config, &analysis_ready).await?);

    let mlst_report = match &config.input.mlst_db {
        Some(db) => Some(ariba_typing(config, &analysis_ready, db, "mlst").await?),
        None => None,
    };

    let amr_report = match &config.input.amr_db {
        Some(db) => Some(ariba_typing(config, &analysis_ready, db, "amr").await?),
        None => None,
    };

    let snippy_dir = match &config.input.reference {
        Some(reference) => {
            let out_dir = sample_dir(&config.out_dir, &analysis_ready.id, "snippy");
            let args = snippy::arg_generator(config, reference, &analysis_ready.files, &out_dir);
            run_tool_to_completion(SNIPPY_TAG, &args, None).await?;
            Some(out_dir)
        }
        None => None,
    };

    Ok(SampleOutputs {
        id: sample.id.clone(),
        species,
        qc_dir: Some(qc_dir),
        trim_report,
        mlst_report,
        amr_report,
        snippy_dir,
    })
}

/// Assembly flow: sketch -> mlst -> abricate. No QC, trimming or
/// reference alignment.
async fn process_assembly(
    config: &RunConfig,
    sample: &Sample,
) -> Result<SampleOutputs, PipelineError> {
    let species = Some(sketch_species(config, sample).await?);

    let mlst_report = match (&config.input.mlst_db, &config.input.mlst_def) {
        (Some(db), Some(definitions)) => {
            let out_dir = sample_dir(&config.out_dir, &sample.id, "mlst");
            ensure_dir(&out_dir)?;
            let args = mlst::arg_generator(sample.file1(), db, definitions);
            let lines = run_tool_to_completion(MLST_TAG, &args, None).await?;
            let report = out_dir.join("mlst.tsv");
            write_lines(&report, &lines)?;
            Some(report)
        }
        _ => None,
    };

    let amr_report = match &config.input.amr_db {
        Some(db) => {
            let out_dir = sample_dir(&config.out_dir, &sample.id, "amr");
            ensure_dir(&out_dir)?;
            let args = abricate::arg_generator(sample.file1(), db);
            let lines = run_tool_to_completion(ABRICATE_TAG, &args, None).await?;
            let report = out_dir.join("abricate.tsv");
            write_lines(&report, &lines)?;
            Some(report)
        }
        None => None,
    };

    Ok(SampleOutputs {
        id: sample.id.clone(),
        species,
        qc_dir: None,
        trim_report: None,
        mlst_report,
        amr_report,
        snippy_dir: None,
    })
}

async fn fastqc_qc(config: &RunConfig, sample: &Sample) -> Result<PathBuf, PipelineError> {
    let qc_dir = sample_dir(&config.out_dir, &sample.id, "fastqc");
    ensure_dir(&qc_dir)?;
    let tool_threads = (config.max_cores / config.args.max_parallel_samples.max(1)).max(1);
    let args = fastqc::arg_generator(&sample.files, &qc_dir, tool_threads);
    run_tool_to_completion(FASTQC_TAG, &args, None).await?;
    Ok(qc_dir)
}

/// Quality/adapter trimming with fastp. Under --skip_trimming this is an
/// idempotent bypass: the returned sample is the raw input, untouched, and
/// no trimming report exists.
///
/// # Arguments
///
/// * `config` - RunConfig struct from main.
/// * `sample` - Raw read sample (1 or 2 files).
///
/// # Returns
/// The sample downstream tasks should consume, plus the fastp JSON report
/// when trimming ran.
pub async fn trim_reads(
    config: &RunConfig,
    sample: &Sample,
) -> Result<(Sample, Option<PathBuf>), PipelineError> {
    if config.args.skip_trimming {
        debug!("Trimming bypassed for {}", sample.id);
        return Ok((sample.clone(), None));
    }

    let trim_dir = sample_dir(&config.out_dir, &sample.id, "trimmed");
    ensure_dir(&trim_dir)?;

    let paired = sample.file2().is_some();
    let out1_suffix = if paired {
        "trimmed_R1.fastq.gz"
    } else {
        "trimmed.fastq.gz"
    };
    let out1 = file_path_manipulator(&sample.id, &trim_dir, Some(out1_suffix), "_");
    let out2 = paired
        .then(|| file_path_manipulator(&sample.id, &trim_dir, Some("trimmed_R2.fastq.gz"), "_"));
    let json_report = file_path_manipulator(&sample.id, &trim_dir, Some("fastp.json"), "_");
    let html_report = file_path_manipulator(&sample.id, &trim_dir, Some("fastp.html"), "_");

    let view = fastp::FastpConfig {
        in1: sample.file1().clone(),
        in2: sample.file2().cloned(),
        out1: out1.clone(),
        out2: out2.clone(),
        json_report: json_report.clone(),
        html_report,
    };
    let args = fastp::arg_generator(config, &view);
    run_tool_to_completion(FASTP_TAG, &args, None).await?;

    let mut files = vec![out1];
    if let Some(out2) = out2 {
        files.push(out2);
    }
    Ok((
        Sample {
            id: sample.id.clone(),
            files,
        },
        Some(json_report),
    ))
}

/// Species identification from the first read file (or assembly).
async fn sketch_species(config: &RunConfig, sample: &Sample) -> Result<SpeciesRow, PipelineError> {
    let sketch_dir = sample_dir(&config.out_dir, &sample.id, "sketch");
    ensure_dir(&sketch_dir)?;
    let out_tsv = sketch_dir.join("sketch.tsv");

    let args = crate::utils::command::sendsketch::arg_generator(sample.file1(), &out_tsv);
    run_tool_to_completion(SENDSKETCH_TAG, &args, None).await?;

    let row = parse_sketch_file(&out_tsv, &sample.id)?;
    write_species_row(&row, &sketch_dir.join("species_id.tsv"))?;
    Ok(row)
}

/// One ARIBA run (MLST or AMR, depending on the database handed in).
/// ARIBA owns its output directory, so only the parent exists beforehand.
async fn ariba_typing(
    config: &RunConfig,
    sample: &Sample,
    db: &PathBuf,
    stage: &str,
) -> Result<PathBuf, PipelineError> {
    let out_dir = sample_dir(&config.out_dir, &sample.id, stage);
    let args = ariba::arg_generator(db, &sample.files, &out_dir);
    run_tool_to_completion(ARIBA_TAG, &args, None).await?;

    let report = out_dir.join("report.tsv");
    if !report.exists() {
        return Err(PipelineError::InvalidToolOutput {
            tool: ARIBA_TAG.to_string(),
            error: format!("expected report missing: {}", report.display()),
        });
    }
    Ok(report)
}

fn write_lines(path: &PathBuf, lines: &[String]) -> Result<(), PipelineError> {
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content)
        .map_err(|e| PipelineError::IOError(format!("Cannot write {}: {}", path.display(), e)))
}

pub fn mode_label(mode: &InputMode) -> &'static str {
    match mode {
        InputMode::SingleEnd(_) => "single-end",
        InputMode::PairedEnd(_) => "paired-end",
        InputMode::Assemblies(_) => "assemblies",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_label() {
        assert_eq!(mode_label(&InputMode::SingleEnd("x".to_string())), "single-end");
        assert_eq!(mode_label(&InputMode::Assemblies("x".to_string())), "assemblies");
    }
}
