use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;

use bactyper_pipelines::cli::args::{Arguments, Profile};
use bactyper_pipelines::config::defs::{PipelineError, RunConfig};
use bactyper_pipelines::config::{resolve, InputMode, ResolvedInput};
use bactyper_pipelines::pipelines::typing::{active_tools, build_input_channel, trim_reads};
use bactyper_pipelines::pipelines::report::ReportAggregator;
use bactyper_pipelines::utils::channel::{Channel, Sample};

fn base_args() -> Arguments {
    Arguments {
        se_reads: Some("reads/*.fastq.gz".to_string()),
        forward_suffix: "_R1".to_string(),
        reverse_suffix: "_R2".to_string(),
        genome_base: "refs".to_string(),
        outdir: "results".to_string(),
        threads: 4,
        quality: 20,
        max_parallel_samples: 2,
        ..Default::default()
    }
}

fn make_config(args: Arguments, input: ResolvedInput, out_dir: PathBuf) -> RunConfig {
    RunConfig {
        cwd: PathBuf::from("."),
        out_dir,
        args,
        input,
        max_cores: 2,
        sample_semaphore: Arc::new(Semaphore::new(2)),
        log_level: log::LevelFilter::Info,
    }
}

fn reads_input(pattern: &str) -> ResolvedInput {
    ResolvedInput {
        mode: InputMode::SingleEnd(pattern.to_string()),
        reference: None,
        mlst_db: None,
        mlst_def: None,
        amr_db: None,
    }
}

#[test]
fn unknown_genome_key_fails_before_any_task() {
    let mut args = base_args();
    args.genome = Some("Vibrio_cholerae".to_string());
    let err = resolve(&args, &PathBuf::from("/tmp")).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
    assert!(err.to_string().contains("Vibrio_cholerae"));
}

#[test]
fn known_genome_key_resolves_reference_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let refs = dir.path().join("refs");
    fs::create_dir_all(&refs)?;
    fs::write(refs.join("Escherichia_coli_K12_MG1655.fasta"), ">chr\nACGT\n")?;

    let mut args = base_args();
    args.genome = Some("Escherichia_coli_K12".to_string());
    let input = resolve(&args, dir.path())?;
    let reference = input.reference.expect("reference should be derived");
    assert!(reference.ends_with("refs/Escherichia_coli_K12_MG1655.fasta"));
    Ok(())
}

#[test]
fn registered_genome_with_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = base_args();
    args.genome = Some("Escherichia_coli_K12".to_string());
    let err = resolve(&args, dir.path()).unwrap_err();
    assert!(err.to_string().contains("missing file"));
}

#[test]
fn awsbatch_requires_queue_and_region() {
    let mut args = base_args();
    args.profile = Profile::Awsbatch;
    args.outdir = "s3://bucket/results".to_string();
    args.awsqueue = Some("queue".to_string());
    // region missing
    let err = resolve(&args, &PathBuf::from("/tmp")).unwrap_err();
    assert!(err.to_string().contains("--awsregion"));
}

#[test]
fn awsbatch_requires_remote_outdir() {
    let mut args = base_args();
    args.profile = Profile::Awsbatch;
    args.awsqueue = Some("queue".to_string());
    args.awsregion = Some("eu-west-1".to_string());
    args.outdir = "results".to_string();
    let err = resolve(&args, &PathBuf::from("/tmp")).unwrap_err();
    assert!(err.to_string().contains("s3://"));
}

#[test]
fn remote_outdir_requires_awsbatch_profile() {
    let mut args = base_args();
    args.outdir = "s3://bucket/results".to_string();
    let err = resolve(&args, &PathBuf::from("/tmp")).unwrap_err();
    assert!(err.to_string().contains("awsbatch"));
}

#[test]
fn valid_awsbatch_profile_passes_validation() -> Result<()> {
    let mut args = base_args();
    args.profile = Profile::Awsbatch;
    args.awsqueue = Some("queue".to_string());
    args.awsregion = Some("eu-west-1".to_string());
    args.outdir = "s3://bucket/results".to_string();
    resolve(&args, &PathBuf::from("/tmp"))?;
    Ok(())
}

#[test]
fn exactly_one_input_mode_is_required() {
    let mut args = base_args();
    args.se_reads = None;
    let err = resolve(&args, &PathBuf::from("/tmp")).unwrap_err();
    assert!(err.to_string().contains("required"));

    let mut args = base_args();
    args.pe_reads = Some("reads/*_R{1,2}.fastq.gz".to_string());
    let err = resolve(&args, &PathBuf::from("/tmp")).unwrap_err();
    assert!(err.to_string().contains("mutually exclusive"));
}

#[test]
fn assembly_mlst_db_without_definitions_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("mlst_db");
    fs::create_dir_all(&db).unwrap();

    let mut args = base_args();
    args.se_reads = None;
    args.assemblies = Some("asm/*.fasta".to_string());
    args.mlst_db = Some(db.to_string_lossy().into_owned());
    let err = resolve(&args, dir.path()).unwrap_err();
    assert!(err.to_string().contains("--mlst_def"));
}

#[test]
fn mlst_definitions_rejected_for_reads_input() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("mlst_db");
    let def = dir.path().join("mlst_defs");
    fs::create_dir_all(&db).unwrap();
    fs::create_dir_all(&def).unwrap();

    let mut args = base_args();
    args.mlst_db = Some(db.to_string_lossy().into_owned());
    args.mlst_def = Some(def.to_string_lossy().into_owned());
    let err = resolve(&args, dir.path()).unwrap_err();
    assert!(err.to_string().contains("--assemblies"));
}

#[test]
fn reads_mlst_db_alone_activates_ariba() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("mlst_db");
    fs::create_dir_all(&db)?;

    let mut args = base_args();
    args.mlst_db = Some(db.to_string_lossy().into_owned());
    let input = resolve(&args, dir.path())?;
    assert!(input.mlst_db.is_some());
    assert!(input.mlst_def.is_none());

    let config = make_config(base_args(), input, dir.path().join("results"));
    assert!(active_tools(&config).contains(&"ariba"));
    Ok(())
}

#[test]
fn identical_pair_suffixes_fail() {
    let mut args = base_args();
    args.se_reads = None;
    args.pe_reads = Some("reads/*.fastq.gz".to_string());
    args.reverse_suffix = "_R1".to_string();
    let err = resolve(&args, &PathBuf::from("/tmp")).unwrap_err();
    assert!(err.to_string().contains("must differ"));
}

#[test]
fn empty_glob_match_is_a_descriptive_error() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = format!("{}/*.fastq.gz", dir.path().display());
    let config = make_config(
        base_args(),
        reads_input(&pattern),
        dir.path().join("results"),
    );
    let err = build_input_channel(&config).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyChannel(_)));
    assert!(err.to_string().contains(dir.path().to_str().unwrap()));
}

#[test]
fn paired_glob_builds_two_file_samples() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for name in [
        "sampleA_R1.fastq.gz",
        "sampleA_R2.fastq.gz",
        "sampleB_R1.fastq.gz",
        "sampleB_R2.fastq.gz",
    ] {
        fs::write(dir.path().join(name), "@r\nACGT\n+\nIIII\n")?;
    }
    let pattern = format!("{}/*.fastq.gz", dir.path().display());
    let channel = Channel::from_paired_glob(&pattern, "_R1", "_R2")?;
    assert_eq!(channel.len(), 2);
    let samples: Vec<&Sample> = channel.iter().collect();
    assert_eq!(samples[0].id, "sampleA");
    assert_eq!(samples[0].files.len(), 2);
    assert_eq!(samples[1].id, "sampleB");
    Ok(())
}

#[tokio::test]
async fn skip_trimming_is_an_idempotent_bypass() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = dir.path().join("s1.fastq.gz");
    fs::write(&raw, "@r\nACGT\n+\nIIII\n")?;

    let mut args = base_args();
    args.skip_trimming = true;
    let config = make_config(
        args,
        reads_input("unused"),
        dir.path().join("results"),
    );

    let sample = Sample {
        id: "s1".to_string(),
        files: vec![raw.clone()],
    };
    let (trimmed, report) = trim_reads(&config, &sample).await?;
    // output set equals input set, nothing written
    assert_eq!(trimmed, sample);
    assert!(report.is_none());
    assert!(!dir.path().join("results").join("s1").join("trimmed").exists());
    Ok(())
}

#[test]
fn activation_predicates_follow_configuration() {
    let dir = PathBuf::from("/tmp/out");

    let mut args = base_args();
    args.skip_trimming = true;
    let config = make_config(args, reads_input("x"), dir.clone());
    let tools = active_tools(&config);
    assert!(tools.contains(&"fastqc"));
    assert!(!tools.contains(&"fastp"));
    assert!(!tools.contains(&"snippy"));
    assert!(!tools.contains(&"ariba"));

    let mut input = reads_input("x");
    input.reference = Some(PathBuf::from("/refs/ref.fasta"));
    input.amr_db = Some(PathBuf::from("/db/amr"));
    let config = make_config(base_args(), input, dir.clone());
    let tools = active_tools(&config);
    assert!(tools.contains(&"fastp"));
    assert!(tools.contains(&"ariba"));
    assert!(tools.contains(&"snippy"));
    assert!(tools.contains(&"iqtree"));

    let input = ResolvedInput {
        mode: InputMode::Assemblies("asm/*.fasta".to_string()),
        reference: None,
        mlst_db: Some(PathBuf::from("/db/mlst")),
        mlst_def: Some(PathBuf::from("/db/defs")),
        amr_db: None,
    };
    let config = make_config(base_args(), input, dir);
    let tools = active_tools(&config);
    assert!(tools.contains(&"sendsketch.sh"));
    assert!(tools.contains(&"mlst"));
    assert!(!tools.contains(&"abricate"));
    assert!(!tools.contains(&"fastqc"));
}

#[test]
fn report_survives_fully_empty_inputs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut aggregator = ReportAggregator::new("empty_run", "single-end");
    let path = aggregator.write(dir.path())?;
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    assert_eq!(json["run_name"], "empty_run");
    Ok(())
}

#[test]
fn samples_are_independent_in_the_channel() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("a.fastq"), "@r\nA\n+\nI\n")?;
    let pattern = format!("{}/*.fastq", dir.path().display());
    let solo = Channel::from_glob(&pattern)?;

    fs::write(dir.path().join("b.fastq"), "@r\nC\n+\nI\n")?;
    let both = Channel::from_glob(&pattern)?;

    // adding a second sample leaves the first sample's entry untouched
    let solo_a = solo.iter().find(|s| s.id == "a").unwrap();
    let both_a = both.iter().find(|s| s.id == "a").unwrap();
    assert_eq!(solo_a, both_a);
    assert!(both.iter().any(|s| s.id == "b"));
    assert_eq!(both.len(), 2);
    Ok(())
}
