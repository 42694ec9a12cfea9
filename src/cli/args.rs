use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, ValueEnum, Default, PartialEq)]
pub enum Profile {
    #[default]
    Standard,
    Awsbatch,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "bactyper-pipelines", version = "0.1.0")]
pub struct Arguments {

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(long, help = "Glob pattern for single-end read FASTQs, e.g. 'reads/*.fastq.gz'")]
    pub se_reads: Option<String>,

    #[arg(long, help = "Glob pattern for paired-end read FASTQs; mates are matched by suffix")]
    pub pe_reads: Option<String>,

    #[arg(long, help = "Glob pattern for genome assembly FASTAs; bypasses QC, trimming and alignment")]
    pub assemblies: Option<String>,

    #[arg(long, default_value = "_R1", help = "Filename suffix marking forward reads")]
    pub forward_suffix: String,

    #[arg(long, default_value = "_R2", help = "Filename suffix marking reverse reads")]
    pub reverse_suffix: String,

    #[arg(long, help = "Key into the registered genome table; enables the alignment/consensus branch")]
    pub genome: Option<String>,

    #[arg(long, help = "Reference FASTA path; overrides --genome")]
    pub fasta: Option<String>,

    #[arg(long, default_value = "refs", help = "Directory holding the registered reference FASTAs")]
    pub genome_base: String,

    #[arg(long, action, help = "Feed raw reads directly to typing and alignment")]
    pub skip_trimming: bool,

    #[arg(long, help = "MLST database: ARIBA-prepared directory for reads, BLAST db for assemblies")]
    pub mlst_db: Option<String>,

    #[arg(long, help = "MLST scheme definitions directory; assembly input only")]
    pub mlst_def: Option<String>,

    #[arg(long, help = "ARIBA-prepared AMR database directory; enables resistance detection")]
    pub amr_db: Option<String>,

    #[arg(short = 'o', long, default_value = "results", help = "Output directory root")]
    pub outdir: String,

    #[arg(long, help = "Name recorded in the report and notification subject")]
    pub run_name: Option<String>,

    #[arg(long, help = "Address notified on completion")]
    pub email: Option<String>,

    #[arg(long, help = "Address notified only when the run fails")]
    pub email_on_fail: Option<String>,

    #[arg(long = "profile", default_value = "standard", value_enum)]
    pub profile: Profile,

    #[arg(long, help = "AWS Batch queue (required under --profile awsbatch)")]
    pub awsqueue: Option<String>,

    #[arg(long, help = "AWS region (required under --profile awsbatch)")]
    pub awsregion: Option<String>,

    #[arg(long, default_value_t = 16)]
    pub threads: usize,

    #[arg(short = 'q', long = "quality", default_value_t = 20)]
    pub quality: u8,

    #[arg(long, default_value_t = 4, help = "Samples processed concurrently")]
    pub max_parallel_samples: usize,
}
