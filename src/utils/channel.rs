// src/utils/channel.rs: sample channels built from input globs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::glob;
use lazy_static::lazy_static;
use regex::Regex;

use crate::config::defs::{PipelineError, FASTA_EXTS, FASTQ_EXTS, GZIP_EXT};

lazy_static! {
    static ref SEQ_EXT_RE: Regex = {
        let exts = FASTQ_EXTS
            .iter()
            .chain(FASTA_EXTS.iter())
            .copied()
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\.({})(\.{})?$", exts, GZIP_EXT)).expect("static regex")
    };
}

/// One sample flowing through the pipeline: a derived identifier plus its
/// file set (one file for single-end reads or assemblies, two for
/// paired-end reads).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: String,
    pub files: Vec<PathBuf>,
}

impl Sample {
    pub fn file1(&self) -> &PathBuf {
        &self.files[0]
    }

    pub fn file2(&self) -> Option<&PathBuf> {
        self.files.get(1)
    }
}

/// A named conduit between a producing task and its consumers. Entries are
/// sorted by sample id at construction so scheduling order is
/// deterministic; fan-in consumers must not rely on order.
#[derive(Debug, Clone)]
pub struct Channel {
    entries: Vec<Sample>,
}

impl Channel {
    pub fn from_samples(mut entries: Vec<Sample>) -> Self {
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Channel { entries }
    }

    /// Expands a glob into a cardinality-1 channel (single-end reads or
    /// assemblies). An empty match is fatal.
    pub fn from_glob(pattern: &str) -> Result<Self, PipelineError> {
        let files = expand_glob(pattern)?;
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            entries.push(Sample {
                id: sample_id(&file),
                files: vec![file],
            });
        }
        check_unique_ids(&entries)?;
        Ok(Channel::from_samples(entries))
    }

    /// Expands a glob into a cardinality-2 channel, pairing mates by the
    /// forward/reverse filename suffixes.
    pub fn from_paired_glob(
        pattern: &str,
        forward_suffix: &str,
        reverse_suffix: &str,
    ) -> Result<Self, PipelineError> {
        let files = expand_glob(pattern)?;
        let entries = pair_files(&files, forward_suffix, reverse_suffix)?;
        Ok(Channel::from_samples(entries))
    }

    /// Duplicates this channel for several downstream consumers.
    pub fn fan_out(&self, num_consumers: usize) -> Vec<Channel> {
        (0..num_consumers).map(|_| self.clone()).collect()
    }

    /// Merges every sample's files into one flat list. No ordering
    /// guarantee beyond what construction-time sorting happens to give.
    pub fn collect_files(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .flat_map(|s| s.files.iter().cloned())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.entries.iter()
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derives a sample id from a filename: the stem with sequence extensions
/// (and a trailing .gz) stripped.
pub fn sample_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    SEQ_EXT_RE.replace(&name, "").into_owned()
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let paths = glob(pattern)
        .map_err(|e| PipelineError::InvalidConfig(format!("Bad glob pattern '{}': {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| PipelineError::IOError(e.to_string()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(PipelineError::EmptyChannel(pattern.to_string()));
    }
    Ok(files)
}

/// Groups files into (R1, R2) pairs by stripping the mate suffix from the
/// sample id. Any file missing its mate, or carrying neither suffix, is an
/// error naming the offender.
pub fn pair_files(
    files: &[PathBuf],
    forward_suffix: &str,
    reverse_suffix: &str,
) -> Result<Vec<Sample>, PipelineError> {
    let mut pairs: BTreeMap<String, [Option<PathBuf>; 2]> = BTreeMap::new();

    for file in files {
        let id = sample_id(file);
        if let Some(base) = id.strip_suffix(forward_suffix) {
            pairs.entry(base.to_string()).or_default()[0] = Some(file.clone());
        } else if let Some(base) = id.strip_suffix(reverse_suffix) {
            pairs.entry(base.to_string()).or_default()[1] = Some(file.clone());
        } else {
            return Err(PipelineError::UnpairedSample {
                sample: id,
                fwd: forward_suffix.to_string(),
                rev: reverse_suffix.to_string(),
            });
        }
    }

    let mut entries = Vec::with_capacity(pairs.len());
    for (base, mates) in pairs {
        match mates {
            [Some(r1), Some(r2)] => entries.push(Sample {
                id: base,
                files: vec![r1, r2],
            }),
            _ => {
                return Err(PipelineError::UnpairedSample {
                    sample: base,
                    fwd: forward_suffix.to_string(),
                    rev: reverse_suffix.to_string(),
                });
            }
        }
    }
    Ok(entries)
}

fn check_unique_ids(entries: &[Sample]) -> Result<(), PipelineError> {
    let mut seen = BTreeMap::new();
    for sample in entries {
        if let Some(other) = seen.insert(sample.id.clone(), sample.file1().clone()) {
            return Err(PipelineError::InvalidConfig(format!(
                "Sample id '{}' derived from both {} and {}",
                sample.id,
                other.display(),
                sample.file1().display()
            )));
        }
    }
    Ok(())
}
