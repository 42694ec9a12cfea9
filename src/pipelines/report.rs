// src/pipelines/report.rs: cross-tool report aggregation

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::config::defs::{PipelineError, RUN_SUMMARY_JSON, SOFTWARE_VERSIONS_TSV};
use crate::utils::file::ensure_dir;
use crate::utils::sketch::SpeciesRow;

/// The live-built summary mapping. Every section is optional: an empty
/// collection is skipped during rendering rather than failing the run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub run_name: String,
    pub completed_at: String,
    pub input_mode: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub species: Vec<SpeciesRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qc_reports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trimming_reports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mlst_reports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub amr_reports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alignments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phylogeny: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub software_versions: BTreeMap<String, String>,
}

/// Collects heterogeneous per-task outputs as samples finish and renders
/// them into one report at the end of the run.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    summary: RunSummary,
}

impl ReportAggregator {
    pub fn new(run_name: &str, input_mode: &str) -> Self {
        let mut aggregator = ReportAggregator::default();
        aggregator.summary.run_name = run_name.to_string();
        aggregator.summary.input_mode = input_mode.to_string();
        aggregator
    }

    pub fn add_sample(&mut self, id: &str) {
        self.summary.samples.push(id.to_string());
    }

    pub fn add_species_row(&mut self, row: SpeciesRow) {
        self.summary.species.push(row);
    }

    pub fn add_qc_report(&mut self, path: &Path) {
        self.summary.qc_reports.push(path.to_string_lossy().into_owned());
    }

    pub fn add_trimming_report(&mut self, path: &Path) {
        self.summary
            .trimming_reports
            .push(path.to_string_lossy().into_owned());
    }

    pub fn add_mlst_report(&mut self, path: &Path) {
        self.summary.mlst_reports.push(path.to_string_lossy().into_owned());
    }

    pub fn add_amr_report(&mut self, path: &Path) {
        self.summary.amr_reports.push(path.to_string_lossy().into_owned());
    }

    pub fn add_alignment(&mut self, path: &Path) {
        self.summary.alignments.push(path.to_string_lossy().into_owned());
    }

    pub fn set_phylogeny(&mut self, path: &Path) {
        self.summary.phylogeny = Some(path.to_string_lossy().into_owned());
    }

    pub fn set_versions(&mut self, versions: BTreeMap<String, String>) {
        self.summary.software_versions = versions;
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// A short plain-text digest for logs and the notification email.
    pub fn digest(&self) -> String {
        format!(
            "Run '{}' ({}): {} sample(s), {} species call(s), {} MLST report(s), {} AMR report(s), phylogeny: {}",
            self.summary.run_name,
            self.summary.input_mode,
            self.summary.samples.len(),
            self.summary.species.len(),
            self.summary.mlst_reports.len(),
            self.summary.amr_reports.len(),
            self.summary.phylogeny.as_deref().unwrap_or("skipped"),
        )
    }

    /// Renders `run_summary.json` and `software_versions.tsv` under
    /// `report_dir`. Succeeds even when every optional section is empty.
    pub fn write(&mut self, report_dir: &Path) -> Result<PathBuf, PipelineError> {
        ensure_dir(report_dir)?;
        self.summary.completed_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let summary_path = report_dir.join(RUN_SUMMARY_JSON);
        let json = serde_json::to_string_pretty(&self.summary)
            .map_err(|e| PipelineError::IOError(format!("Cannot serialize summary: {}", e)))?;
        fs::write(&summary_path, json).map_err(|e| {
            PipelineError::IOError(format!("Cannot write {}: {}", summary_path.display(), e))
        })?;

        let versions_path = report_dir.join(SOFTWARE_VERSIONS_TSV);
        let mut tsv = String::from("tool\tversion\n");
        for (tool, version) in &self.summary.software_versions {
            tsv.push_str(&format!("{}\t{}\n", tool, version));
        }
        fs::write(&versions_path, tsv).map_err(|e| {
            PipelineError::IOError(format!("Cannot write {}: {}", versions_path.display(), e))
        })?;

        Ok(summary_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_with_all_sections_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut aggregator = ReportAggregator::new("test_run", "paired-end");
        let summary_path = aggregator.write(&dir.path().join("report")).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(json["run_name"], "test_run");
        // empty sections are absent, not null/empty
        assert!(json.get("species").is_none());
        assert!(json.get("mlst_reports").is_none());
        assert!(json.get("phylogeny").is_none());

        let versions = fs::read_to_string(dir.path().join("report").join(SOFTWARE_VERSIONS_TSV))
            .unwrap();
        assert_eq!(versions, "tool\tversion\n");
    }

    #[test]
    fn test_write_with_sections_populated() {
        let dir = tempfile::tempdir().unwrap();
        let mut aggregator = ReportAggregator::new("r", "single-end");
        aggregator.add_sample("s1");
        aggregator.add_species_row(SpeciesRow {
            sample: "s1".to_string(),
            genus: "Escherichia".to_string(),
            taxonomy: "Escherichia coli".to_string(),
        });
        aggregator.add_mlst_report(Path::new("/out/s1/mlst/report.tsv"));
        aggregator.set_phylogeny(Path::new("/out/phylogeny/core.treefile"));
        let mut versions = BTreeMap::new();
        versions.insert("fastp".to_string(), "0.23.4".to_string());
        aggregator.set_versions(versions);

        let summary_path = aggregator.write(dir.path()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(json["samples"][0], "s1");
        assert_eq!(json["species"][0]["genus"], "Escherichia");
        assert_eq!(json["phylogeny"], "/out/phylogeny/core.treefile");

        let versions = fs::read_to_string(dir.path().join(SOFTWARE_VERSIONS_TSV)).unwrap();
        assert!(versions.contains("fastp\t0.23.4"));
    }
}
