// src/utils/sketch.rs: species identification from sendsketch hit tables

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::config::defs::PipelineError;

/// One sample's species call: the top taxonomy hit plus the modal genus
/// across all hits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesRow {
    pub sample: String,
    pub genus: String,
    pub taxonomy: String,
}

/// Parses a sendsketch table (two banner lines, then a tab-separated header
/// with a `taxName` column). Returns (modal genus, top taxonomy hit);
/// a table without a taxName column yields ("NA", "NA").
pub fn parse_sketch_table(content: &str) -> (String, String) {
    let mut lines = content.lines().skip(2);

    let header = match lines.next() {
        Some(h) => h,
        None => return ("NA".to_string(), "NA".to_string()),
    };
    let tax_col = match header.split('\t').position(|c| c.trim() == "taxName") {
        Some(i) => i,
        None => return ("NA".to_string(), "NA".to_string()),
    };

    let mut top_tax: Option<String> = None;
    // Insertion-ordered counts so ties resolve to the first genus seen.
    let mut genus_counts: Vec<(String, usize)> = Vec::new();

    for line in lines {
        let tax_name = match line.split('\t').nth(tax_col) {
            Some(t) if !t.trim().is_empty() => t.trim().to_string(),
            _ => continue,
        };
        if top_tax.is_none() {
            top_tax = Some(tax_name.clone());
        }
        let genus = tax_name
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        match genus_counts.iter_mut().find(|(g, _)| *g == genus) {
            Some((_, n)) => *n += 1,
            None => genus_counts.push((genus, 1)),
        }
    }

    let top_tax = match top_tax {
        Some(t) => t,
        None => return ("NA".to_string(), "NA".to_string()),
    };
    // Strictly-greater scan: on tied counts the first genus seen wins.
    let mut top_genus = "NA".to_string();
    let mut top_count = 0usize;
    for (genus, count) in &genus_counts {
        if *count > top_count {
            top_count = *count;
            top_genus = genus.clone();
        }
    }

    (top_genus, top_tax)
}

/// Reads a sample's sendsketch output into a SpeciesRow.
pub fn parse_sketch_file(path: &Path, sample_id: &str) -> Result<SpeciesRow, PipelineError> {
    let content = fs::read_to_string(path).map_err(|e| {
        PipelineError::IOError(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let (genus, taxonomy) = parse_sketch_table(&content);
    Ok(SpeciesRow {
        sample: sample_id.to_string(),
        genus,
        taxonomy,
    })
}

/// Writes one sample's species row as a headered TSV.
pub fn write_species_row(row: &SpeciesRow, path: &Path) -> Result<(), PipelineError> {
    let content = format!(
        "sample\tgenus\ttaxonomy\n{}\t{}\t{}\n",
        row.sample, row.genus, row.taxonomy
    );
    fs::write(path, content)
        .map_err(|e| PipelineError::IOError(format!("Cannot write {}: {}", path.display(), e)))
}

/// Fan-in: merges the per-sample rows into one table, sorted by taxonomy.
pub fn write_species_table(mut rows: Vec<SpeciesRow>, path: &Path) -> Result<(), PipelineError> {
    rows.sort_by(|a, b| a.taxonomy.cmp(&b.taxonomy));
    let mut content = String::from("sample\tgenus\ttaxonomy\n");
    for row in &rows {
        content.push_str(&format!("{}\t{}\t{}\n", row.sample, row.genus, row.taxonomy));
    }
    fs::write(path, content)
        .map_err(|e| PipelineError::IOError(format!("Cannot write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKETCH_OUTPUT: &str = "\
Sending queries to refseq server.
Query: s1 reads
WKID\tKID\tANI\tComplt\ttaxID\ttaxName
98.8\t92.1\t99.2\t95.0\t562\tEscherichia coli
91.2\t80.4\t97.1\t90.0\t620\tShigella flexneri
90.8\t79.9\t96.8\t88.0\t564\tEscherichia fergusonii
";

    #[test]
    fn test_parse_sketch_table() {
        let (genus, tax) = parse_sketch_table(SKETCH_OUTPUT);
        assert_eq!(genus, "Escherichia");
        assert_eq!(tax, "Escherichia coli");
    }

    #[test]
    fn test_parse_sketch_table_no_tax_column() {
        let content = "banner\nbanner\nWKID\tKID\n98.8\t92.1\n";
        let (genus, tax) = parse_sketch_table(content);
        assert_eq!(genus, "NA");
        assert_eq!(tax, "NA");
    }

    #[test]
    fn test_parse_sketch_table_no_hits() {
        let content = "banner\nbanner\nWKID\tKID\ttaxName\n";
        let (genus, tax) = parse_sketch_table(content);
        assert_eq!(genus, "NA");
        assert_eq!(tax, "NA");
    }

    #[test]
    fn test_parse_sketch_table_tie_keeps_first_seen() {
        let content = "b\nb\ntaxName\nAlpha one\nBeta two\n";
        let (genus, tax) = parse_sketch_table(content);
        assert_eq!(genus, "Alpha");
        assert_eq!(tax, "Alpha one");
    }

    #[test]
    fn test_parse_sketch_table_majority_genus_beats_top_hit() {
        let content = "b\nb\ntaxName\nAlpha one\nBeta two\nBeta three\n";
        let (genus, tax) = parse_sketch_table(content);
        assert_eq!(genus, "Beta");
        assert_eq!(tax, "Alpha one");
    }

    #[test]
    fn test_species_table_sorted_by_taxonomy() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("all.tsv");
        let rows = vec![
            SpeciesRow {
                sample: "s2".to_string(),
                genus: "Klebsiella".to_string(),
                taxonomy: "Klebsiella pneumoniae".to_string(),
            },
            SpeciesRow {
                sample: "s1".to_string(),
                genus: "Escherichia".to_string(),
                taxonomy: "Escherichia coli".to_string(),
            },
        ];
        write_species_table(rows, &out).unwrap();
        let content = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "sample\tgenus\ttaxonomy");
        assert!(lines[1].starts_with("s1"));
        assert!(lines[2].starts_with("s2"));
    }
}
