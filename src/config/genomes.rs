use std::collections::HashMap;
use std::path::PathBuf;
use lazy_static::lazy_static;

use crate::config::defs::PipelineError;

lazy_static! {
    /// Registered reference genomes, keyed by the value accepted by `--genome`.
    /// Values are FASTA filenames resolved against `--genome_base`.
    pub static ref GENOMES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("Escherichia_coli_K12", "Escherichia_coli_K12_MG1655.fasta");
        m.insert("Klebsiella_pneumoniae", "Klebsiella_pneumoniae_HS11286.fasta");
        m.insert("Staphylococcus_aureus", "Staphylococcus_aureus_NCTC8325.fasta");
        m.insert("Salmonella_enterica", "Salmonella_enterica_LT2.fasta");
        m.insert("Listeria_monocytogenes", "Listeria_monocytogenes_EGD-e.fasta");
        m.insert("Pseudomonas_aeruginosa", "Pseudomonas_aeruginosa_PAO1.fasta");
        m.insert("Mycobacterium_tuberculosis", "Mycobacterium_tuberculosis_H37Rv.fasta");

        m
    };
}

/// Looks up a genome key and returns the reference FASTA path under `base`.
///
/// # Arguments
///
/// * `key` - Genome key as given on the command line.
/// * `base` - Directory holding the registered reference FASTAs.
///
/// # Returns
/// Resolved path, or InvalidConfig naming the unknown key.
pub fn resolve_genome(key: &str, base: &PathBuf) -> Result<PathBuf, PipelineError> {
    match GENOMES.get(key) {
        Some(file_name) => Ok(base.join(file_name)),
        None => {
            let mut known: Vec<&str> = GENOMES.keys().copied().collect();
            known.sort_unstable();
            Err(PipelineError::InvalidConfig(format!(
                "Genome '{}' is not registered. Known genomes: {}",
                key,
                known.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_genome() {
        let base = PathBuf::from("/refs");
        let path = resolve_genome("Escherichia_coli_K12", &base).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/refs/Escherichia_coli_K12_MG1655.fasta")
        );
    }

    #[test]
    fn test_resolve_unknown_genome() {
        let base = PathBuf::from("/refs");
        let err = resolve_genome("Vibrio_cholerae", &base).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Vibrio_cholerae"));
        assert!(msg.contains("not registered"));
    }
}
