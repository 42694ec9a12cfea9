use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defs::PipelineError;

/// Builds `<base_dir>/<base_name><sep><suffix>`, or just the joined name
/// when no suffix is given.
pub fn file_path_manipulator(
    base_name: &str,
    base_dir: &Path,
    suffix: Option<&str>,
    sep: &str,
) -> PathBuf {
    match suffix {
        Some(suffix) => base_dir.join(format!("{}{}{}", base_name, sep, suffix)),
        None => base_dir.join(base_name),
    }
}

/// Creates a directory tree, mapping failures into the pipeline error type.
pub fn ensure_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|e| {
        PipelineError::IOError(format!("Cannot create {}: {}", path.display(), e))
    })
}

/// Per-sample output directory under the run's output root.
pub fn sample_dir(out_dir: &Path, sample_id: &str, stage: &str) -> PathBuf {
    out_dir.join(sample_id).join(stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_manipulator() {
        let dir = Path::new("/out");
        assert_eq!(
            file_path_manipulator("s1", dir, Some("trimmed_R1.fastq.gz"), "_"),
            PathBuf::from("/out/s1_trimmed_R1.fastq.gz")
        );
        assert_eq!(
            file_path_manipulator("s1", dir, None, "_"),
            PathBuf::from("/out/s1")
        );
    }

    #[test]
    fn test_sample_dir() {
        assert_eq!(
            sample_dir(Path::new("/results"), "s1", "fastqc"),
            PathBuf::from("/results/s1/fastqc")
        );
    }
}
