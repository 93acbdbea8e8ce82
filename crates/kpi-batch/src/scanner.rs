//! Recursive discovery of recording files
//!
//! Recordings are named `<subject>_<G|B>_<NNN>.txt`. Every other `.txt`
//! file under the input directory is reported as skipped.

use anyhow::{bail, Context, Result};
use kpi_core::{Condition, RecordingMeta};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A recording file and the identity parsed from its name
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub meta: RecordingMeta,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Matching files, sorted by path
    pub files: Vec<ScannedFile>,
    /// `.txt` files whose name does not follow the convention
    pub skipped: Vec<PathBuf>,
}

impl ScanResult {
    pub fn scanned(&self) -> usize {
        self.files.len() + self.skipped.len()
    }
}

pub struct FilenameParser {
    pattern: Regex,
}

impl FilenameParser {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"^(.+?)_([GgBb])_(\d{3})\.txt$").context("invalid file name pattern")?;
        Ok(Self { pattern })
    }

    /// Recording identity encoded in `filename`, if it follows the convention
    pub fn parse(&self, filename: &str) -> Option<RecordingMeta> {
        let caps = self.pattern.captures(filename)?;
        let subject = caps.get(1)?.as_str();
        let condition = caps.get(2)?.as_str().chars().next().and_then(Condition::from_letter)?;
        let trial = caps.get(3)?.as_str().parse().ok()?;
        Some(RecordingMeta::new(subject, condition, trial, filename))
    }
}

/// Walk `root` recursively and classify every `.txt` file.
///
/// Unreadable directory entries are logged and skipped; only a missing or
/// non-directory root is an error.
pub fn scan_directory(root: &Path, parser: &FilenameParser) -> Result<ScanResult> {
    if !root.is_dir() {
        bail!("input directory {} does not exist", root.display());
    }

    let mut result = ScanResult::default();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "cannot read directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_txt = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("txt"));
        if !is_txt {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        match parser.parse(&name) {
            Some(meta) => {
                debug!(file = %path.display(), recording = %meta, "found recording");
                result.files.push(ScannedFile { path: path.to_path_buf(), meta });
            }
            None => {
                warn!(file = %path.display(), "file name does not match <subject>_<G|B>_<NNN>.txt, skipped");
                result.skipped.push(path.to_path_buf());
            }
        }
    }

    result.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_filename() {
        let parser = FilenameParser::new().unwrap();

        let meta = parser.parse("S01_G_003.txt").unwrap();
        assert_eq!(meta.subject, "S01");
        assert_eq!(meta.condition, Condition::Positive);
        assert_eq!(meta.trial, 3);
        assert_eq!(meta.filename, "S01_G_003.txt");

        let meta = parser.parse("P_07_b_120.txt").unwrap();
        assert_eq!(meta.subject, "P_07");
        assert_eq!(meta.condition, Condition::Negative);
        assert_eq!(meta.trial, 120);
    }

    #[test]
    fn test_reject_bad_names() {
        let parser = FilenameParser::new().unwrap();
        for name in ["S01_X_001.txt", "S01_G_01.txt", "S01_G_001.csv", "_G_001.txt", "notes.txt"] {
            assert!(parser.parse(name).is_none(), "{} should not parse", name);
        }
    }

    #[test]
    fn test_scan_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("S02");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("S01_G_001.txt"), "").unwrap();
        fs::write(nested.join("S02_B_002.txt"), "").unwrap();
        fs::write(dir.path().join("readme.txt"), "").unwrap();
        fs::write(dir.path().join("S01_G_001.csv"), "").unwrap();

        let parser = FilenameParser::new().unwrap();
        let result = scan_directory(dir.path(), &parser).unwrap();
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.scanned(), 3);
        assert!(result.files.iter().any(|f| f.meta.subject == "S02"));
    }

    #[test]
    fn test_missing_root() {
        let parser = FilenameParser::new().unwrap();
        assert!(scan_directory(Path::new("/definitely/not/here"), &parser).is_err());
    }
}
