use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sheet_model::Marksheet;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const ARCHIVE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Append-only archive of finished marksheets, kept as a single JSON file
/// under the local data directory.
#[derive(Debug, Clone)]
pub struct MarksheetArchive {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArchiveEnvelope {
    version: u32,
    records: Vec<Marksheet>,
}

impl ArchiveEnvelope {
    fn empty() -> Self {
        Self { version: ARCHIVE_SCHEMA_VERSION, records: Vec::new() }
    }
}

/// Summary over the whole archive, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveStats {
    pub count: usize,
    pub mean_percentage: f32,
    /// Marksheet count per grade label, only for grades that occur.
    pub grade_distribution: BTreeMap<String, usize>,
}

impl MarksheetArchive {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "RedPen", "RedPen").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join("marksheets.json")
    }

    /// Appends one marksheet. Existing records are never modified; the file
    /// is replaced atomically so a crash cannot truncate the archive.
    pub fn append(&self, sheet: &Marksheet) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let mut envelope = self.load_envelope()?;
        envelope.records.push(sheet.clone());

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.root.join("marksheets.json.tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(tmp_path, self.archive_path())?;

        debug!(records = envelope.records.len(), "marksheet archived");
        Ok(())
    }

    /// All archived marksheets, newest first. An absent archive reads as
    /// empty.
    pub fn list(&self) -> Result<Vec<Marksheet>, StorageError> {
        let mut records = self.load_envelope()?.records;
        records.reverse();
        Ok(records)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        Ok(self.load_envelope()?.records.len())
    }

    pub fn stats(&self) -> Result<ArchiveStats, StorageError> {
        let records = self.load_envelope()?.records;

        let count = records.len();
        let mean_percentage = if count == 0 {
            0.0
        } else {
            records.iter().map(|sheet| sheet.percentage).sum::<f32>() / count as f32
        };

        let mut grade_distribution = BTreeMap::new();
        for sheet in &records {
            *grade_distribution.entry(sheet.grade.as_str().to_string()).or_insert(0) += 1;
        }

        Ok(ArchiveStats { count, mean_percentage, grade_distribution })
    }

    fn load_envelope(&self) -> Result<ArchiveEnvelope, StorageError> {
        let path = self.archive_path();
        if !path.exists() {
            return Ok(ArchiveEnvelope::empty());
        }

        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
