use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::crawlers::CatalogSection;
use crate::domain::assessment::{CanonicalAssessment, RawRow, ScrapedRecord};
use crate::processing::index::CatalogIndex;
use crate::repository::errors::{RepositoryError, RepositoryResult};

pub mod catalog;
pub mod errors;
pub mod index;
pub mod raw_rows;

pub trait RawRowWriter {
    /// Replaces the scraped rows stored for `section`.
    fn write_raw_rows(&self, section: &CatalogSection, rows: &[RawRow]) -> RepositoryResult<usize>;
}

pub trait RawRowReader {
    fn list_raw_rows(&self, section: &CatalogSection) -> RepositoryResult<Vec<ScrapedRecord>>;
}

pub trait CatalogReader {
    fn list_assessments(&self) -> RepositoryResult<Vec<CanonicalAssessment>>;
}

pub trait CatalogWriter {
    fn replace_assessments(&self, catalog: &[CanonicalAssessment]) -> RepositoryResult<usize>;
}

pub trait IndexReader {
    fn load_index(&self) -> RepositoryResult<CatalogIndex>;
}

pub trait IndexWriter {
    /// Replaces the stored index and its catalog copy as one unit.
    fn replace_index(&self, index: &CatalogIndex) -> RepositoryResult<()>;
}

/// Pipeline artifacts kept as plain files under one data directory.
///
/// ```text
/// <root>/raw/<section>.csv
/// <root>/assessments_clean.json
/// <root>/embedding_index/{index.usearch,assessments.json,manifest.json}
/// ```
#[derive(Clone, Debug)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn raw_rows_path(&self, section: &CatalogSection) -> PathBuf {
        self.root.join("raw").join(format!("{}.csv", section.slug))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("assessments_clean.json")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("embedding_index")
    }
}

/// Reads a JSON document, reporting a missing file as
/// [`RepositoryError::NotFound`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> RepositoryResult<T> {
    if !path.exists() {
        return Err(RepositoryError::NotFound(path.display().to_string()));
    }
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `value` as pretty JSON next to `path`, then renames it into place.
pub(crate) fn write_json_atomically<T>(path: &Path, value: &T) -> RepositoryResult<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("json.tmp");
    let mut writer = BufWriter::new(fs::File::create(&staging)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    fs::rename(&staging, path)?;
    Ok(())
}
