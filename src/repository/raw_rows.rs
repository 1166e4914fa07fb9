use std::fs;

use crate::crawlers::CatalogSection;
use crate::domain::assessment::{RawRow, ScrapedRecord};
use crate::repository::errors::{RepositoryError, RepositoryResult};
use crate::repository::{FileRepository, RawRowReader, RawRowWriter};

impl RawRowWriter for FileRepository {
    fn write_raw_rows(&self, section: &CatalogSection, rows: &[RawRow]) -> RepositoryResult<usize> {
        let path = self.raw_rows_path(section);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staging = path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&staging)?;
        for row in rows {
            writer.serialize(ScrapedRecord::from(row))?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&staging, &path)?;

        log::info!("Saved {} rows of section '{}' to {}", rows.len(), section.label, path.display());
        Ok(rows.len())
    }
}

impl RawRowReader for FileRepository {
    /// Reads the section's rows; malformed lines are logged and skipped.
    fn list_raw_rows(&self, section: &CatalogSection) -> RepositoryResult<Vec<ScrapedRecord>> {
        let path = self.raw_rows_path(section);
        if !path.exists() {
            return Err(RepositoryError::NotFound(path.display().to_string()));
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut records = Vec::new();
        for (line, result) in reader.deserialize::<ScrapedRecord>().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping line {} of {}: {e}", line + 2, path.display()),
            }
        }
        Ok(records)
    }
}
