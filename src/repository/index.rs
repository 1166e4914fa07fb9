use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use usearch::Index;

use crate::domain::assessment::CanonicalAssessment;
use crate::processing::index::{CatalogIndex, IndexError, IndexManifest, index_options};
use crate::repository::errors::{RepositoryError, RepositoryResult};
use crate::repository::{FileRepository, IndexReader, IndexWriter, read_json, write_json_atomically};

const VECTORS_FILE: &str = "index.usearch";
const CATALOG_FILE: &str = "assessments.json";
const MANIFEST_FILE: &str = "manifest.json";

fn path_str(path: &Path) -> RepositoryResult<&str> {
    path.to_str().ok_or_else(|| {
        RepositoryError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Path is not valid UTF-8: {}", path.display()),
        ))
    })
}

/// Where the replaced index waits while a new one is moved into place.
fn previous_dir(target: &Path) -> PathBuf {
    target.with_extension("previous")
}

/// Moves `staging` to `target`, keeping the old directory aside until the
/// new one is in place.
fn swap_into_place(staging: &Path, target: &Path) -> io::Result<()> {
    let previous = previous_dir(target);
    if previous.exists() {
        fs::remove_dir_all(&previous)?;
    }
    if target.exists() {
        fs::rename(target, &previous)?;
    }
    fs::rename(staging, target)?;
    if previous.exists() {
        fs::remove_dir_all(&previous)?;
    }
    Ok(())
}

impl IndexWriter for FileRepository {
    fn replace_index(&self, index: &CatalogIndex) -> RepositoryResult<()> {
        let target = self.index_dir();
        let staging = target.with_extension("staging");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        index
            .vectors()
            .save(path_str(&staging.join(VECTORS_FILE))?)
            .map_err(|e| IndexError::Usearch(e.to_string()))?;
        write_json_atomically(&staging.join(CATALOG_FILE), index.catalog())?;
        write_json_atomically(&staging.join(MANIFEST_FILE), index.manifest())?;

        swap_into_place(&staging, &target)?;
        log::info!(
            "Saved index of {} assessments ({} dimensions) to {}",
            index.len(),
            index.manifest().dimensions,
            target.display()
        );
        Ok(())
    }
}

impl IndexReader for FileRepository {
    /// Loads the index, falling back to the replaced one while a swap is
    /// between its two renames.
    fn load_index(&self) -> RepositoryResult<CatalogIndex> {
        let mut dir = self.index_dir();
        if !dir.exists() && previous_dir(&dir).exists() {
            log::warn!("{} is being replaced, loading the previous index", dir.display());
            dir = previous_dir(&dir);
        }
        let manifest: IndexManifest = read_json(&dir.join(MANIFEST_FILE))?;
        let catalog: Vec<CanonicalAssessment> = read_json(&dir.join(CATALOG_FILE))?;

        let vectors_path = dir.join(VECTORS_FILE);
        if !vectors_path.exists() {
            return Err(RepositoryError::NotFound(vectors_path.display().to_string()));
        }
        let vectors = Index::new(&index_options(manifest.dimensions))
            .map_err(|e| IndexError::Usearch(e.to_string()))?;
        vectors
            .load(path_str(&vectors_path)?)
            .map_err(|e| IndexError::Usearch(e.to_string()))?;

        let index = CatalogIndex::from_parts(vectors, catalog, manifest)?;
        log::info!("Loaded index of {} assessments from {}", index.len(), dir.display());
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::domain::assessment::CanonicalAssessment;
    use crate::processing::index::{CatalogIndex, EmbeddedCatalog, IndexError};
    use crate::repository::errors::RepositoryError;
    use crate::repository::{FileRepository, IndexReader, IndexWriter};

    fn assessment(name: &str) -> CanonicalAssessment {
        CanonicalAssessment {
            name: name.to_string(),
            url: Some(format!("https://www.shl.com/{name}/")),
            remote_testing: true,
            adaptive_support: false,
            duration: Some(30),
            test_type: "K".to_string(),
        }
    }

    fn build(names: &[&str]) -> CatalogIndex {
        let catalog: Vec<_> = names.iter().map(|name| assessment(name)).collect();
        let vectors = (0..catalog.len())
            .map(|i| {
                let mut vector = vec![0.0_f32; 4];
                vector[i % 4] = 1.0;
                vector
            })
            .collect();
        CatalogIndex::build(EmbeddedCatalog::new(catalog, vectors).unwrap(), "test").unwrap()
    }

    #[test]
    fn reload_preserves_positional_pairing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        let index = build(&["first", "second", "third", "fourth"]);

        repo.replace_index(&index).unwrap();
        let loaded = repo.load_index().unwrap();

        assert_eq!(loaded.catalog(), index.catalog());
        assert_eq!(loaded.manifest(), index.manifest());
        for position in 0..4 {
            let mut query = vec![0.0_f32; 4];
            query[position] = 1.0;
            let nearest = loaded.search(&query, 1).unwrap();
            assert_eq!(nearest[0].0, position);
        }
    }

    #[test]
    fn replacing_an_index_leaves_no_staging_behind() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());

        repo.replace_index(&build(&["old"])).unwrap();
        repo.replace_index(&build(&["new", "newer"])).unwrap();

        let loaded = repo.load_index().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.catalog()[0].name, "new");
        assert!(!repo.index_dir().with_extension("staging").exists());
        assert!(!repo.index_dir().with_extension("previous").exists());
    }

    #[test]
    fn catalog_and_vectors_out_of_step_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.replace_index(&build(&["a", "b"])).unwrap();

        let catalog_path = repo.index_dir().join("assessments.json");
        let truncated = serde_json::to_string(&vec![assessment("a")]).unwrap();
        fs::write(&catalog_path, truncated).unwrap();

        assert!(matches!(
            repo.load_index(),
            Err(RepositoryError::Index(IndexError::CountMismatch { .. }))
        ));
    }

    #[test]
    fn index_set_aside_during_a_swap_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        repo.replace_index(&build(&["a", "b"])).unwrap();

        fs::rename(repo.index_dir(), repo.index_dir().with_extension("previous")).unwrap();

        let loaded = repo.load_index().unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn missing_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());

        assert!(matches!(repo.load_index(), Err(RepositoryError::NotFound(_))));
    }
}
