use crate::domain::assessment::CanonicalAssessment;
use crate::repository::errors::RepositoryResult;
use crate::repository::{CatalogReader, CatalogWriter, FileRepository, read_json, write_json_atomically};

impl CatalogReader for FileRepository {
    fn list_assessments(&self) -> RepositoryResult<Vec<CanonicalAssessment>> {
        read_json(&self.catalog_path())
    }
}

impl CatalogWriter for FileRepository {
    fn replace_assessments(&self, catalog: &[CanonicalAssessment]) -> RepositoryResult<usize> {
        let path = self.catalog_path();
        write_json_atomically(&path, catalog)?;
        log::info!("Saved {} assessments to {}", catalog.len(), path.display());
        Ok(catalog.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::assessment::CanonicalAssessment;
    use crate::repository::errors::RepositoryError;
    use crate::repository::{CatalogReader, CatalogWriter, FileRepository};

    #[test]
    fn replacing_the_catalog_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        let catalog = vec![
            CanonicalAssessment {
                name: "Verify G+".to_string(),
                url: None,
                remote_testing: true,
                adaptive_support: true,
                duration: Some(36),
                test_type: "A".to_string(),
            },
            CanonicalAssessment {
                name: "Java SE 8".to_string(),
                url: Some("https://www.shl.com/java-se-8/".to_string()),
                remote_testing: true,
                adaptive_support: false,
                duration: None,
                test_type: "K".to_string(),
            },
        ];

        repo.replace_assessments(&catalog).unwrap();
        repo.replace_assessments(&catalog[1..]).unwrap();

        assert_eq!(repo.list_assessments().unwrap(), catalog[1..]);
    }

    #[test]
    fn missing_catalog_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());

        assert!(matches!(repo.list_assessments(), Err(RepositoryError::NotFound(_))));
    }
}
