//! Vectors and catalog paired by position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::domain::assessment::CanonicalAssessment;
use crate::processing::embedding::{
    EMBEDDING_TEMPLATE_VERSION, EmbeddingError, TextEmbedder, assessment_embedding_text,
    normalize_embedding,
};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Vector index error: {0}")]
    Usearch(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Cannot index an empty catalog")]
    EmptyCatalog,

    #[error("Catalog has {catalog} entries but there are {vectors} vectors")]
    CountMismatch { catalog: usize, vectors: usize },

    #[error("Vector {position} has {got} dimensions, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        got: usize,
    },

    #[error("Index was built with template version {found}, this build uses {expected}")]
    TemplateVersion { found: u32, expected: u32 },

    #[error("Index key {0} does not address a catalog entry")]
    UnknownKey(u64),
}

fn usearch_error(error: impl std::fmt::Display) -> IndexError {
    IndexError::Usearch(error.to_string())
}

/// Options shared by freshly built and reloaded indexes.
pub fn index_options(dimensions: usize) -> IndexOptions {
    IndexOptions {
        dimensions,
        metric: MetricKind::L2sq,
        quantization: ScalarKind::F32,
        ..Default::default()
    }
}

/// Description of a built index, stored next to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub model: String,
    pub dimensions: usize,
    pub count: usize,
    pub template_version: u32,
    pub built_at: DateTime<Utc>,
}

/// The catalog together with one vector per entry, `vectors[i]` describing
/// `catalog[i]`.
#[derive(Clone, Debug)]
pub struct EmbeddedCatalog {
    catalog: Vec<CanonicalAssessment>,
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
}

impl EmbeddedCatalog {
    pub fn new(
        catalog: Vec<CanonicalAssessment>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if catalog.len() != vectors.len() {
            return Err(IndexError::CountMismatch {
                catalog: catalog.len(),
                vectors: vectors.len(),
            });
        }
        let dimensions = vectors.first().map(Vec::len).ok_or(IndexError::EmptyCatalog)?;
        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, vector)| vector.len() != dimensions || vector.is_empty())
        {
            return Err(IndexError::DimensionMismatch {
                position,
                expected: dimensions,
                got: vector.len(),
            });
        }

        Ok(Self {
            catalog,
            vectors,
            dimensions,
        })
    }
}

/// Embeds every assessment in catalog order, `batch_size` texts at a time.
pub fn embed_catalog<E>(
    catalog: Vec<CanonicalAssessment>,
    embedder: &E,
    batch_size: usize,
) -> Result<EmbeddedCatalog, IndexError>
where
    E: TextEmbedder + ?Sized,
{
    let texts: Vec<String> = catalog.iter().map(assessment_embedding_text).collect();

    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed(batch)?;
        if embedded.len() != batch.len() {
            return Err(IndexError::CountMismatch {
                catalog: batch.len(),
                vectors: embedded.len(),
            });
        }
        vectors.extend(embedded.iter().map(|vector| normalize_embedding(vector)));
        log::debug!("Embedded {}/{} assessments", vectors.len(), texts.len());
    }

    EmbeddedCatalog::new(catalog, vectors)
}

/// A searchable catalog: vector index keyed by catalog position.
pub struct CatalogIndex {
    index: Index,
    catalog: Vec<CanonicalAssessment>,
    manifest: IndexManifest,
}

impl CatalogIndex {
    /// Adds every vector under its catalog position.
    pub fn build(embedded: EmbeddedCatalog, model: &str) -> Result<Self, IndexError> {
        let index = Index::new(&index_options(embedded.dimensions)).map_err(usearch_error)?;
        index.reserve(embedded.vectors.len()).map_err(usearch_error)?;
        for (position, vector) in embedded.vectors.iter().enumerate() {
            index.add(position as u64, vector.as_slice()).map_err(usearch_error)?;
        }

        let manifest = IndexManifest {
            model: model.to_string(),
            dimensions: embedded.dimensions,
            count: embedded.catalog.len(),
            template_version: EMBEDDING_TEMPLATE_VERSION,
            built_at: Utc::now(),
        };

        Ok(Self {
            index,
            catalog: embedded.catalog,
            manifest,
        })
    }

    /// Reassembles an index read from storage, checking that its parts
    /// still belong together.
    pub fn from_parts(
        index: Index,
        catalog: Vec<CanonicalAssessment>,
        manifest: IndexManifest,
    ) -> Result<Self, IndexError> {
        if manifest.template_version != EMBEDDING_TEMPLATE_VERSION {
            return Err(IndexError::TemplateVersion {
                found: manifest.template_version,
                expected: EMBEDDING_TEMPLATE_VERSION,
            });
        }
        if index.size() != catalog.len() || manifest.count != catalog.len() {
            return Err(IndexError::CountMismatch {
                catalog: catalog.len(),
                vectors: index.size(),
            });
        }
        if index.dimensions() != manifest.dimensions {
            return Err(IndexError::DimensionMismatch {
                position: 0,
                expected: manifest.dimensions,
                got: index.dimensions(),
            });
        }

        Ok(Self {
            index,
            catalog,
            manifest,
        })
    }

    pub fn vectors(&self) -> &Index {
        &self.index
    }

    pub fn catalog(&self) -> &[CanonicalAssessment] {
        &self.catalog
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Returns up to `k` `(position, distance)` pairs, nearest first.
    ///
    /// Scans every stored vector rather than walking the HNSW graph, so the
    /// result is the true top `k`. Distances are Euclidean; equal distances
    /// are ordered by position so the ranking is stable.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        if query.len() != self.manifest.dimensions {
            return Err(IndexError::DimensionMismatch {
                position: 0,
                expected: self.manifest.dimensions,
                got: query.len(),
            });
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let neighbors = self.index.exact_search(query, k).map_err(usearch_error)?;

        let mut results = neighbors
            .keys
            .iter()
            .zip(neighbors.distances.iter())
            .map(|(&key, &distance)| {
                usize::try_from(key)
                    .ok()
                    .filter(|position| *position < self.catalog.len())
                    .map(|position| (position, distance.max(0.0).sqrt()))
                    .ok_or(IndexError::UnknownKey(key))
            })
            .collect::<Result<Vec<_>, _>>()?;

        results.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        Ok(results)
    }
}
