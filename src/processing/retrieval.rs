use serde::{Deserialize, Serialize};

use crate::DEFAULT_TOP_K;
use crate::domain::assessment::{CanonicalAssessment, Recommendation};
use crate::processing::embedding::{EmbeddingError, TextEmbedder, normalize_embedding};
use crate::processing::index::{CatalogIndex, IndexError};

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("Query must not be empty")]
    InvalidQuery,

    #[error("Catalog is empty")]
    EmptyCatalog,

    #[error("Index was built with model '{index}' but the embedder runs '{embedder}'")]
    ModelMismatch { index: String, embedder: String },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Everything a query needs, loaded once and shared read-only.
pub struct RecommenderContext<E> {
    embedder: E,
    index: CatalogIndex,
}

impl<E: TextEmbedder> RecommenderContext<E> {
    pub fn new(embedder: E, index: CatalogIndex) -> Result<Self, RecommendError> {
        if embedder.model_name() != index.manifest().model {
            return Err(RecommendError::ModelMismatch {
                index: index.manifest().model.clone(),
                embedder: embedder.model_name().to_string(),
            });
        }
        Ok(Self { embedder, index })
    }

    pub fn catalog(&self) -> &[CanonicalAssessment] {
        self.index.catalog()
    }

    /// Returns the catalog entries nearest to `query`, best match first.
    ///
    /// `k` defaults to [`DEFAULT_TOP_K`] and never exceeds the catalog size.
    pub fn recommend(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RecommendError::InvalidQuery);
        }
        if self.index.is_empty() {
            return Err(RecommendError::EmptyCatalog);
        }

        let k = k.unwrap_or(DEFAULT_TOP_K).min(self.index.len());
        let embedding = self
            .embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .map(|value| normalize_embedding(&value))
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))?;

        let neighbors = self.index.search(&embedding, k)?;
        let catalog = self.index.catalog();

        Ok(neighbors
            .into_iter()
            .map(|(position, distance)| Recommendation {
                assessment: catalog[position].clone(),
                distance,
            })
            .collect())
    }
}

/// A recommendation request received over the wire.
#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RecommendResponse {
    Recommendations {
        recommendations: Vec<CanonicalAssessment>,
    },
    Error {
        error: String,
    },
}

/// Answers one JSON-encoded [`RecommendRequest`] with a JSON-encoded
/// [`RecommendResponse`].
pub fn handle_recommend_request<E: TextEmbedder>(
    context: &RecommenderContext<E>,
    payload: &[u8],
) -> Vec<u8> {
    let response = match serde_json::from_slice::<RecommendRequest>(payload) {
        Ok(request) => match context.recommend(&request.query, request.k) {
            Ok(recommendations) => {
                log::info!(
                    "Recommended {} assessments for query '{}'",
                    recommendations.len(),
                    request.query.trim()
                );
                RecommendResponse::Recommendations {
                    recommendations: recommendations
                        .into_iter()
                        .map(|recommendation| recommendation.assessment)
                        .collect(),
                }
            }
            Err(e) => {
                log::warn!("Failed to recommend for query '{}': {e}", request.query);
                RecommendResponse::Error {
                    error: e.to_string(),
                }
            }
        },
        Err(e) => {
            log::error!("Failed to parse JSON: {e}");
            RecommendResponse::Error {
                error: format!("Invalid request: {e}"),
            }
        }
    };

    serde_json::to_vec(&response)
        .unwrap_or_else(|e| format!(r#"{{"error":"Failed to encode response: {e}"}}"#).into_bytes())
}
