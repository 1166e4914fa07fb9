use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{InitOptions, TextEmbedding};

use crate::domain::assessment::{CanonicalAssessment, DURATION_SENTINEL};

/// Version of [`assessment_embedding_text`].
///
/// Indexes record the version they were built with and refuse to load
/// under a different one; bump it whenever the text changes.
pub const EMBEDDING_TEMPLATE_VERSION: u32 = 1;

/// Model used when the configuration does not name one.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Build the text describing an assessment for embedding.
///
/// The text includes the following fields in order: name, test type,
/// remote testing, adaptive support and duration.
pub fn assessment_embedding_text(assessment: &CanonicalAssessment) -> String {
    let duration = assessment
        .duration
        .map_or_else(|| DURATION_SENTINEL.to_string(), |minutes| minutes.to_string());
    format!(
        "{} {} Remote:{} Adaptive:{} Duration:{duration}",
        assessment.name,
        assessment.test_type,
        yes_no(assessment.remote_testing),
        yes_no(assessment.adaptive_support),
    )
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// Normalize a vector to unit length.
///
/// Returns the original vector when the norm is zero.
pub fn normalize_embedding(vec: &[f32]) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vec.to_vec()
    } else {
        vec.iter().map(|x| x / norm).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// A text-to-vector model.
///
/// Implementations return one vector per input text, in input order, all
/// of the same length.
pub trait TextEmbedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

impl<E: TextEmbedder + ?Sized> TextEmbedder for &E {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed(texts)
    }
}

/// [`TextEmbedder`] running a local ONNX model through `fastembed`.
///
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
}

impl FastEmbedder {
    /// Loads `model_name`, downloading it into `cache_dir` on first use.
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self, EmbeddingError> {
        let mut options =
            InitOptions::new(parse_model_name(model_name)?).with_show_download_progress(false);
        if let Some(cache_dir) = cache_dir {
            options = options.with_cache_dir(cache_dir);
        }

        let model =
            TextEmbedding::try_new(options).map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
        })
    }
}

impl TextEmbedder for FastEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {e}"))
        })?;

        model
            .embed(texts, None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }
}

fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        _ => Err(EmbeddingError::InvalidModel(format!(
            "Unknown model: {name}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-large"
        ))),
    }
}
