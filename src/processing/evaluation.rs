//! Offline quality metrics for the recommender.

use serde::{Deserialize, Serialize};

use crate::processing::embedding::TextEmbedder;
use crate::processing::retrieval::{RecommendError, RecommenderContext};

/// A query together with the assessment names a good answer contains.
#[derive(Clone, Debug, Deserialize)]
pub struct EvaluationCase {
    pub query: String,
    pub relevant_assessments: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryScore {
    pub query: String,
    pub recall: f64,
    pub average_precision: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct EvaluationReport {
    pub k: usize,
    pub queries: Vec<QueryScore>,
    pub mean_recall: f64,
    pub map: f64,
}

/// Share of `relevant` found among the first `k` predictions.
pub fn recall_at_k(relevant: &[String], predicted: &[String], k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let top_k = &predicted[..k.min(predicted.len())];
    let hits = relevant.iter().filter(|item| top_k.contains(item)).count();
    hits as f64 / relevant.len() as f64
}

/// Precision averaged over the ranks of the hits within the first `k`
/// predictions, normalized by `min(|relevant|, k)`.
pub fn average_precision_at_k(relevant: &[String], predicted: &[String], k: usize) -> f64 {
    if relevant.is_empty() || k == 0 {
        return 0.0;
    }
    let mut hits = 0;
    let mut score = 0.0;
    for (rank, item) in predicted.iter().take(k).enumerate() {
        if relevant.contains(item) {
            hits += 1;
            score += hits as f64 / (rank + 1) as f64;
        }
    }
    score / relevant.len().min(k) as f64
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let count = values.len();
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

/// Scores `context` against every case at cut-off `k`.
///
/// Queries the context rejects as invalid count as empty predictions;
/// any other failure aborts the evaluation.
pub fn evaluate<E: TextEmbedder>(
    context: &RecommenderContext<E>,
    cases: &[EvaluationCase],
    k: usize,
) -> Result<EvaluationReport, RecommendError> {
    let mut queries = Vec::with_capacity(cases.len());
    for case in cases {
        let predicted: Vec<String> = match context.recommend(&case.query, Some(k)) {
            Ok(recommendations) => recommendations
                .into_iter()
                .map(|recommendation| recommendation.assessment.name)
                .collect(),
            Err(RecommendError::InvalidQuery) => {
                log::warn!("Skipping invalid evaluation query '{}'", case.query);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let score = QueryScore {
            query: case.query.clone(),
            recall: recall_at_k(&case.relevant_assessments, &predicted, k),
            average_precision: average_precision_at_k(&case.relevant_assessments, &predicted, k),
        };
        log::info!(
            "Query '{}': recall@{k}={:.4}, AP@{k}={:.4}",
            score.query,
            score.recall,
            score.average_precision
        );
        queries.push(score);
    }

    Ok(EvaluationReport {
        k,
        mean_recall: mean(queries.iter().map(|score| score.recall)),
        map: mean(queries.iter().map(|score| score.average_precision)),
        queries,
    })
}
