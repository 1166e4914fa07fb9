use std::path::PathBuf;

use serde::Deserialize;

pub mod embedding;
pub mod evaluation;
pub mod index;
pub mod normalize;
pub mod pipeline;
pub mod retrieval;

/// Jobs accepted on the pipeline socket.
#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
pub enum PipelineMessage {
    /// Scrape every configured section into its raw CSV.
    Scrape,
    /// Rebuild the canonical catalog from the raw CSVs.
    Normalize,
    /// Embed the canonical catalog and replace the stored index.
    BuildIndex,
    /// `Scrape`, `Normalize` and `BuildIndex` in order.
    Refresh,
    /// Score the stored index against labelled queries read from a file.
    Evaluate(PathBuf),
}

impl PipelineMessage {
    /// Whether a successful run of this job replaces the stored index.
    pub fn rebuilds_index(&self) -> bool {
        matches!(self, PipelineMessage::BuildIndex | PipelineMessage::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::PipelineMessage;

    #[test]
    fn messages_parse_from_json() {
        let scrape: PipelineMessage = serde_json::from_str(r#""Scrape""#).unwrap();
        let evaluate: PipelineMessage =
            serde_json::from_str(r#"{"Evaluate": "data/eval_cases.json"}"#).unwrap();

        assert_eq!(scrape, PipelineMessage::Scrape);
        assert_eq!(
            evaluate,
            PipelineMessage::Evaluate(PathBuf::from("data/eval_cases.json"))
        );
        assert!(PipelineMessage::Refresh.rebuilds_index());
        assert!(!evaluate.rebuilds_index());
    }

    #[test]
    fn unknown_job_is_rejected() {
        assert!(serde_json::from_str::<PipelineMessage>(r#""Train""#).is_err());
    }
}
