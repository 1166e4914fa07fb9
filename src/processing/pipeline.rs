//! Pipeline jobs: one function per stage plus the message dispatcher.

use std::path::Path;

use url::Url;

use crate::crawlers::catalog::CatalogCrawler;
use crate::crawlers::chrome::{ChromeOptions, ChromeSession};
use crate::crawlers::{BrowserSession, CatalogSection, CrawlerError, ScrapeTimeouts};
use crate::models::config::ServerConfig;
use crate::processing::PipelineMessage;
use crate::processing::embedding::{EmbeddingError, TextEmbedder};
use crate::processing::evaluation::{EvaluationCase, EvaluationReport, evaluate};
use crate::processing::index::{CatalogIndex, IndexError, embed_catalog};
use crate::processing::normalize::{NormalizeStats, normalize_records};
use crate::processing::retrieval::{RecommendError, RecommenderContext};
use crate::repository::errors::RepositoryError;
use crate::repository::{
    CatalogReader, CatalogWriter, IndexReader, IndexWriter, RawRowReader, RawRowWriter, read_json,
};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Crawler(#[from] CrawlerError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Recommend(#[from] RecommendError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("No catalog section was scraped successfully")]
    NothingScraped,

    #[error("No scraped records to normalize")]
    NoRecords,
}

/// Scrapes `sections` in order through one browser session and saves each
/// section that completes. A failed, truncated or empty section leaves its
/// previously saved rows untouched.
///
/// Returns the number of sections saved.
pub fn scrape_sections<S, R>(
    crawler: &CatalogCrawler,
    session: &mut S,
    sections: &[CatalogSection],
    repo: &R,
) -> usize
where
    S: BrowserSession + ?Sized,
    R: RawRowWriter,
{
    let mut saved = 0;
    for section in sections {
        let rows = match crawler.scrape_section(session, section) {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("Failed to scrape section '{}': {e}", section.label);
                continue;
            }
        };
        if rows.is_empty() {
            log::warn!("Section '{}' has no rows, keeping saved data", section.label);
            continue;
        }
        match repo.write_raw_rows(section, &rows) {
            Ok(_) => saved += 1,
            Err(e) => log::error!("Error saving rows of section '{}': {e}", section.label),
        }
    }
    saved
}

/// Launches a browser and scrapes every configured section.
pub fn process_scrape<R>(config: &ServerConfig, repo: &R) -> Result<usize, PipelineError>
where
    R: RawRowWriter,
{
    let crawler = CatalogCrawler::new(
        &config.catalog.catalog_url,
        ScrapeTimeouts::from(&config.catalog.timeouts),
    )?;
    let mut session = ChromeSession::launch(&ChromeOptions::from(&config.browser))?;

    match scrape_sections(&crawler, &mut session, &config.catalog.sections, repo) {
        0 => Err(PipelineError::NothingScraped),
        saved => Ok(saved),
    }
}

/// Rebuilds the canonical catalog from the saved rows of `sections`, read
/// in order. Sections without saved rows are skipped.
pub fn normalize_sections<R>(
    sections: &[CatalogSection],
    origin: &Url,
    repo: &R,
) -> Result<NormalizeStats, PipelineError>
where
    R: RawRowReader + CatalogWriter,
{
    let mut records = Vec::new();
    for section in sections {
        match repo.list_raw_rows(section) {
            Ok(rows) => {
                log::info!("Read {} rows of section '{}'", rows.len(), section.label);
                records.extend(rows);
            }
            Err(RepositoryError::NotFound(path)) => {
                log::warn!("No saved rows for section '{}' at {path}", section.label);
            }
            Err(e) => return Err(e.into()),
        }
    }
    if records.is_empty() {
        return Err(PipelineError::NoRecords);
    }

    let (catalog, stats) = normalize_records(records, origin);
    log::info!(
        "Normalized {} records: kept {}, dropped {} without a name, {} duplicates",
        stats.records,
        stats.kept,
        stats.dropped_blank_name,
        stats.duplicates
    );
    repo.replace_assessments(&catalog)?;
    Ok(stats)
}

/// Embeds the saved catalog and replaces the stored index.
pub fn build_index<E, R>(embedder: &E, batch_size: usize, repo: &R) -> Result<usize, PipelineError>
where
    E: TextEmbedder + ?Sized,
    R: CatalogReader + IndexWriter,
{
    let catalog = repo.list_assessments()?;
    log::info!(
        "Embedding {} assessments with {}",
        catalog.len(),
        embedder.model_name()
    );
    let embedded = embed_catalog(catalog, embedder, batch_size)?;
    let index = CatalogIndex::build(embedded, embedder.model_name())?;
    repo.replace_index(&index)?;
    Ok(index.len())
}

/// Scores the stored index against the cases in `cases_path`.
pub fn run_evaluation<E, R>(
    embedder: E,
    cases_path: &Path,
    k: usize,
    repo: &R,
) -> Result<EvaluationReport, PipelineError>
where
    E: TextEmbedder,
    R: IndexReader,
{
    let cases: Vec<EvaluationCase> = read_json(cases_path)?;
    let context = RecommenderContext::new(embedder, repo.load_index()?)?;
    let report = evaluate(&context, &cases, k)?;
    log::info!(
        "Evaluated {} queries: mean recall@{k}={:.4}, MAP@{k}={:.4}",
        report.queries.len(),
        report.mean_recall,
        report.map
    );
    Ok(report)
}

/// Runs one pipeline job to completion.
pub fn process_pipeline_message<E, R>(
    msg: &PipelineMessage,
    config: &ServerConfig,
    embedder: &E,
    repo: &R,
) -> Result<(), PipelineError>
where
    E: TextEmbedder + ?Sized,
    R: RawRowReader + RawRowWriter + CatalogReader + CatalogWriter + IndexReader + IndexWriter,
{
    log::info!("Received pipeline job: {msg:?}");

    match msg {
        PipelineMessage::Scrape => {
            process_scrape(config, repo)?;
        }
        PipelineMessage::Normalize => {
            normalize_sections(&config.catalog.sections, &config.catalog.base_url()?, repo)?;
        }
        PipelineMessage::BuildIndex => {
            build_index(embedder, config.embedding.batch_size, repo)?;
        }
        PipelineMessage::Refresh => {
            let saved = process_scrape(config, repo)?;
            log::info!("Scraped {saved} of {} sections", config.catalog.sections.len());
            normalize_sections(&config.catalog.sections, &config.catalog.base_url()?, repo)?;
            build_index(embedder, config.embedding.batch_size, repo)?;
        }
        PipelineMessage::Evaluate(cases_path) => {
            run_evaluation(embedder, cases_path, config.embedding.top_k, repo)?;
        }
    }

    log::info!("Finished pipeline job: {msg:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use url::Url;

    use super::{PipelineError, normalize_sections};
    use crate::crawlers::CatalogSection;
    use crate::repository::{CatalogReader, FileRepository};

    const HEADER: &str =
        "Assessment Name,Assessment URL,Remote Testing Support,Adaptive/IRT Support,Test Type,Duration\n";

    fn section(slug: &str) -> CatalogSection {
        CatalogSection {
            label: slug.to_string(),
            slug: slug.to_string(),
            max_pages: 1,
            min_expected_pages: None,
        }
    }

    fn origin() -> Url {
        Url::parse("https://www.shl.com").unwrap()
    }

    #[test]
    fn sections_are_merged_in_order_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        let first = section("prepackaged");
        let second = section("individual");
        fs::create_dir_all(dir.path().join("raw")).unwrap();
        fs::write(
            repo.raw_rows_path(&first),
            format!("{HEADER}Account Manager Solution,/account-manager/,Yes,Yes,CPAB,49\n"),
        )
        .unwrap();
        fs::write(
            repo.raw_rows_path(&second),
            format!(
                "{HEADER}Java SE 8,/java-se-8/,Yes,No,K,N/A\n\
                 Account Manager Solution,/account-manager/,Yes,Yes,CPAB,49\n"
            ),
        )
        .unwrap();

        let stats = normalize_sections(&[first, second], &origin(), &repo).unwrap();

        assert_eq!(stats.kept, 2);
        assert_eq!(stats.duplicates, 1);
        let catalog = repo.list_assessments().unwrap();
        assert_eq!(catalog[0].name, "Account Manager Solution");
        assert_eq!(
            catalog[1].url.as_deref(),
            Some("https://www.shl.com/java-se-8/")
        );
    }

    #[test]
    fn missing_sections_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        let present = section("individual");
        fs::create_dir_all(dir.path().join("raw")).unwrap();
        fs::write(
            repo.raw_rows_path(&present),
            format!("{HEADER}OPQ32r,,Yes,No,P,25\n"),
        )
        .unwrap();

        let stats = normalize_sections(&[section("prepackaged"), present], &origin(), &repo).unwrap();

        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn nothing_to_normalize_keeps_the_saved_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());

        let result = normalize_sections(&[section("prepackaged")], &origin(), &repo);

        assert!(matches!(result, Err(PipelineError::NoRecords)));
        assert!(!repo.catalog_path().exists());
    }
}
