//! Parsing of catalog table rows from a snapshot of the section's body.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::crawlers::normalize_whitespace;
use crate::domain::assessment::{DURATION_SENTINEL, RawRow};

/// Data rows carry one of two id attributes; header and spacer rows carry neither.
pub const ROW_SELECTOR: &str = "tr[data-entity-id], tr[data-course-id]";

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(ROW_SELECTOR).expect("static selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("static selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("static selector"));
static SUPPORT_INDICATOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.catalogue__circle").expect("static selector"));
static CATEGORY_KEY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.product-catalogue__key").expect("static selector"));

/// Name, remote testing, adaptive/IRT and test type.
const REQUIRED_CELLS: usize = 4;

/// A row that could not be turned into a [`RawRow`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("row has {found} cells, expected at least 4")]
    TooFewCells { found: usize },
}

/// Parses every data row of a `<tbody>` snapshot.
///
/// Results keep document order; failures are returned in place so the
/// caller can log and skip them without losing the rest of the page.
pub fn parse_rows(tbody_html: &str) -> Vec<Result<RawRow, RowError>> {
    let fragment = Html::parse_fragment(&format!("<table>{tbody_html}</table>"));
    fragment.select(&ROW).map(parse_row).collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    normalize_whitespace(&cell.text().collect::<String>())
}

fn parse_row(row: ElementRef<'_>) -> Result<RawRow, RowError> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
    if cells.len() < REQUIRED_CELLS {
        return Err(RowError::TooFewCells { found: cells.len() });
    }

    let (name, url) = match cells[0].select(&LINK).next() {
        Some(link) => {
            let href = link
                .value()
                .attr("href")
                .map(str::trim)
                .filter(|href| !href.is_empty())
                .map(str::to_string);
            (cell_text(link), href)
        }
        None => (cell_text(cells[0]), None),
    };

    let keys: String = cells[3]
        .select(&CATEGORY_KEY)
        .map(|key| key.text().collect::<String>().trim().to_string())
        .collect();
    let test_type = if keys.is_empty() {
        cell_text(cells[3])
    } else {
        keys
    };

    Ok(RawRow {
        name,
        url,
        remote_testing: cells[1].select(&SUPPORT_INDICATOR).next().is_some(),
        adaptive_support: cells[2].select(&SUPPORT_INDICATOR).next().is_some(),
        test_type,
        duration: DURATION_SENTINEL.to_string(),
    })
}
