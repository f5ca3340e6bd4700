//! Listing page extraction: country and capital pairs from tables.

use scraper::Html;
use std::collections::HashSet;
use tracing::debug;

use super::html;
use super::rules::ListingRules;
use crate::error::ParseError;
use crate::normalize::{normalize_key, strip_noise};
use crate::types::{document::RawDocument, record::EntityStub};

/// Stubs read from a listing, plus how many rows were unusable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub stubs: Vec<EntityStub>,

    /// Data rows with too few cells, an empty name, or a repeated country
    pub skipped_rows: usize,
}

/// Parse every listing table in `document` into entity stubs.
///
/// Header rows (no `<td>` cells) are ignored. A country listed twice keeps
/// its first row. Fails if no table carries the configured class or if the
/// tables yield no usable row.
pub fn extract_listing(document: &RawDocument, rules: &ListingRules) -> Result<Listing, ParseError> {
    let page = Html::parse_document(&document.body);
    let tables: Vec<_> =
        html::select_with_class(&page, &html::TABLE, &rules.table_class).collect();
    if tables.is_empty() {
        return Err(ParseError::new(
            &document.locator,
            format!("no table with class '{}'", rules.table_class),
        ));
    }

    let mut listing = Listing::default();
    let mut seen: HashSet<String> = HashSet::new();

    for table in &tables {
        for row in html::rows(*table) {
            let cells: Vec<_> = html::child_elements(row, &["td"]).collect();
            if cells.is_empty() {
                continue;
            }
            if cells.len() < rules.min_cells() {
                listing.skipped_rows += 1;
                continue;
            }

            let country = strip_noise(&html::text(cells[rules.country_column]));
            let capital = strip_noise(&html::text(cells[rules.capital_column]));
            if country.is_empty() || capital.is_empty() {
                listing.skipped_rows += 1;
                continue;
            }

            if !seen.insert(normalize_key(&country)) {
                listing.skipped_rows += 1;
                continue;
            }

            listing.stubs.push(EntityStub::new(country, capital));
        }
    }

    debug!(
        locator = %document.locator,
        tables = tables.len(),
        stubs = listing.stubs.len(),
        skipped = listing.skipped_rows,
        "Listing extracted"
    );

    if listing.stubs.is_empty() {
        return Err(ParseError::new(
            &document.locator,
            "listing tables contain no usable rows",
        ));
    }

    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <table class="wikitable sortable">
          <tbody>
          <tr><th>№</th><th>Государство</th><th>Столица</th></tr>
          <tr><td>1</td><td><a href="/wiki/Франция">Франция</a><sup class="reference">[1]</sup></td><td><a href="/wiki/Париж">Париж</a></td></tr>
          <tr><td>2</td><td>Италия [прим. 2]</td><td>Рим</td></tr>
          <tr><td>3</td><td>Broken row</td></tr>
          </tbody>
        </table>
        <table class="wikitable">
          <tr><td>4</td><td>Франция</td><td>Париж</td></tr>
          <tr><td>5</td><td>  </td><td>Нигде</td></tr>
          <tr><td>6</td><td>Япония</td><td>Токио</td></tr>
        </table>
        </body></html>
    "#;

    fn doc(body: &str) -> RawDocument {
        RawDocument::new("https://ru.wikipedia.org/wiki/Список", body)
    }

    #[test]
    fn test_extract_listing() {
        let listing = extract_listing(&doc(LISTING), &ListingRules::default()).unwrap();

        assert_eq!(
            listing.stubs,
            vec![
                EntityStub::new("Франция", "Париж"),
                EntityStub::new("Италия", "Рим"),
                EntityStub::new("Япония", "Токио"),
            ]
        );
        // short row, duplicate Франция, empty name
        assert_eq!(listing.skipped_rows, 3);
    }

    #[test]
    fn test_missing_table_is_parse_error() {
        let err = extract_listing(&doc("<p>Nothing here</p>"), &ListingRules::default())
            .unwrap_err();
        assert!(err.reason.contains("wikitable"));
        assert_eq!(err.locator, "https://ru.wikipedia.org/wiki/Список");
    }

    #[test]
    fn test_table_without_rows_is_parse_error() {
        let body = r#"<table class="wikitable"><tr><th>Only header</th></tr></table>"#;
        assert!(extract_listing(&doc(body), &ListingRules::default()).is_err());
    }

    #[test]
    fn test_nested_table_rows_are_not_listing_rows() {
        let body = r#"<table class="wikitable">
            <tr><td>1</td><td>Перу<table><tr><td>a</td><td>b</td><td>c</td></tr></table></td><td>Лима</td></tr>
            </table>"#;
        let listing = extract_listing(&doc(body), &ListingRules::default()).unwrap();

        assert_eq!(listing.stubs.len(), 1);
        assert_eq!(listing.skipped_rows, 0);
    }

    #[test]
    fn test_custom_columns() {
        let body = r#"<table class="capitals"><tr><td>Перу</td><td>Лима</td></tr></table>"#;
        let rules = ListingRules::default()
            .with_table_class("capitals")
            .with_columns(0, 1);

        let listing = extract_listing(&doc(body), &rules).unwrap();
        assert_eq!(listing.stubs, vec![EntityStub::new("Перу", "Лима")]);
    }
}
