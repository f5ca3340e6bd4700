//! Detail page extraction: infobox fields and a bounded summary.
//!
//! Pure transform over the document body. Missing fields come back as
//! [`FieldValue::Unknown`], never as errors.

use scraper::{ElementRef, Html};

use super::html;
use super::rules::FieldRules;
use crate::normalize::{strip_annotations, strip_noise};
use crate::types::document::RawDocument;
use crate::types::record::{FieldValue, FieldValues};

/// Appended to a summary that was cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Everything read from one detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDetail {
    pub fields: FieldValues,

    /// Capital from the infobox, when a capital label is configured and found
    pub capital: Option<String>,

    pub summary: FieldValue,

    /// Whether an infobox was present at all
    pub has_infobox: bool,
}

/// One infobox cell flattened to text.
struct Cell {
    row: usize,
    /// A `<th>` cell
    is_header: bool,
    /// `<th>`, or the leading cell of a multi-cell row
    is_label: bool,
    text: String,
}

/// Flatten the infobox into cells in document order.
fn infobox_cells(infobox: ElementRef<'_>) -> Vec<Cell> {
    let mut cells = Vec::new();
    for (row, tr) in html::rows(infobox).enumerate() {
        let row_cells: Vec<_> = html::child_elements(tr, &["th", "td"]).collect();
        let multi = row_cells.len() > 1;
        cells.extend(row_cells.into_iter().enumerate().map(|(position, cell)| {
            let is_header = cell.value().name() == "th";
            Cell {
                row,
                is_header,
                is_label: is_header || (multi && position == 0),
                text: html::text(cell),
            }
        }));
    }
    cells
}

/// Value for the label at `index`: the next non-empty value cell in the
/// same row, else in the row right after it when that row is a sub-item
/// ("• Всего") rather than another `<th>` label.
fn value_after(cells: &[Cell], index: usize) -> Option<&str> {
    let label_row = cells[index].row;
    let is_value = |cell: &&Cell| !cell.is_label && !cell.text.is_empty();

    let rest = &cells[index + 1..];
    if let Some(cell) = rest.iter().take_while(|c| c.row == label_row).find(is_value) {
        return Some(cell.text.as_str());
    }

    let mut next_row = rest.iter().filter(|c| c.row == label_row + 1).peekable();
    match next_row.peek() {
        Some(first) if !first.is_header => {}
        _ => return None,
    }
    next_row.find(is_value).map(|cell| cell.text.as_str())
}

/// First non-empty paragraph of the article body, cut to the configured
/// length.
///
/// Only direct `<p>` children of the content container count, which leaves
/// out the infobox and hatnotes. Without a container the page body is used.
fn extract_summary(page: &Html, rules: &FieldRules) -> FieldValue {
    let container = html::select_with_class(page, &html::DIV, &rules.content_class)
        .next()
        .or_else(|| page.select(&html::BODY).next());
    let Some(container) = container else {
        return FieldValue::Unknown;
    };

    html::child_elements(container, &["p"])
        .map(|p| strip_noise(&html::text(p)))
        .find(|text| !text.is_empty())
        .map(|text| FieldValue::Known(truncate(&text, rules.summary_max_chars)))
        .unwrap_or(FieldValue::Unknown)
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}{}", cut.trim_end(), TRUNCATION_MARKER)
}

/// Read the detail fields, capital and summary from a country page.
///
/// For each field the first infobox label (in document order) matching any
/// of its patterns wins. A label with no value in its own row takes the
/// first value of the next row, as in "Население / • Оценка (2023) | N".
pub fn extract_detail(document: &RawDocument, rules: &FieldRules) -> ExtractedDetail {
    let mut fields = FieldValues::unknown();
    let mut capital = None;

    let page = Html::parse_document(&document.body);
    let infobox = html::select_with_class(&page, &html::TABLE, &rules.infobox_class).next();

    if let Some(infobox) = infobox {
        let cells = infobox_cells(infobox);
        let mut filled = Vec::new();

        for (index, cell) in cells.iter().enumerate() {
            if !cell.is_label || cell.text.is_empty() {
                continue;
            }

            let wanted: Vec<_> = rules
                .fields_for_label(&cell.text)
                .into_iter()
                .filter(|field| !filled.contains(field))
                .collect();
            let wants_capital = capital.is_none() && rules.is_capital_label(&cell.text);
            if wanted.is_empty() && !wants_capital {
                continue;
            }

            let Some(value) = value_after(&cells, index) else {
                continue;
            };

            for field in wanted {
                fields.set(field, FieldValue::from_text(strip_annotations(value)));
                filled.push(field);
            }
            if wants_capital {
                let name = strip_noise(value);
                if !name.is_empty() {
                    capital = Some(name);
                }
            }
        }
    }

    ExtractedDetail {
        fields,
        capital,
        summary: extract_summary(&page, rules),
        has_infobox: infobox.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::Field;

    const FRANCE: &str = r#"
        <html><body>
        <div class="mw-parser-output">
          <div class="hatnote">Эта статья о государстве.</div>
          <table class="infobox" data-name="Государство">
            <tr><th colspan="2">Французская Республика</th></tr>
            <tr><th>Столица</th><td><a href="/wiki/Париж">Париж</a><sup class="reference">[1]</sup></td></tr>
            <tr><th>Официальный язык</th><td>французский</td></tr>
            <tr><th>Площадь</th><td></td></tr>
            <tr><td>• Всего</td><td>643 801 км²[2]</td></tr>
            <tr><th>Население</th></tr>
            <tr><td>• Оценка (2023)</td><td>68 042 591 чел.</td></tr>
            <tr><th>Валюта</th><td>Евро (EUR)</td></tr>
            <tr><th>Площадь водной поверхности</th><td>0,86 %</td></tr>
          </table>
          <p></p>
          <p><b>Франция</b> (фр. France), официальное название — <b>Французская Республика</b>[3] — государство в Западной Европе.</p>
          <p>Second paragraph.</p>
        </div>
        </body></html>
    "#;

    fn doc(body: &str) -> RawDocument {
        RawDocument::new("https://ru.wikipedia.org/wiki/Франция", body)
    }

    #[test]
    fn test_extract_detail_fields() {
        let detail = extract_detail(&doc(FRANCE), &FieldRules::default());

        assert!(detail.has_infobox);
        assert_eq!(detail.capital.as_deref(), Some("Париж"));
        assert_eq!(
            detail.fields.get(Field::Language).as_known(),
            Some("французский")
        );
        // label row without a value falls through to the next row
        assert_eq!(
            detail.fields.get(Field::Area).as_known(),
            Some("643 801 км²")
        );
        assert_eq!(
            detail.fields.get(Field::Population).as_known(),
            Some("68 042 591 чел.")
        );
        assert_eq!(detail.fields.get(Field::Currency).as_known(), Some("Евро (EUR)"));
        assert!(detail.fields.get(Field::Region).is_unknown());
    }

    #[test]
    fn test_summary_is_first_direct_paragraph() {
        let detail = extract_detail(&doc(FRANCE), &FieldRules::default());
        let summary = detail.summary.as_known().unwrap();

        assert!(summary.starts_with("Франция (фр. France)"));
        assert!(!summary.contains("[3]"));
        assert!(!summary.contains("Эта статья"));
        assert!(!summary.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_empty_label_does_not_take_next_labels_value() {
        let body = r#"
            <table class="infobox">
              <tr><th>Площадь</th><td></td></tr>
              <tr><th>Население</th><td>68 042 591 чел.</td></tr>
            </table>"#;
        let detail = extract_detail(&doc(body), &FieldRules::default());

        assert!(detail.fields.get(Field::Area).is_unknown());
        assert_eq!(
            detail.fields.get(Field::Population).as_known(),
            Some("68 042 591 чел.")
        );
    }

    #[test]
    fn test_label_at_end_of_table_is_unknown() {
        let body = r#"<table class="infobox"><tr><th>Валюта</th><td></td></tr></table>"#;
        let detail = extract_detail(&doc(body), &FieldRules::default());
        assert!(detail.fields.get(Field::Currency).is_unknown());
    }

    #[test]
    fn test_summary_without_container_uses_body_paragraphs() {
        let body = "<html><body><p>Перу — государство в Южной Америке.</p></body></html>";
        let detail = extract_detail(&doc(body), &FieldRules::default());
        assert_eq!(
            detail.summary.as_known(),
            Some("Перу — государство в Южной Америке.")
        );
    }

    #[test]
    fn test_long_summary_is_truncated_with_marker() {
        let long = "слово ".repeat(100);
        let body = format!(r#"<div class="mw-parser-output"><p>{}</p></div>"#, long);
        let detail = extract_detail(&doc(&body), &FieldRules::default());
        let summary = detail.summary.as_known().unwrap();

        assert!(summary.ends_with(TRUNCATION_MARKER));
        assert!(summary.chars().count() <= 300 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_page_without_infobox_is_all_unknown() {
        let detail = extract_detail(&doc("<html><body></body></html>"), &FieldRules::default());

        assert!(!detail.has_infobox);
        assert!(detail.capital.is_none());
        assert!(detail.fields.all_unknown());
        assert_eq!(detail.summary, FieldValue::Unknown);
    }

    #[test]
    fn test_first_matching_label_wins_across_patterns() {
        let body = r#"
            <table class="infobox">
              <tr><th>Континент</th><td>Европа</td></tr>
              <tr><th>Часть света</th><td>Евразия</td></tr>
            </table>"#;
        let detail = extract_detail(&doc(body), &FieldRules::default());
        assert_eq!(detail.fields.get(Field::Region).as_known(), Some("Европа"));
    }

    #[test]
    fn test_custom_rule_table() {
        let body = r#"<table class="infobox"><tr><th>Currency</th><td>Yen</td></tr></table>"#;
        let rules = FieldRules::empty().with_rule("currency", Field::Currency);
        let detail = extract_detail(&doc(body), &rules);

        assert_eq!(detail.fields.get(Field::Currency).as_known(), Some("Yen"));
        assert!(detail.capital.is_none());
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("Рим", 3), "Рим");
        assert_eq!(truncate("Париж", 3), "Пар...");
        assert_eq!(truncate("ab cd", 3), "ab...");
    }
}
