//! Shared helpers over parsed HTML.
//!
//! Parsing and entity decoding are done by `scraper`; these helpers add
//! the few traversals both extractors need: class filters, direct children
//! and text flattening that drops citation markers.

use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

use crate::normalize::collapse_whitespace;

pub static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("table selector is valid"));
pub static DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div").expect("div selector is valid"));
pub static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("row selector is valid"));
pub static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector is valid"));

/// Superscripts with these classes are citation markers, not content.
const REFERENCE_CLASSES: &[&str] = &["reference", "noprint"];

/// Elements whose text never belongs to the page prose.
const SKIPPED_TAGS: &[&str] = &["script", "style"];

/// Tags that separate words when flattened.
const BLOCK_TAGS: &[&str] = &["br", "p", "div", "li", "ul", "ol", "td", "th", "tr", "table"];

pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Elements matched by `selector` that also carry `class`.
///
/// Classes come from configuration, so they are compared rather than
/// spliced into a selector string.
pub fn select_with_class<'a>(
    document: &'a Html,
    selector: &'a Selector,
    class: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    document
        .select(selector)
        .filter(move |element| has_class(*element, class))
}

/// Direct child elements of `parent` with one of the given tag names.
pub fn child_elements<'a>(
    parent: ElementRef<'a>,
    names: &'a [&'a str],
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| names.contains(&child.value().name()))
}

/// Rows of `table` itself, leaving out rows of tables nested inside it.
pub fn rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    table.select(&ROW).filter(move |row| {
        row.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| ancestor.value().name() == "table")
            .is_some_and(|owner| owner.id() == table.id())
    })
}

fn is_skipped(element: ElementRef<'_>) -> bool {
    let name = element.value().name();
    SKIPPED_TAGS.contains(&name)
        || (name == "sup" && REFERENCE_CLASSES.iter().any(|class| has_class(element, class)))
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_skipped(child) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&child.value().name());
                if block {
                    out.push(' ');
                }
                push_text(child, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Visible text of `element` with whitespace collapsed.
///
/// Citation superscripts, scripts and styles are dropped; other
/// superscripts (units such as `км<sup>2</sup>`) keep their text.
pub fn text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    collapse_whitespace(&out)
}
