//! HTML parser for index pages
//!
//! An index page lists its resources as anchors inside a table. Only the first
//! `<table>` in the document is considered; anchors elsewhere (navigation,
//! footers) are ignored.

use scraper::{Html, Selector};
use thiserror::Error;

/// An anchor found on an index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    /// Raw `href` attribute, unresolved
    pub href: String,

    /// Visible anchor text, trimmed
    pub display_text: String,
}

/// Errors that make an index page unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A built-in selector failed to compile
    #[error("invalid selector: {0}")]
    Selector(String),

    /// The document has no `<table>` element
    #[error("index page has no <table> element")]
    MissingTable,
}

/// Extracts every anchor inside the first `<table>` of an HTML document
///
/// Anchors are returned in document order. Anchors without an `href` attribute
/// are skipped.
///
/// # Example
///
/// ```
/// use edgar_getter::retrieval::extract_table_links;
///
/// let html = r#"<table><tr><td><a href="a.gz">a.gz</a></td></tr></table>"#;
/// let links = extract_table_links(html).unwrap();
/// assert_eq!(links[0].href, "a.gz");
/// ```
pub fn extract_table_links(html: &str) -> Result<Vec<CandidateLink>, ParseError> {
    let document = Html::parse_document(html);

    let table_selector =
        Selector::parse("table").map_err(|e| ParseError::Selector(e.to_string()))?;
    let anchor_selector = Selector::parse("a").map_err(|e| ParseError::Selector(e.to_string()))?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or(ParseError::MissingTable)?;

    let mut links = Vec::new();
    for anchor in table.select(&anchor_selector) {
        let display_text = anchor.text().collect::<String>().trim().to_string();
        match anchor.value().attr("href") {
            Some(href) => links.push(CandidateLink {
                href: href.to_string(),
                display_text,
            }),
            None => tracing::debug!("Skipping anchor without href: {}", display_text),
        }
    }

    Ok(links)
}
