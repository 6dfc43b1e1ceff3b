//! lazy-html - HTML parsing for lazy-images
//!
//! HTML5 parsing built on html5ever, producing `lazy_dom` documents and
//! fragments.

mod parser;

pub use parser::HtmlParser;

use lazy_dom::Document;

/// Parse an HTML string into a Document
pub fn parse(html: &str) -> Result<Document, ParseError> {
    HtmlParser::new().parse(html)
}

/// Parse error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read HTML input: {0}")]
    Io(#[from] std::io::Error),
}
