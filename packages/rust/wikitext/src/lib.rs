//! Wikitext to plain-text conversion.
//!
//! Raw revisions are parsed into a node tree ([`parser`]), pruned and merged by
//! a fixed sequence of passes, then flattened into normalized plain text.
//! [`WikitextCleaner`] wraps this as a cached pipeline stage.

mod cleaner;
pub mod parser;
mod passes;

pub use cleaner::WikitextCleaner;
pub use parser::{Node, Param, parse};
pub use passes::TEMPLATE_MERGE_THRESHOLD;

/// Strip all markup from `text`, keeping prose.
///
/// Media and category links, short templates, references and tables are
/// removed; long template parameters are kept inline. HTML entities are
/// decoded and blank-line runs collapse to a single newline.
pub fn strip(text: &str) -> String {
    passes::run_pipeline(text)
}
