//! MediaWiki action API stages.

pub mod categories;
pub mod client;
pub mod links;
pub mod revisions;

pub use categories::CategorySampler;
pub use client::{MediaWikiClient, QueryPages};
pub use links::PageLinkFetcher;
pub use revisions::RevisionFetcher;
