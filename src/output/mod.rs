//! Result aggregation
//!
//! The only part of the crate a caller holds after a crawl:
//! - `CrawlResult`: id-addressable collection of pages plus bulk resolve operations
//! - `DecodedPage`: one page's tree, markup, tokens and errors
//! - `DatabaseSummary`: the databases the crawl passed through

mod page;
mod result;

pub use page::DecodedPage;
pub use result::{CrawlResult, DatabaseSummary};
