//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ObjectKind` / `ObjectRef`: identity of the objects in the crawl graph
//! - `VisitedSet`: the shared set that guarantees each object is fetched once

mod object;
mod visited;

// Re-export main types
pub use object::{ObjectKind, ObjectRef};
pub use visited::VisitedSet;
