/// Raw object shape produced by a `ContentSource`
///
/// The transport flattens Notion's paginated endpoints into one value per
/// object. Blocks stay as untyped JSON so that new block types reach the
/// decoder instead of failing deserialization in the transport.
use crate::state::ObjectKind;
use crate::FetchError;
use serde_json::Value;
use std::collections::HashMap;

/// One fetched page or database, undecoded
#[derive(Debug, Clone)]
pub struct RawObject {
    /// Canonical object id
    pub id: String,

    /// Whether this is a page or a database
    pub kind: ObjectKind,

    /// The page or database record itself (title, properties, ...)
    pub record: Value,

    /// Top-level blocks of a page, in order
    pub blocks: Vec<Value>,

    /// Children of every block that has them, keyed by parent block id
    pub children: HashMap<String, Vec<Value>>,

    /// Row records of a database, in query order
    pub rows: Vec<Value>,

    /// Blocks whose children could not be fetched, with the failure
    pub unreadable: HashMap<String, FetchError>,
}

impl RawObject {
    /// Creates a raw page with no blocks
    pub fn page(id: impl Into<String>, record: Value) -> Self {
        Self {
            id: id.into(),
            kind: ObjectKind::Page,
            record,
            blocks: Vec::new(),
            children: HashMap::new(),
            rows: Vec::new(),
            unreadable: HashMap::new(),
        }
    }

    /// Creates a raw database with no rows
    pub fn database(id: impl Into<String>, record: Value) -> Self {
        Self {
            kind: ObjectKind::Database,
            ..Self::page(id, record)
        }
    }

    /// Sets the top-level blocks
    pub fn with_blocks(mut self, blocks: Vec<Value>) -> Self {
        self.blocks = blocks;
        self
    }

    /// Attaches child blocks to a parent block id
    pub fn with_children(mut self, parent_id: impl Into<String>, blocks: Vec<Value>) -> Self {
        self.children.insert(parent_id.into(), blocks);
        self
    }

    /// Records that the children of `block_id` could not be fetched
    pub fn with_unreadable(mut self, block_id: impl Into<String>, error: FetchError) -> Self {
        self.unreadable.insert(block_id.into(), error);
        self
    }

    /// Sets the database rows
    pub fn with_rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = rows;
        self
    }

    /// Child blocks of `block_id`, empty when it has none
    pub fn children_of(&self, block_id: &str) -> &[Value] {
        self.children
            .get(block_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
