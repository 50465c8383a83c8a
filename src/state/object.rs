/// Object identity definitions for the crawl graph
///
/// Every node the crawler can fetch is a page or a database. Discovered
/// edges carry the kind of their target; only the root is fetched without
/// knowing what it is.
use std::fmt;

/// The two kinds of remote object the crawler fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A page, either free-standing or a database row
    Page,

    /// A database whose rows are pages
    Database,
}

impl ObjectKind {
    /// Returns the API name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference to an object that should be fetched
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Canonical object id
    pub id: String,

    /// Kind of the target, `None` when it is not yet known (the root)
    pub kind: Option<ObjectKind>,
}

impl ObjectRef {
    /// A reference known to point at a page
    pub fn page(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: Some(ObjectKind::Page),
        }
    }

    /// A reference known to point at a database
    pub fn database(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: Some(ObjectKind::Database),
        }
    }

    /// A reference whose kind must be discovered by fetching
    pub fn unresolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "{} {}", kind, self.id),
            None => write!(f, "object {}", self.id),
        }
    }
}
