//! Content decoder
//!
//! Turns one fetched object into a [`DecodedPage`]: a normalized unit tree,
//! typed properties, and HTML markup in which every link to another object
//! and every hosted file is a registry placeholder. Decoding never fails;
//! problems are recorded on the page.
//!
//! # Example
//!
//! ```
//! use notion_harvest::decode::{Decoder, UserDirectory};
//! use notion_harvest::model::RawObject;
//! use notion_harvest::PlaceholderRegistry;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let decoder = Decoder::new(
//!     Arc::new(PlaceholderRegistry::new()),
//!     Arc::new(UserDirectory::new()),
//! );
//! let raw = RawObject::page("01234567-89ab-cdef-0123-456789abcdef", json!({"properties": {}}))
//!     .with_blocks(vec![json!({"id": "b1", "type": "divider", "divider": {}})]);
//!
//! let decoded = decoder.decode(&raw);
//! assert_eq!(decoded.page.original_markup(), "<hr>");
//! assert!(decoded.references.is_empty());
//! ```

mod blocks;
mod context;
mod markup;
mod properties;
mod rich_text;
mod users;

pub use blocks::parse_unit;
pub use markup::{anchor, attachment_html, escape, page_link_html};
pub use properties::{parse_property, title_of, UNTITLED};
pub use rich_text::{format_date, parse_rich_text};
pub use users::UserDirectory;

use crate::id::canonical_id;
use crate::model::RawObject;
use crate::output::{DatabaseSummary, DecodedPage};
use crate::registry::PlaceholderRegistry;
use crate::state::ObjectRef;
use context::DecodeContext;
use std::sync::Arc;

/// A decoded page and the objects it points at
#[derive(Debug)]
pub struct Decoded {
    pub page: DecodedPage,

    /// Pages and databases referenced from this page, each id once
    pub references: Vec<ObjectRef>,
}

/// Stateless decoder sharing the crawl's registry and user directory
#[derive(Debug, Clone)]
pub struct Decoder {
    registry: Arc<PlaceholderRegistry>,
    users: Arc<UserDirectory>,
}

impl Decoder {
    pub fn new(registry: Arc<PlaceholderRegistry>, users: Arc<UserDirectory>) -> Self {
        Self { registry, users }
    }

    /// Decodes a raw page
    ///
    /// Properties render before the body. The page's own id never appears
    /// among its references.
    pub fn decode(&self, raw: &RawObject) -> Decoded {
        let mut ctx = DecodeContext::new(&self.registry, &self.users);

        let title = title_of(&raw.record);
        let properties = properties::parse_properties(&raw.record["properties"], &mut ctx);
        let units = blocks::build_units(raw, &mut ctx);

        let mut markup = properties::render_properties(&properties, &mut ctx);
        markup.push_str(&blocks::render_units(&units, &mut ctx));

        let references = ctx
            .references
            .into_iter()
            .filter(|r| r.id != raw.id)
            .collect();

        let page = DecodedPage {
            id: raw.id.clone(),
            title,
            updated_markup: markup.clone(),
            original_markup: markup,
            units,
            properties,
            links: ctx.links,
            attachments: ctx.attachments,
            errors: ctx.errors,
        };

        Decoded { page, references }
    }

    /// Summarizes a raw database and lists its rows as page references
    pub fn decode_database(&self, raw: &RawObject) -> (DatabaseSummary, Vec<ObjectRef>) {
        let row_ids: Vec<String> = raw
            .rows
            .iter()
            .filter_map(|row| row["id"].as_str())
            .map(canonical_id)
            .collect();

        let references = row_ids.iter().cloned().map(ObjectRef::page).collect();
        let summary = DatabaseSummary {
            id: raw.id.clone(),
            title: title_of(&raw.record),
            row_ids,
        };
        (summary, references)
    }
}
