//! Data model shared by the decoder and the result aggregator
//!
//! - `RawObject`: what the transport hands over for one page or database
//! - `ContentUnit` / `UnitKind`: the normalized block tree
//! - `RichText`: inline text runs with annotations and mentions
//! - `PropertyValue`: typed database-row metadata

mod property;
mod raw;
mod rich_text;
mod unit;

pub use property::{FileRef, Person, Properties, PropertyValue};
pub use raw::RawObject;
pub use rich_text::{Annotations, DateRange, Mention, RichText, RichTextSpan, SpanContent};
pub use unit::{AttachmentKind, ContentUnit, ListStyle, MediaSource, UnitKind};

/// Concatenates the plain text of a run of spans
pub fn plain_text(text: &[RichTextSpan]) -> String {
    text.iter().map(|span| span.plain_text.as_str()).collect()
}
