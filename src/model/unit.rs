/// Normalized content-unit (block) tree
///
/// Known block types are closed variants; everything else lands in
/// `UnitKind::Unsupported` with its raw payload so a newer API version never
/// breaks decoding.
use super::rich_text::RichText;
use serde_json::Value;
use std::fmt;

/// Kind of file a hosted attachment is rendered as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
    Pdf,
}

impl AttachmentKind {
    /// Name used in placeholders and block type tags
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
            Self::Pdf => "pdf",
        }
    }

    /// Maps a block type tag to an attachment kind
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "file" => Some(Self::File),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Where a media block's bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Uploaded to Notion; downloaded and placed locally on request
    Hosted { url: String },

    /// Linked from elsewhere; rendered in place, never downloaded
    External { url: String },
}

impl MediaSource {
    pub fn url(&self) -> &str {
        match self {
            Self::Hosted { url } | Self::External { url } => url,
        }
    }
}

/// The list container a list item belongs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Bulleted,
    Numbered,
    ToDo,
}

impl ListStyle {
    pub fn open_tag(&self) -> &'static str {
        match self {
            Self::Bulleted => "<ul>",
            Self::Numbered => "<ol>",
            Self::ToDo => "<ul class=\"to-do-list\">",
        }
    }

    pub fn close_tag(&self) -> &'static str {
        match self {
            Self::Numbered => "</ol>",
            Self::Bulleted | Self::ToDo => "</ul>",
        }
    }
}

/// Type-specific payload of a content unit
#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    Paragraph(RichText),
    Heading {
        level: u8,
        text: RichText,
    },
    BulletedListItem(RichText),
    NumberedListItem(RichText),
    ToDo {
        text: RichText,
        checked: bool,
    },
    Toggle(RichText),
    Quote(RichText),
    Callout {
        text: RichText,
        icon: Option<String>,
    },
    Code {
        text: RichText,
        language: String,
    },
    Template(RichText),
    Equation {
        expression: String,
    },
    Divider,
    TableOfContents,
    Breadcrumb,

    /// Bookmarks, embeds, link previews and the legacy single-service blocks
    WebLink {
        url: String,
        caption: RichText,

        /// Link text used when there is no caption; the URL itself when `None`
        label: Option<&'static str>,
    },
    Media {
        kind: AttachmentKind,
        source: MediaSource,
        caption: RichText,
    },

    /// A sub-page; a reference edge to another page
    ChildPage {
        title: String,
    },

    /// An inline database; a reference edge to a database
    ChildDatabase {
        title: String,
    },

    LinkToPage {
        target_id: String,
        kind: crate::state::ObjectKind,
    },
    Table {
        has_column_header: bool,
        has_row_header: bool,
    },
    TableRow {
        cells: Vec<RichText>,
    },
    ColumnList,
    Column,
    SyncedBlock,

    /// Anything the decoder does not know, kept verbatim
    Unsupported {
        type_tag: String,
        raw: Value,
    },
}

impl UnitKind {
    /// The list container this unit renders in, if it is a list item
    pub fn list_style(&self) -> Option<ListStyle> {
        match self {
            Self::BulletedListItem(_) => Some(ListStyle::Bulleted),
            Self::NumberedListItem(_) => Some(ListStyle::Numbered),
            Self::ToDo { .. } => Some(ListStyle::ToDo),
            _ => None,
        }
    }
}

/// One node of a decoded block tree
///
/// `Clone`, `PartialEq` and `Debug` never recurse into `children`, so they
/// stay safe on arbitrarily deep trees. `Debug` prints a child count rather
/// than the subtree.
pub struct ContentUnit {
    /// Block id
    pub id: String,

    pub kind: UnitKind,

    /// Nested units in order; empty for leaves
    pub children: Vec<ContentUnit>,
}

impl ContentUnit {
    pub fn new(id: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            id: id.into(),
            kind,
            children: Vec::new(),
        }
    }

    /// Total number of units in this subtree, itself included
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(unit) = stack.pop() {
            count += 1;
            stack.extend(unit.children.iter());
        }
        count
    }
}

impl Clone for ContentUnit {
    fn clone(&self) -> Self {
        // Pre-order listing of every descendant with its parent's slot;
        // slot 0 is `self`
        let mut order: Vec<(&ContentUnit, usize)> = Vec::new();
        let mut pending: Vec<(&ContentUnit, usize)> =
            self.children.iter().rev().map(|c| (c, 0)).collect();
        while let Some((unit, parent)) = pending.pop() {
            let slot = order.len() + 1;
            order.push((unit, parent));
            pending.extend(unit.children.iter().rev().map(|c| (c, slot)));
        }

        // Copies are built in reverse, so each child list arrives reversed
        let mut children: Vec<Vec<ContentUnit>> = (0..=order.len()).map(|_| Vec::new()).collect();
        for (offset, (unit, parent)) in order.iter().enumerate().rev() {
            let mut own = std::mem::take(&mut children[offset + 1]);
            own.reverse();
            children[*parent].push(ContentUnit {
                id: unit.id.clone(),
                kind: unit.kind.clone(),
                children: own,
            });
        }

        let mut own = std::mem::take(&mut children[0]);
        own.reverse();
        ContentUnit {
            id: self.id.clone(),
            kind: self.kind.clone(),
            children: own,
        }
    }
}

impl PartialEq for ContentUnit {
    fn eq(&self, other: &Self) -> bool {
        let mut pairs = vec![(self, other)];
        while let Some((a, b)) = pairs.pop() {
            if a.id != b.id || a.kind != b.kind || a.children.len() != b.children.len() {
                return false;
            }
            pairs.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl fmt::Debug for ContentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentUnit")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("children", &self.children.len())
            .finish()
    }
}

impl Drop for ContentUnit {
    // Flatten before dropping so deep trees do not recurse
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut unit) = stack.pop() {
            stack.append(&mut unit.children);
        }
    }
}
