/// Inline text model
use serde::{Deserialize, Serialize};

/// Inline styling of one span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
}

/// A date or date range as Notion reports it (ISO 8601 strings)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Inline reference inside rich text
#[derive(Debug, Clone, PartialEq)]
pub enum Mention {
    /// Another page; becomes a link placeholder
    Page { id: String },

    /// A database; discovered but rendered as text
    Database { id: String },

    /// A workspace member
    User { id: String, name: Option<String> },

    Date(DateRange),

    LinkPreview { url: String },

    /// Mention types without a dedicated rendering (template mentions, ...)
    Other { type_tag: String },
}

/// Payload of a span
#[derive(Debug, Clone, PartialEq)]
pub enum SpanContent {
    Text {
        content: String,
        link: Option<String>,
    },
    Equation {
        expression: String,
    },
    Mention(Mention),
}

/// One run of uniformly styled inline content
#[derive(Debug, Clone, PartialEq)]
pub struct RichTextSpan {
    pub content: SpanContent,
    pub annotations: Annotations,

    /// Notion's own plain-text rendering, used for titles and fallbacks
    pub plain_text: String,
}

impl RichTextSpan {
    /// An unstyled text span
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            plain_text: content.clone(),
            content: SpanContent::Text {
                content,
                link: None,
            },
            annotations: Annotations::default(),
        }
    }
}

/// Ordered spans of a rich text field
pub type RichText = Vec<RichTextSpan>;
