//! HTML fragment helpers
//!
//! All source text passes through [`escape`], which also turns the
//! placeholder delimiters into character references.

use crate::model::AttachmentKind;
use crate::registry::{CLOSE, OPEN};

/// Escapes text for use in element content or a quoted attribute
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            OPEN => out.push_str("&#10214;"),
            CLOSE => out.push_str("&#10215;"),
            _ => out.push(c),
        }
    }
    out
}

/// `<a href>` around already-rendered inner HTML
pub fn anchor(href: &str, inner_html: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape(href), inner_html)
}

/// Replacement markup for a materialized attachment
///
/// # Arguments
///
/// * `kind` - How the file should be presented
/// * `href` - Relative link to the placed file
/// * `filename` - Original filename, shown for downloadable files
pub fn attachment_html(kind: AttachmentKind, href: &str, filename: &str) -> String {
    let src = escape(href);
    match kind {
        AttachmentKind::Image => format!("<img src=\"{src}\" alt=\"{}\">", escape(filename)),
        AttachmentKind::Video => format!("<video controls src=\"{src}\"></video>"),
        AttachmentKind::Audio => format!("<audio controls src=\"{src}\"></audio>"),
        AttachmentKind::File | AttachmentKind::Pdf => anchor(href, &escape(filename)),
    }
}

/// Replacement markup for a resolved link to another page
pub fn page_link_html(href: &str, title: &str) -> String {
    anchor(href, &escape(title))
}
