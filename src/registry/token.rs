/// Placeholder token types
use crate::model::AttachmentKind;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Opening delimiter of every placeholder
pub const OPEN: char = '\u{27E6}';

/// Closing delimiter of every placeholder
pub const CLOSE: char = '\u{27E7}';

/// Hex digits of the source-key digest used in directory names
const DIGEST_LEN: usize = 20;

/// Filename used when a URL has no usable last path segment
const FALLBACK_FILENAME: &str = "attachment";

/// A deferred reference from one page's markup to another object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkToken {
    /// Text spliced into the markup in place of the link
    pub placeholder: String,

    /// Canonical id of the referenced object
    pub target_id: String,

    /// Title of the target if it was known at decode time
    pub target_title: Option<String>,
}

/// A deferred hosted file reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentToken {
    /// Text spliced into the markup in place of the file
    pub placeholder: String,

    pub kind: AttachmentKind,

    /// URL the bytes are downloaded from (may carry a signature query)
    pub source_url: String,

    /// Stable identity of the file across requests, used for dedup
    pub source_key: String,

    /// Where the file was placed, once materialized
    pub local_path: Option<PathBuf>,
}

impl AttachmentToken {
    /// Original filename, percent-decoded from the URL's last path segment
    pub fn filename(&self) -> String {
        filename_from_key(&self.source_key)
    }

    /// Collision-free directory name for this file's source
    pub fn directory_name(&self) -> String {
        source_digest(&self.source_key)
    }
}

/// Either kind of token, as returned by reverse lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Link(LinkToken),
    Attachment(AttachmentToken),
}

impl Token {
    pub fn placeholder(&self) -> &str {
        match self {
            Self::Link(token) => &token.placeholder,
            Self::Attachment(token) => &token.placeholder,
        }
    }
}

/// Strips the query and fragment from a hosted file URL
///
/// Notion signs hosted file URLs per request, so the same file comes back
/// with a different query string every time it is fetched.
pub fn source_key(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// First hex digits of SHA-256 over a source key
pub fn source_digest(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    let mut digest = hex::encode(hash);
    digest.truncate(DIGEST_LEN);
    digest
}

fn filename_from_key(key: &str) -> String {
    let path = key.split_once("://").map_or(key, |(_, rest)| rest);
    let segment = match path.split_once('/') {
        Some((_, path)) => path.rsplit('/').next().unwrap_or(""),
        None => "",
    };

    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    // Never let a decoded name escape its directory
    let cleaned: String = decoded
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}
