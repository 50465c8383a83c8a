//! Placeholder registry
//!
//! Every link to another object and every hosted file found while decoding
//! gets its own token. The token's placeholder text is spliced into the
//! rendered markup and later swapped for a real path by the caller.
//!
//! Placeholder syntax:
//!
//! ```text
//! ⟦link:<seq>:<target-id>⟧
//! ⟦attachment:<seq>:<source-digest>⟧
//! ```
//!
//! `<seq>` increases by one for every token issued during a crawl, so two
//! occurrences of the same target still get distinct placeholders. The
//! decoder escapes `⟦` and `⟧` in source text, which keeps these delimiters
//! unique to placeholders.

mod token;

pub use token::{source_digest, source_key, AttachmentToken, LinkToken, Token, CLOSE, OPEN};

use crate::model::AttachmentKind;
use crate::HarvestError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct RegistryState {
    next_seq: u64,
    tokens: HashMap<String, Token>,
}

/// Crawl-wide issuer and index of placeholder tokens
///
/// Shared by reference across all decode tasks; every mutation happens
/// under one lock so sequence numbers are never reused.
#[derive(Debug, Default)]
pub struct PlaceholderRegistry {
    state: Mutex<RegistryState>,
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh link token for one occurrence of a reference
    ///
    /// # Arguments
    ///
    /// * `target_id` - Canonical id of the referenced object
    /// * `target_title` - Title of the target if the referencing page knows it
    pub fn link_token_for(&self, target_id: &str, target_title: Option<&str>) -> LinkToken {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        let token = LinkToken {
            placeholder: format!("{OPEN}link:{seq}:{target_id}{CLOSE}"),
            target_id: target_id.to_string(),
            target_title: target_title.map(str::to_string),
        };
        state
            .tokens
            .insert(token.placeholder.clone(), Token::Link(token.clone()));
        token
    }

    /// Issues a fresh attachment token for one occurrence of a hosted file
    pub fn attachment_token_for(&self, kind: AttachmentKind, source_url: &str) -> AttachmentToken {
        let key = source_key(source_url);
        let digest = source_digest(&key);

        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        let token = AttachmentToken {
            placeholder: format!("{OPEN}attachment:{seq}:{digest}{CLOSE}"),
            kind,
            source_url: source_url.to_string(),
            source_key: key,
            local_path: None,
        };
        state
            .tokens
            .insert(token.placeholder.clone(), Token::Attachment(token.clone()));
        token
    }

    /// Looks up the token behind a placeholder
    ///
    /// # Returns
    ///
    /// * `Ok(Token)` - The token as currently known (with `local_path` if materialized)
    /// * `Err(HarvestError::NotFound)` - The text was never issued by this registry
    pub fn resolve(&self, placeholder: &str) -> Result<Token, HarvestError> {
        self.lock()
            .tokens
            .get(placeholder)
            .cloned()
            .ok_or_else(|| HarvestError::NotFound(format!("placeholder {placeholder}")))
    }

    /// Records where an attachment token's file was placed
    pub fn record_local_path(&self, placeholder: &str, path: &Path) {
        if let Some(Token::Attachment(token)) = self.lock().tokens.get_mut(placeholder) {
            token.local_path = Some(path.to_path_buf());
        }
    }

    /// Local path recorded for an attachment placeholder
    pub fn local_path(&self, placeholder: &str) -> Option<PathBuf> {
        match self.lock().tokens.get(placeholder) {
            Some(Token::Attachment(token)) => token.local_path.clone(),
            _ => None,
        }
    }

    /// Number of tokens issued so far
    pub fn len(&self) -> usize {
        self.lock().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Finds every placeholder-shaped substring in markup, in order
pub fn find_placeholders(markup: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = markup;
    while let Some(start) = rest.find(OPEN) {
        let tail = &rest[start..];
        match tail.find(CLOSE) {
            Some(end) => {
                let stop = end + CLOSE.len_utf8();
                found.push(&tail[..stop]);
                rest = &tail[stop..];
            }
            None => break,
        }
    }
    found
}
