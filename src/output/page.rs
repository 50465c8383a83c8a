/// Decoded output for a single page
use crate::attachments::Materializer;
use crate::decode::{attachment_html, page_link_html};
use crate::model::{ContentUnit, Properties};
use crate::registry::{AttachmentToken, LinkToken};
use crate::{FetchError, HarvestError, PageError};
use std::collections::HashMap;
use std::path::Path;

/// One crawled page: its tree, its markup, and everything that went wrong
///
/// The markup exists twice. `original_markup` is what the decoder produced
/// and never changes; `updated_markup` starts as a copy and is where every
/// resolve operation writes.
#[derive(Debug, Clone)]
pub struct DecodedPage {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) original_markup: String,
    pub(crate) updated_markup: String,
    pub(crate) units: Vec<ContentUnit>,
    pub(crate) properties: Properties,
    pub(crate) links: Vec<LinkToken>,
    pub(crate) attachments: Vec<AttachmentToken>,
    pub(crate) errors: Vec<PageError>,
}

impl DecodedPage {
    /// Stand-in for an object that could not be fetched at all
    pub fn failed(id: impl Into<String>, error: FetchError) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            original_markup: String::new(),
            updated_markup: String::new(),
            units: Vec::new(),
            properties: Properties::new(),
            links: Vec::new(),
            attachments: Vec::new(),
            errors: vec![PageError::Fetch(error)],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Markup as decoded, with every placeholder in place
    pub fn original_markup(&self) -> &str {
        &self.original_markup
    }

    /// Markup after the resolve operations applied so far
    pub fn updated_markup(&self) -> &str {
        &self.updated_markup
    }

    /// Replaces the updated markup, e.g. after caller-side post-processing
    pub fn set_updated_markup(&mut self, markup: impl Into<String>) {
        self.updated_markup = markup.into();
    }

    /// Discards all resolutions and starts over from the original markup
    pub fn reset_updated_markup(&mut self) {
        self.updated_markup = self.original_markup.clone();
    }

    pub fn units(&self) -> &[ContentUnit] {
        &self.units
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[PageError] {
        &self.errors
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn attachments(&self) -> &[AttachmentToken] {
        &self.attachments
    }

    /// Every link token issued while decoding this page, in markup order
    pub fn link_tokens(&self) -> &[LinkToken] {
        &self.links
    }

    /// Looks up one of this page's link tokens by its placeholder text
    ///
    /// # Returns
    ///
    /// * `Ok(&LinkToken)` - The token behind the placeholder
    /// * `Err(HarvestError::NotFound)` - The placeholder is not from this page
    pub fn link_token_for(&self, placeholder: &str) -> Result<&LinkToken, HarvestError> {
        self.links
            .iter()
            .find(|t| t.placeholder == placeholder)
            .ok_or_else(|| {
                HarvestError::NotFound(format!(
                    "link placeholder {} on page {}",
                    placeholder, self.id
                ))
            })
    }

    /// Replaces every link placeholder with an anchor to `<path><target-id>.html`
    ///
    /// Idempotent: a second call finds no placeholders left.
    ///
    /// # Returns
    ///
    /// The number of placeholders replaced by this call
    pub fn resolve_all_links(&mut self, path: &str) -> usize {
        let mut replaced = 0;
        for token in &self.links {
            if !self.updated_markup.contains(&token.placeholder) {
                continue;
            }
            let href = format!("{}{}.html", path, token.target_id);
            let text = token.target_title.as_deref().unwrap_or(&token.target_id);
            self.updated_markup = self
                .updated_markup
                .replace(&token.placeholder, &page_link_html(&href, text));
            replaced += 1;
        }
        replaced
    }

    /// Materializes every attachment and swaps its placeholder for a link
    ///
    /// Files are placed under `directory/<digest>/<filename>` and linked as
    /// `link_prefix/<digest>/<filename>`. A failed attachment is recorded as
    /// a page error and its placeholder is left untouched.
    ///
    /// # Returns
    ///
    /// The number of placeholders replaced by this call
    pub async fn resolve_all_attachments(
        &mut self,
        materializer: &Materializer,
        link_prefix: &str,
        directory: &Path,
    ) -> usize {
        let mut replaced = 0;

        for index in 0..self.attachments.len() {
            let token = &self.attachments[index];
            if !self.updated_markup.contains(&token.placeholder) {
                continue;
            }

            match materializer.materialize(token, directory).await {
                Ok(path) => {
                    let filename = token.filename();
                    let href = relative_href(link_prefix, &token.directory_name(), &filename);
                    let html = attachment_html(token.kind, &href, &filename);
                    self.updated_markup = self.updated_markup.replace(&token.placeholder, &html);
                    self.attachments[index].local_path = Some(path);
                    replaced += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Attachment {} on page {} not materialized: {}",
                        token.source_key,
                        self.id,
                        e
                    );
                    self.errors.push(PageError::Attachment {
                        source_url: token.source_url.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        replaced
    }

    /// Fills in missing link titles from the titles of crawled pages
    pub(crate) fn backfill_link_titles(&mut self, titles: &HashMap<String, String>) {
        for token in self.links.iter_mut().filter(|t| t.target_title.is_none()) {
            token.target_title = titles.get(&token.target_id).cloned();
        }
    }
}

fn relative_href(prefix: &str, directory: &str, filename: &str) -> String {
    let file = urlencoding::encode(filename);
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", directory, file)
    } else {
        format!("{}/{}/{}", prefix, directory, file)
    }
}
