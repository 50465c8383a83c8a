/// Per-object decode state
///
/// One `DecodeContext` lives for the decode of a single object. It issues
/// tokens through the shared registry and collects what the page needs to
/// carry afterwards: its tokens, the objects it references, and its errors.
use super::users::UserDirectory;
use crate::model::AttachmentKind;
use crate::registry::{AttachmentToken, LinkToken, PlaceholderRegistry};
use crate::state::ObjectRef;
use crate::PageError;
use std::collections::HashSet;

pub(crate) struct DecodeContext<'a> {
    registry: &'a PlaceholderRegistry,
    users: &'a UserDirectory,
    pub(crate) links: Vec<LinkToken>,
    pub(crate) attachments: Vec<AttachmentToken>,
    pub(crate) references: Vec<ObjectRef>,
    seen_references: HashSet<String>,
    pub(crate) errors: Vec<PageError>,
}

impl<'a> DecodeContext<'a> {
    pub(crate) fn new(registry: &'a PlaceholderRegistry, users: &'a UserDirectory) -> Self {
        Self {
            registry,
            users,
            links: Vec::new(),
            attachments: Vec::new(),
            references: Vec::new(),
            seen_references: HashSet::new(),
            errors: Vec::new(),
        }
    }

    /// Records a discovered object; repeated ids are kept once
    pub(crate) fn reference(&mut self, target: ObjectRef) {
        if self.seen_references.insert(target.id.clone()) {
            self.references.push(target);
        }
    }

    /// Issues a link token to a page and returns its placeholder
    pub(crate) fn link(&mut self, target_id: &str, title: Option<&str>) -> String {
        self.reference(ObjectRef::page(target_id));
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let token = self.registry.link_token_for(target_id, title);
        let placeholder = token.placeholder.clone();
        self.links.push(token);
        placeholder
    }

    /// Issues an attachment token and returns its placeholder
    pub(crate) fn attachment(&mut self, kind: AttachmentKind, source_url: &str) -> String {
        let token = self.registry.attachment_token_for(kind, source_url);
        let placeholder = token.placeholder.clone();
        self.attachments.push(token);
        placeholder
    }

    /// Display name for a user, recording an error when it is unknown
    pub(crate) fn user_name(&mut self, user_id: &str, inline_name: Option<&str>) -> String {
        if let Some(name) = inline_name.filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match self.users.name_for(user_id) {
            Some(name) => name.to_string(),
            None => {
                self.error(PageError::UnknownUser {
                    user_id: user_id.to_string(),
                });
                user_id.to_string()
            }
        }
    }

    pub(crate) fn error(&mut self, error: PageError) {
        self.errors.push(error);
    }
}
