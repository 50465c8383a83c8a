//! In-memory content source and Notion JSON fixtures for unit tests

use crate::crawler::ContentSource;
use crate::id::canonical_id;
use crate::model::RawObject;
use crate::registry::source_key;
use crate::FetchError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Serves canned objects and files, counting every call
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, RawObject>,
    databases: HashMap<String, RawObject>,
    failures: HashMap<String, FetchError>,
    files: HashMap<String, Vec<u8>>,
    users: Vec<(String, String)>,
    fetch_delay: Option<Duration>,
    fetches: Mutex<HashMap<String, usize>>,
    downloads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, id: &str, record: Value, blocks: Vec<Value>) -> Self {
        let id = canonical_id(id);
        let raw = RawObject::page(id.clone(), record).with_blocks(blocks);
        self.pages.insert(id, raw);
        self
    }

    pub fn with_database(mut self, id: &str, record: Value, rows: Vec<Value>) -> Self {
        let id = canonical_id(id);
        let raw = RawObject::database(id.clone(), record).with_rows(rows);
        self.databases.insert(id, raw);
        self
    }

    /// Makes every fetch of `id`, as page or database, fail with `error`
    pub fn with_failure(mut self, id: &str, error: FetchError) -> Self {
        self.failures.insert(canonical_id(id), error);
        self
    }

    /// Serves `bytes` for any URL with the same source key
    pub fn with_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(source_key(url), bytes.to_vec());
        self
    }

    pub fn with_user(mut self, id: &str, name: &str) -> Self {
        self.users.push((id.to_string(), name.to_string()));
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Fetch attempts for `id`, as page and database combined
    pub fn fetch_count(&self, id: &str) -> usize {
        let fetches = self.fetches.lock().unwrap();
        fetches.get(&canonical_id(id)).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }

    /// Download attempts, failed ones included
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn serve(
        &self,
        id: &str,
        objects: &HashMap<String, RawObject>,
    ) -> Result<RawObject, FetchError> {
        let id = canonical_id(id);
        *self.fetches.lock().unwrap().entry(id.clone()).or_default() += 1;

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.failures.get(&id) {
            return Err(error.clone());
        }
        objects.get(&id).cloned().ok_or(FetchError::NotFound)
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_page(&self, id: &str) -> Result<RawObject, FetchError> {
        self.serve(id, &self.pages).await
    }

    async fn fetch_database(&self, id: &str) -> Result<RawObject, FetchError> {
        self.serve(id, &self.databases).await
    }

    async fn list_users(&self) -> Result<Vec<(String, String)>, FetchError> {
        Ok(self.users.clone())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(&source_key(url))
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}

fn span(text: &str) -> Value {
    json!({
        "type": "text",
        "text": {"content": text, "link": null},
        "annotations": {},
        "plain_text": text
    })
}

/// A page record whose title property is `title`
pub fn page_record(id: &str, title: &str) -> Value {
    json!({
        "object": "page",
        "id": id,
        "properties": {
            "Name": {"id": "title", "type": "title", "title": [span(title)]}
        }
    })
}

pub fn database_record(id: &str, title: &str) -> Value {
    json!({"object": "database", "id": id, "title": [span(title)]})
}

/// A database row as returned by a query
pub fn row_record(id: &str) -> Value {
    json!({"object": "page", "id": id, "properties": {}})
}

pub fn block(id: &str, type_tag: &str, payload: Value) -> Value {
    let mut block = json!({
        "object": "block",
        "id": id,
        "type": type_tag,
        "has_children": false
    });
    block[type_tag] = payload;
    block
}

/// Marks a block as having children
pub fn block_with_children(mut block: Value) -> Value {
    block["has_children"] = Value::Bool(true);
    block
}

pub fn text_block(id: &str, type_tag: &str, text: &str) -> Value {
    block(id, type_tag, json!({"rich_text": [span(text)], "color": "default"}))
}

pub fn todo_block(id: &str, text: &str, checked: bool) -> Value {
    block(id, "to_do", json!({"rich_text": [span(text)], "checked": checked}))
}

/// A paragraph holding a single page mention
pub fn mention_page_block(id: &str, target: &str, title: &str) -> Value {
    mention_block(id, "page", target, title)
}

/// A paragraph holding a single database mention
pub fn mention_database_block(id: &str, target: &str, title: &str) -> Value {
    mention_block(id, "database", target, title)
}

fn mention_block(id: &str, target_type: &str, target: &str, title: &str) -> Value {
    let mut mention = json!({"type": target_type});
    mention[target_type] = json!({"id": target});
    block(
        id,
        "paragraph",
        json!({
            "rich_text": [{
                "type": "mention",
                "mention": mention,
                "annotations": {},
                "plain_text": title
            }]
        }),
    )
}

/// A hosted media block of the given type
pub fn file_block(id: &str, type_tag: &str, url: &str) -> Value {
    block(
        id,
        type_tag,
        json!({
            "type": "file",
            "file": {"url": url, "expiry_time": "2030-01-01T00:00:00.000Z"},
            "caption": []
        }),
    )
}
