/// The remote content collaborator
///
/// Everything the crawl needs from Notion goes through this trait, so the
/// scheduler and decoder can be driven by an in-memory source in tests.
use crate::model::RawObject;
use crate::FetchError;
use async_trait::async_trait;

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches a page record and its full block tree
    async fn fetch_page(&self, id: &str) -> Result<RawObject, FetchError>;

    /// Fetches a database record and all of its rows
    async fn fetch_database(&self, id: &str) -> Result<RawObject, FetchError>;

    /// Lists `(user_id, name)` for every workspace member visible to the credential
    async fn list_users(&self) -> Result<Vec<(String, String)>, FetchError>;

    /// Downloads the bytes of a hosted file
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
