//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the Notion API and run the
//! full crawl-decode-resolve cycle end-to-end.

use notion_harvest::config::{ApiConfig, Config, CrawlerConfig, OutputConfig};
use notion_harvest::crawler::crawl;
use notion_harvest::{FetchError, HarvestError, PageError};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROOT: &str = "10000000-0000-0000-0000-000000000001";
const CHILD_A: &str = "20000000-0000-0000-0000-000000000002";
const CHILD_B: &str = "30000000-0000-0000-0000-000000000003";
const CHILD_C: &str = "40000000-0000-0000-0000-000000000004";
const OUTSIDE: &str = "50000000-0000-0000-0000-000000000005";

/// Creates a test configuration pointed at the mock server
fn create_test_config(server: &MockServer, destination: &TempDir) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent_fetches: 4,
        },
        api: ApiConfig {
            base_url: server.uri(),
            max_retries: 3,
            retry_delay_ms: 5, // Very short for testing
            token: Some("secret_integration".to_string()),
            ..ApiConfig::default()
        },
        output: OutputConfig {
            destination_root: Some(destination.path().to_path_buf()),
        },
    }
}

fn list(results: Vec<Value>) -> Value {
    json!({"object": "list", "results": results, "has_more": false, "next_cursor": null})
}

fn text(content: &str) -> Value {
    json!({"type": "text", "text": {"content": content, "link": null}, "plain_text": content})
}

fn paragraph(id: &str, content: &str) -> Value {
    json!({"object": "block", "id": id, "type": "paragraph", "has_children": false,
           "paragraph": {"rich_text": [text(content)]}})
}

fn mention(id: &str, target: &str, title: &str) -> Value {
    json!({"object": "block", "id": id, "type": "paragraph", "has_children": false,
           "paragraph": {"rich_text": [{
               "type": "mention",
               "mention": {"type": "page", "page": {"id": target}},
               "plain_text": title
           }]}})
}

fn hosted_file(id: &str, url: &str) -> Value {
    json!({"object": "block", "id": id, "type": "file", "has_children": false,
           "file": {"type": "file", "file": {"url": url}, "caption": []}})
}

async fn mount_users(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(list(vec![json!({"object": "user", "id": "u1", "name": "Ada"})])),
        )
        .mount(server)
        .await;
}

/// Mounts a page record and its top-level blocks, expecting exactly one fetch
async fn mount_page(server: &MockServer, id: &str, title: &str, blocks: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/pages/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "page",
            "id": id,
            "properties": {"Name": {"id": "title", "type": "title", "title": [text(title)]}}
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/blocks/{id}/children")))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(blocks)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_database_root_collects_rows_and_mentions() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/databases/{ROOT}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "database", "id": ROOT, "title": [text("Projects")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/databases/{ROOT}/query")))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![
            json!({"object": "page", "id": CHILD_A}),
            json!({"object": "page", "id": CHILD_B}),
            json!({"object": "page", "id": CHILD_C}),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    mount_page(&server, CHILD_A, "Alpha", vec![paragraph("b1", "first row")]).await;
    mount_page(&server, CHILD_B, "Beta", vec![mention("b2", OUTSIDE, "Elsewhere")]).await;
    mount_page(&server, CHILD_C, "Gamma", vec![]).await;
    mount_page(&server, OUTSIDE, "Elsewhere", vec![paragraph("b3", "outside")]).await;

    let result = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(result.len(), 4);
    assert!(result.page(ROOT).is_err());
    assert_eq!(result.databases().len(), 1);
    assert_eq!(result.databases()[0].title, "Projects");
    assert_eq!(result.page(CHILD_A).unwrap().title(), "Alpha");
    assert_eq!(result.page(OUTSIDE).unwrap().original_markup(), "<p>outside</p>");
    assert_eq!(result.pages_with_errors().count(), 0);
}

#[tokio::test]
async fn test_cyclic_mentions_fetch_each_page_once() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    mount_page(&server, ROOT, "Root", vec![mention("m1", CHILD_A, "A")]).await;
    mount_page(&server, CHILD_A, "A", vec![
        mention("m2", ROOT, "Root"),
        mention("m3", CHILD_B, "B"),
    ])
    .await;
    mount_page(&server, CHILD_B, "B", vec![
        mention("m4", ROOT, "Root"),
        mention("m5", CHILD_A, "A"),
    ])
    .await;

    let mut result = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(result.len(), 3);
    assert_eq!(result.resolve_all_links("./"), 5);
    assert_eq!(
        result.page(CHILD_B).unwrap().updated_markup(),
        format!(
            "<p><a href=\"./{ROOT}.html\">Root</a></p>\
             <p><a href=\"./{CHILD_A}.html\">A</a></p>"
        )
    );
    // Drop verifies every `.expect(1)`
}

#[tokio::test]
async fn test_nested_blocks_are_fetched() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    let toggle = json!({
        "object": "block",
        "id": "t1",
        "type": "toggle",
        "has_children": true,
        "toggle": {"rich_text": [text("More")]}
    });
    mount_page(&server, ROOT, "Root", vec![toggle]).await;
    Mock::given(method("GET"))
        .and(path("/blocks/t1/children"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(list(vec![paragraph("p1", "hidden")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(
        result.page(ROOT).unwrap().original_markup(),
        "<details><summary>More</summary><p>hidden</p></details>"
    );
}

#[tokio::test]
async fn test_unreadable_synced_block_keeps_root_content() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    let synced = json!({
        "object": "block",
        "id": "s1",
        "type": "synced_block",
        "has_children": true,
        "synced_block": {"synced_from": {"type": "block_id", "block_id": "elsewhere"}}
    });
    mount_page(&server, ROOT, "Root", vec![paragraph("p1", "hello"), synced]).await;
    Mock::given(method("GET"))
        .and(path("/blocks/s1/children"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "object": "error",
            "status": 404,
            "code": "object_not_found",
            "message": "Could not find block with ID: s1."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .expect("Crawl failed");

    let root = result.page(ROOT).unwrap();
    assert_eq!(
        root.original_markup(),
        "<p>hello</p><div class=\"synced-block\"></div>"
    );
    assert_eq!(
        root.errors(),
        &[PageError::UnreadableChildren {
            unit_id: "s1".to_string(),
            error: FetchError::NotFound,
        }]
    );
}

#[tokio::test]
async fn test_shared_attachment_downloaded_once() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    let file_url = format!("{}/files/handbook.pdf", server.uri());
    mount_page(&server, ROOT, "Root", vec![
        hosted_file("f1", &format!("{file_url}?X-Amz-Signature=one")),
        mention("m1", CHILD_A, "A"),
    ])
    .await;
    mount_page(&server, CHILD_A, "A", vec![hosted_file(
        "f2",
        &format!("{file_url}?X-Amz-Signature=two"),
    )])
    .await;
    Mock::given(method("GET"))
        .and(path("/files/handbook.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let mut result = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .expect("Crawl failed");

    let site = destination.path().join("site");
    let replaced = result
        .resolve_all_attachments("attachments", &site.join("attachments"))
        .await;
    assert_eq!(replaced, 2);

    let root_file = result.page(ROOT).unwrap().attachments()[0].clone();
    let child_file = result.page(CHILD_A).unwrap().attachments()[0].clone();
    assert_eq!(root_file.local_path, child_file.local_path);

    let placed = root_file.local_path.expect("attachment not placed");
    assert!(placed.ends_with("handbook.pdf"));
    assert_eq!(std::fs::read(&placed).unwrap(), b"%PDF-1.7");
    assert!(result
        .page(CHILD_A)
        .unwrap()
        .updated_markup()
        .contains(&format!("href=\"attachments/{}/handbook.pdf\"", child_file.directory_name())));
}

#[tokio::test]
async fn test_missing_mention_becomes_failed_page() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    mount_page(&server, ROOT, "Root", vec![mention("m1", CHILD_A, "Gone")]).await;
    Mock::given(method("GET"))
        .and(path(format!("/pages/{CHILD_A}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "object": "error",
            "status": 404,
            "code": "object_not_found",
            "message": "Could not find page"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .expect("Crawl failed");

    let failed = result.page(CHILD_A).unwrap();
    assert_eq!(failed.errors(), &[PageError::Fetch(FetchError::NotFound)]);
    assert!(failed.units().is_empty());
    assert!(!result.page(ROOT).unwrap().has_errors());
}

#[tokio::test]
async fn test_unauthorized_root_aborts() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/pages/{ROOT}")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "object": "error",
            "status": 401,
            "code": "unauthorized",
            "message": "API token is invalid."
        })))
        .mount(&server)
        .await;

    let err = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .unwrap_err();

    match err {
        HarvestError::Unauthorized { id, message } => {
            assert_eq!(id, ROOT);
            assert_eq!(message, "API token is invalid.");
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_root_is_fatal() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    // Neither /pages/{ROOT} nor /databases/{ROOT} is mounted
    let err = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HarvestError::RootUnavailable { source: FetchError::NotFound, .. }
    ));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();
    mount_users(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/pages/{ROOT}")))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, ROOT, "Root", vec![paragraph("p", "eventually")]).await;

    let result = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(result.page(ROOT).unwrap().title(), "Root");
}

#[tokio::test]
async fn test_user_directory_failure_is_not_fatal() {
    let server = MockServer::start().await;
    let destination = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    let user_mention = json!({
        "object": "block",
        "id": "u",
        "type": "paragraph",
        "has_children": false,
        "paragraph": {"rich_text": [{
            "type": "mention",
            "mention": {"type": "user", "user": {"id": "u1"}},
            "plain_text": "@Ada"
        }]}
    });
    mount_page(&server, ROOT, "Root", vec![user_mention]).await;

    let result = crawl(create_test_config(&server, &destination), ROOT)
        .await
        .expect("Crawl failed");

    let page = result.page(ROOT).unwrap();
    assert_eq!(page.original_markup(), "<p>@u1</p>");
    assert_eq!(
        page.errors(),
        &[PageError::UnknownUser { user_id: "u1".to_string() }]
    );
}
