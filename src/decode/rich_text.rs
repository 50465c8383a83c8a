/// Rich text parsing and rendering
use super::context::DecodeContext;
use super::markup::{anchor, escape};
use crate::id::canonical_id;
use crate::model::{Annotations, DateRange, Mention, RichText, RichTextSpan, SpanContent};
use crate::state::ObjectRef;
use serde_json::Value;

/// Parses a Notion `rich_text` array; anything that is not an array is empty
pub fn parse_rich_text(value: &Value) -> RichText {
    value
        .as_array()
        .map(|spans| spans.iter().map(parse_span).collect())
        .unwrap_or_default()
}

fn parse_span(span: &Value) -> RichTextSpan {
    let plain_text = str_field(span, "plain_text").unwrap_or_default().to_string();
    let annotations: Annotations = span
        .get("annotations")
        .and_then(|a| serde_json::from_value(a.clone()).ok())
        .unwrap_or_default();

    let content = match span["type"].as_str().unwrap_or("text") {
        "equation" => SpanContent::Equation {
            expression: str_field(&span["equation"], "expression")
                .unwrap_or_default()
                .to_string(),
        },
        "mention" => SpanContent::Mention(parse_mention(&span["mention"])),
        _ => SpanContent::Text {
            content: str_field(&span["text"], "content")
                .unwrap_or(plain_text.as_str())
                .to_string(),
            link: str_field(&span["text"]["link"], "url").map(str::to_string),
        },
    };

    RichTextSpan {
        content,
        annotations,
        plain_text,
    }
}

fn parse_mention(mention: &Value) -> Mention {
    let tag = mention["type"].as_str().unwrap_or_default();
    let payload = &mention[tag];
    match tag {
        "page" => Mention::Page {
            id: canonical_id(str_field(payload, "id").unwrap_or_default()),
        },
        "database" => Mention::Database {
            id: canonical_id(str_field(payload, "id").unwrap_or_default()),
        },
        "user" => Mention::User {
            id: str_field(payload, "id").unwrap_or_default().to_string(),
            name: str_field(payload, "name").map(str::to_string),
        },
        "date" => match parse_date(payload) {
            Some(range) => Mention::Date(range),
            None => Mention::Other {
                type_tag: tag.to_string(),
            },
        },
        "link_preview" => Mention::LinkPreview {
            url: str_field(payload, "url").unwrap_or_default().to_string(),
        },
        _ => Mention::Other {
            type_tag: tag.to_string(),
        },
    }
}

/// Parses a `{start, end, time_zone}` date object
pub fn parse_date(value: &Value) -> Option<DateRange> {
    serde_json::from_value(value.clone()).ok()
}

/// Formats a date range for display
pub fn format_date(range: &DateRange) -> String {
    let mut out = range.start.clone();
    if let Some(end) = &range.end {
        out.push_str(" to ");
        out.push_str(end);
    }
    if let Some(tz) = &range.time_zone {
        out.push_str(&format!(" ({tz})"));
    }
    out
}

/// Renders spans to HTML, issuing tokens for page mentions
pub(crate) fn render_rich_text(text: &[RichTextSpan], ctx: &mut DecodeContext<'_>) -> String {
    text.iter().map(|span| render_span(span, ctx)).collect()
}

fn render_span(span: &RichTextSpan, ctx: &mut DecodeContext<'_>) -> String {
    let inner = match &span.content {
        SpanContent::Text { content, link } => match link {
            Some(url) => anchor(url, &escape(content)),
            None => escape(content),
        },
        SpanContent::Equation { expression } => {
            format!("<span class=\"equation\">{}</span>", escape(expression))
        }
        SpanContent::Mention(mention) => render_mention(mention, &span.plain_text, ctx),
    };
    apply_annotations(inner, &span.annotations)
}

fn render_mention(mention: &Mention, plain_text: &str, ctx: &mut DecodeContext<'_>) -> String {
    match mention {
        Mention::Page { id } => ctx.link(id, Some(plain_text)),
        Mention::Database { id } => {
            ctx.reference(ObjectRef::database(id.clone()));
            escape(plain_text)
        }
        Mention::User { id, name } => {
            let name = ctx.user_name(id, name.as_deref());
            format!("@{}", escape(&name))
        }
        Mention::Date(range) => escape(&format_date(range)),
        Mention::LinkPreview { url } => anchor(url, &escape(url)),
        Mention::Other { .. } => escape(plain_text),
    }
}

fn apply_annotations(mut html: String, annotations: &Annotations) -> String {
    let wrappers = [
        (annotations.bold, "b"),
        (annotations.italic, "i"),
        (annotations.strikethrough, "s"),
        (annotations.underline, "u"),
        (annotations.code, "code"),
    ];
    for (enabled, tag) in wrappers {
        if enabled {
            html = format!("<{tag}>{html}</{tag}>");
        }
    }
    html
}

fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::UserDirectory;
    use crate::registry::PlaceholderRegistry;
    use crate::PageError;
    use serde_json::json;

    #[test]
    fn test_annotations_and_links() {
        let registry = PlaceholderRegistry::new();
        let users = UserDirectory::new();
        let mut ctx = DecodeContext::new(&registry, &users);

        let text = parse_rich_text(&json!([
            {"type": "text", "text": {"content": "bold & italic", "link": null},
             "annotations": {"bold": true, "italic": true}, "plain_text": "bold & italic"},
            {"type": "text",
             "text": {"content": "site", "link": {"url": "https://x.test/?a=1&b=2"}},
             "plain_text": "site"}
        ]));

        assert_eq!(
            render_rich_text(&text, &mut ctx),
            "<i><b>bold &amp; italic</b></i><a href=\"https://x.test/?a=1&amp;b=2\">site</a>"
        );
        assert!(ctx.links.is_empty());
    }

    #[test]
    fn test_page_mention_becomes_link_token() {
        let registry = PlaceholderRegistry::new();
        let users = UserDirectory::new();
        let mut ctx = DecodeContext::new(&registry, &users);

        let text = parse_rich_text(&json!([{
            "type": "mention",
            "mention": {"type": "page", "page": {"id": "0123456789abcdef0123456789abcdef"}},
            "plain_text": "Roadmap"
        }]));

        let html = render_rich_text(&text, &mut ctx);
        assert_eq!(ctx.links.len(), 1);
        assert_eq!(html, ctx.links[0].placeholder);
        assert_eq!(ctx.links[0].target_id, "01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(ctx.links[0].target_title.as_deref(), Some("Roadmap"));
        assert_eq!(
            ctx.references,
            vec![ObjectRef::page("01234567-89ab-cdef-0123-456789abcdef")]
        );
    }

    #[test]
    fn test_database_mention_is_discovered_not_linked() {
        let registry = PlaceholderRegistry::new();
        let users = UserDirectory::new();
        let mut ctx = DecodeContext::new(&registry, &users);

        let text = parse_rich_text(&json!([{
            "type": "mention",
            "mention": {"type": "database", "database": {"id": "fedcba9876543210fedcba9876543210"}},
            "plain_text": "Tasks"
        }]));

        assert_eq!(render_rich_text(&text, &mut ctx), "Tasks");
        assert!(ctx.links.is_empty());
        assert_eq!(
            ctx.references,
            vec![ObjectRef::database("fedcba98-7654-3210-fedc-ba9876543210")]
        );
    }

    #[test]
    fn test_user_mentions() {
        let registry = PlaceholderRegistry::new();
        let users = UserDirectory::from_pairs([("u1".to_string(), "Ada".to_string())]);
        let mut ctx = DecodeContext::new(&registry, &users);

        let text = parse_rich_text(&json!([
            {"type": "mention",
             "mention": {"type": "user", "user": {"id": "u1"}},
             "plain_text": "@x"},
            {"type": "mention",
             "mention": {"type": "user", "user": {"id": "u2"}},
             "plain_text": "@y"}
        ]));

        assert_eq!(render_rich_text(&text, &mut ctx), "@Ada@u2");
        assert_eq!(
            ctx.errors,
            vec![PageError::UnknownUser {
                user_id: "u2".to_string()
            }]
        );
    }

    #[test]
    fn test_date_mention_and_equation() {
        let registry = PlaceholderRegistry::new();
        let users = UserDirectory::new();
        let mut ctx = DecodeContext::new(&registry, &users);

        let text = parse_rich_text(&json!([
            {"type": "mention", "mention": {"type": "date",
              "date": {"start": "2024-01-01", "end": "2024-01-03", "time_zone": null}},
             "plain_text": "January 1"},
            {"type": "equation", "equation": {"expression": "a<b"}, "plain_text": "a<b"}
        ]));

        assert_eq!(
            render_rich_text(&text, &mut ctx),
            "2024-01-01 to 2024-01-03<span class=\"equation\">a&lt;b</span>"
        );
    }

    #[test]
    fn test_non_array_is_empty() {
        assert!(parse_rich_text(&Value::Null).is_empty());
        assert!(parse_rich_text(&json!({"nope": 1})).is_empty());
    }
}
