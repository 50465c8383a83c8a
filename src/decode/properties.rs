/// Page property parsing and rendering
use super::context::DecodeContext;
use super::markup::{anchor, escape};
use super::rich_text::{format_date, parse_date, parse_rich_text, render_rich_text};
use crate::id::canonical_id;
use crate::model::{
    plain_text, AttachmentKind, FileRef, MediaSource, Person, Properties, PropertyValue,
};
use crate::PageError;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Title shown for objects without one
pub const UNTITLED: &str = "Untitled";

/// Extracts the display title of a page or database record
///
/// Pages carry their title in the property of type `title`; databases carry
/// it in a top-level `title` rich text array.
pub fn title_of(record: &Value) -> String {
    let from_database = record["title"].as_array().map(|_| {
        plain_text(&parse_rich_text(&record["title"]))
    });

    let from_page = || {
        record["properties"].as_object().and_then(|props| {
            props
                .values()
                .find(|p| p["type"] == "title")
                .map(|p| plain_text(&parse_rich_text(&p["title"])))
        })
    };

    from_database
        .or_else(from_page)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Parses the `properties` object of a page record
pub(crate) fn parse_properties(value: &Value, ctx: &mut DecodeContext<'_>) -> Properties {
    let mut properties = Properties::new();
    let Some(map) = value.as_object() else {
        return properties;
    };

    for (name, property) in map {
        let parsed = parse_property(property);
        if let PropertyValue::Unknown { type_tag, .. } = &parsed {
            ctx.error(PageError::UnsupportedProperty {
                name: name.clone(),
                type_tag: type_tag.clone(),
            });
        }
        properties.insert(name.clone(), parsed);
    }
    properties
}

/// Parses one property value by its `type` tag
pub fn parse_property(property: &Value) -> PropertyValue {
    let tag = property["type"].as_str().unwrap_or_default();
    let payload = &property[tag];

    match tag {
        "title" => PropertyValue::Title(parse_rich_text(payload)),
        "rich_text" => PropertyValue::RichText(parse_rich_text(payload)),
        "number" => PropertyValue::Number(payload.as_f64()),
        "select" => PropertyValue::Select(option_name(payload)),
        "status" => PropertyValue::Status(option_name(payload)),
        "multi_select" => PropertyValue::MultiSelect(
            payload
                .as_array()
                .map(|opts| opts.iter().filter_map(option_name).collect())
                .unwrap_or_default(),
        ),
        "date" => PropertyValue::Date(parse_date(payload)),
        "checkbox" => PropertyValue::Checkbox(payload.as_bool().unwrap_or(false)),
        "url" => PropertyValue::Url(opt_string(payload)),
        "email" => PropertyValue::Email(opt_string(payload)),
        "phone_number" => PropertyValue::PhoneNumber(opt_string(payload)),
        "created_time" => PropertyValue::CreatedTime(parse_time(payload)),
        "last_edited_time" => PropertyValue::LastEditedTime(parse_time(payload)),
        "formula" => PropertyValue::Formula(flatten_typed(payload)),
        "rollup" => PropertyValue::Rollup(flatten_typed(payload)),
        "relation" => PropertyValue::Relation(
            payload
                .as_array()
                .map(|rels| {
                    rels.iter()
                        .filter_map(|r| r["id"].as_str())
                        .map(canonical_id)
                        .collect()
                })
                .unwrap_or_default(),
        ),
        "people" => PropertyValue::People(
            payload
                .as_array()
                .map(|people| people.iter().map(parse_person).collect())
                .unwrap_or_default(),
        ),
        "created_by" => PropertyValue::CreatedBy(parse_person(payload)),
        "last_edited_by" => PropertyValue::LastEditedBy(parse_person(payload)),
        "files" => PropertyValue::Files(
            payload
                .as_array()
                .map(|files| files.iter().filter_map(parse_file).collect())
                .unwrap_or_default(),
        ),
        "unique_id" => PropertyValue::UniqueId {
            prefix: opt_string(&payload["prefix"]),
            number: payload["number"].as_i64(),
        },
        _ => PropertyValue::Unknown {
            type_tag: tag.to_string(),
            raw: property.clone(),
        },
    }
}

fn option_name(value: &Value) -> Option<String> {
    opt_string(&value["name"])
}

fn opt_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(|s| s.parse().ok())
}

fn parse_person(value: &Value) -> Person {
    Person {
        id: value["id"].as_str().unwrap_or_default().to_string(),
        name: opt_string(&value["name"]),
    }
}

fn parse_file(value: &Value) -> Option<FileRef> {
    let source = match value["type"].as_str()? {
        "file" => MediaSource::Hosted {
            url: opt_string(&value["file"]["url"])?,
        },
        "external" => MediaSource::External {
            url: opt_string(&value["external"]["url"])?,
        },
        _ => return None,
    };
    Some(FileRef {
        name: opt_string(&value["name"]).unwrap_or_else(|| source.url().to_string()),
        source,
    })
}

/// Flattens a typed formula or rollup result to display text
fn flatten_typed(value: &Value) -> Option<String> {
    let tag = value["type"].as_str()?;
    let inner = &value[tag];
    match tag {
        "string" => opt_string(inner),
        "number" => inner.as_f64().map(format_number),
        "boolean" => inner.as_bool().map(|b| b.to_string()),
        "date" => parse_date(inner).map(|d| format_date(&d)),
        "title" | "rich_text" => Some(plain_text(&parse_rich_text(inner))),
        "select" | "status" => option_name(inner),
        "array" => {
            let items: Vec<String> = inner
                .as_array()?
                .iter()
                .filter_map(flatten_typed)
                .collect();
            Some(items.join(", "))
        }
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Guesses how a file from a files property should be presented
fn kind_for_filename(name: &str) -> AttachmentKind {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp" => AttachmentKind::Image,
        "mp4" | "mov" | "webm" | "m4v" => AttachmentKind::Video,
        "mp3" | "wav" | "ogg" | "m4a" | "flac" => AttachmentKind::Audio,
        "pdf" => AttachmentKind::Pdf,
        _ => AttachmentKind::File,
    }
}

/// Renders the property block shown above a page body
///
/// The title property is skipped since it already heads the page. Returns
/// an empty string when nothing else is present.
pub(crate) fn render_properties(properties: &Properties, ctx: &mut DecodeContext<'_>) -> String {
    let mut rows = String::new();
    for (name, value) in properties {
        if matches!(value, PropertyValue::Title(_)) {
            continue;
        }
        let html = render_value(value, ctx);
        rows.push_str(&format!("<p><b>{}: </b>{}</p>", escape(name), html));
    }

    if rows.is_empty() {
        rows
    } else {
        format!("<div class=\"properties\">{rows}</div>")
    }
}

fn render_value(value: &PropertyValue, ctx: &mut DecodeContext<'_>) -> String {
    match value {
        PropertyValue::Title(text) | PropertyValue::RichText(text) => render_rich_text(text, ctx),
        PropertyValue::Number(n) => n.map(format_number).unwrap_or_default(),
        PropertyValue::Select(v)
        | PropertyValue::Status(v)
        | PropertyValue::PhoneNumber(v)
        | PropertyValue::Formula(v)
        | PropertyValue::Rollup(v) => v.as_deref().map(escape).unwrap_or_default(),
        PropertyValue::MultiSelect(values) => escape(&values.join(", ")),
        PropertyValue::Date(range) => range
            .as_ref()
            .map(|r| escape(&format_date(r)))
            .unwrap_or_default(),
        PropertyValue::Checkbox(true) => "<input type=\"checkbox\" disabled checked>".to_string(),
        PropertyValue::Checkbox(false) => "<input type=\"checkbox\" disabled>".to_string(),
        PropertyValue::Url(url) => url
            .as_deref()
            .map(|u| anchor(u, &escape(u)))
            .unwrap_or_default(),
        PropertyValue::Email(email) => email
            .as_deref()
            .map(|e| anchor(&format!("mailto:{e}"), &escape(e)))
            .unwrap_or_default(),
        PropertyValue::CreatedTime(t) | PropertyValue::LastEditedTime(t) => {
            t.as_ref().map(format_time).unwrap_or_default()
        }
        PropertyValue::Relation(ids) => escape(&ids.join(", ")),
        PropertyValue::People(people) => {
            let names: Vec<String> = people
                .iter()
                .map(|p| ctx.user_name(&p.id, p.name.as_deref()))
                .collect();
            escape(&names.join(", "))
        }
        PropertyValue::CreatedBy(person) | PropertyValue::LastEditedBy(person) => {
            escape(&ctx.user_name(&person.id, person.name.as_deref()))
        }
        PropertyValue::Files(files) => files
            .iter()
            .map(|file| match &file.source {
                MediaSource::Hosted { url } => ctx.attachment(kind_for_filename(&file.name), url),
                MediaSource::External { url } => anchor(url, &escape(&file.name)),
            })
            .collect::<Vec<_>>()
            .join(", "),
        PropertyValue::UniqueId { prefix, number } => {
            let number = number.map(|n| n.to_string()).unwrap_or_default();
            match prefix {
                Some(prefix) => escape(&format!("{prefix}-{number}")),
                None => number,
            }
        }
        PropertyValue::Unknown { .. } => String::new(),
    }
}
