/// Block tree construction and rendering
///
/// Both passes are iterative: nesting depth comes from user content and is
/// unbounded, so neither the tree build nor the render may recurse.
use super::context::DecodeContext;
use super::markup::{anchor, escape};
use super::rich_text::{parse_rich_text, render_rich_text};
use crate::id::canonical_id;
use crate::model::{
    plain_text, AttachmentKind, ContentUnit, MediaSource, RawObject, RichText, UnitKind,
};
use crate::state::{ObjectKind, ObjectRef};
use crate::PageError;
use serde_json::Value;
use std::collections::HashSet;

/// Parses one block's type tag and payload
///
/// # Returns
///
/// * `Ok(UnitKind)` - A known unit, or `Unsupported` for an unknown tag
/// * `Err(String)` - A known tag whose payload is unusable
pub fn parse_unit(block: &Value) -> Result<UnitKind, String> {
    let tag = block["type"]
        .as_str()
        .ok_or_else(|| "block has no type".to_string())?;
    let payload = &block[tag];
    let text = || parse_rich_text(&payload["rich_text"]);

    let kind = match tag {
        "paragraph" => UnitKind::Paragraph(text()),
        "heading_1" | "heading_2" | "heading_3" => UnitKind::Heading {
            level: tag.as_bytes()[tag.len() - 1] - b'0',
            text: text(),
        },
        // Legacy heading tags from older workspaces
        "sub_header" => UnitKind::Heading {
            level: 3,
            text: text(),
        },
        "sub_sub_header" => UnitKind::Heading {
            level: 4,
            text: text(),
        },
        "bulleted_list_item" => UnitKind::BulletedListItem(text()),
        "numbered_list_item" => UnitKind::NumberedListItem(text()),
        "to_do" => UnitKind::ToDo {
            text: text(),
            checked: payload["checked"].as_bool().unwrap_or(false),
        },
        "toggle" => UnitKind::Toggle(text()),
        "quote" => UnitKind::Quote(text()),
        "template" => UnitKind::Template(text()),
        "callout" => UnitKind::Callout {
            text: text(),
            icon: payload["icon"]["emoji"].as_str().map(str::to_string),
        },
        "code" => UnitKind::Code {
            text: text(),
            language: payload["language"].as_str().unwrap_or("plain text").to_string(),
        },
        "equation" => UnitKind::Equation {
            expression: required_str(payload, "expression")?,
        },
        "divider" => UnitKind::Divider,
        "table_of_contents" => UnitKind::TableOfContents,
        "breadcrumb" => UnitKind::Breadcrumb,
        "bookmark" | "embed" | "link_preview" => web_link(payload, None)?,
        "tweet" => web_link(payload, Some("Tweet"))?,
        "gist" => web_link(payload, Some("Gist"))?,
        "drive" => web_link(payload, Some("Google Drive Document"))?,
        "figma" => web_link(payload, Some("Figma"))?,
        "image" | "video" | "audio" | "file" | "pdf" => {
            let kind = AttachmentKind::from_type_tag(tag)
                .ok_or_else(|| format!("no attachment kind for {tag}"))?;
            UnitKind::Media {
                kind,
                source: media_source(payload)?,
                caption: parse_rich_text(&payload["caption"]),
            }
        }
        "child_page" => UnitKind::ChildPage {
            title: payload["title"].as_str().unwrap_or_default().to_string(),
        },
        "child_database" => UnitKind::ChildDatabase {
            title: payload["title"].as_str().unwrap_or_default().to_string(),
        },
        "link_to_page" => link_to_page(payload)?,
        "table" => UnitKind::Table {
            has_column_header: payload["has_column_header"].as_bool().unwrap_or(false),
            has_row_header: payload["has_row_header"].as_bool().unwrap_or(false),
        },
        "table_row" => UnitKind::TableRow {
            cells: payload["cells"]
                .as_array()
                .ok_or_else(|| "table row has no cells".to_string())?
                .iter()
                .map(parse_rich_text)
                .collect(),
        },
        "column_list" => UnitKind::ColumnList,
        "column" => UnitKind::Column,
        "synced_block" => UnitKind::SyncedBlock,
        _ => UnitKind::Unsupported {
            type_tag: tag.to_string(),
            raw: block.clone(),
        },
    };
    Ok(kind)
}

fn required_str(payload: &Value, key: &str) -> Result<String, String> {
    payload[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("missing {key}"))
}

fn web_link(payload: &Value, label: Option<&'static str>) -> Result<UnitKind, String> {
    Ok(UnitKind::WebLink {
        url: required_str(payload, "url")?,
        caption: parse_rich_text(&payload["caption"]),
        label,
    })
}

fn media_source(payload: &Value) -> Result<MediaSource, String> {
    match payload["type"].as_str() {
        Some("file") => Ok(MediaSource::Hosted {
            url: required_str(&payload["file"], "url")?,
        }),
        Some("external") => Ok(MediaSource::External {
            url: required_str(&payload["external"], "url")?,
        }),
        other => Err(format!("unknown media source {other:?}")),
    }
}

fn link_to_page(payload: &Value) -> Result<UnitKind, String> {
    let (kind, key) = match payload["type"].as_str() {
        Some("page_id") => (ObjectKind::Page, "page_id"),
        Some("database_id") => (ObjectKind::Database, "database_id"),
        other => return Err(format!("unknown link target {other:?}")),
    };
    Ok(UnitKind::LinkToPage {
        target_id: canonical_id(&required_str(payload, key)?),
        kind,
    })
}

/// Builds the unit tree of a raw page
///
/// Nodes are created parent-first into an arena, then assembled in reverse
/// creation order so every child is complete before its parent takes it.
pub(crate) fn build_units(raw: &RawObject, ctx: &mut DecodeContext<'_>) -> Vec<ContentUnit> {
    let mut arena: Vec<Option<ContentUnit>> = Vec::new();
    let mut child_slots: Vec<Vec<usize>> = Vec::new();
    let mut roots = Vec::new();
    let mut seen = HashSet::new();

    // (block, parent arena index)
    let mut pending: Vec<(&Value, Option<usize>)> =
        raw.blocks.iter().rev().map(|b| (b, None)).collect();

    while let Some((block, parent)) = pending.pop() {
        let id = block["id"].as_str().unwrap_or_default().to_string();
        let kind = decode_kind(block, &id, ctx);

        let index = arena.len();
        let descend = !matches!(
            kind,
            UnitKind::ChildPage { .. } | UnitKind::ChildDatabase { .. }
        ) && seen.insert(id.clone());

        arena.push(Some(ContentUnit::new(id.clone(), kind)));
        child_slots.push(Vec::new());
        match parent {
            Some(p) => child_slots[p].push(index),
            None => roots.push(index),
        }

        if descend {
            if let Some(error) = raw.unreadable.get(&id) {
                ctx.error(PageError::UnreadableChildren {
                    unit_id: id.clone(),
                    error: error.clone(),
                });
            }
            for child in raw.children_of(&id).iter().rev() {
                pending.push((child, Some(index)));
            }
        }
    }

    for index in (0..arena.len()).rev() {
        let children: Vec<ContentUnit> = child_slots[index]
            .iter()
            .filter_map(|&c| arena[c].take())
            .collect();
        if let Some(unit) = arena[index].as_mut() {
            unit.children = children;
        }
    }

    roots.into_iter().filter_map(|r| arena[r].take()).collect()
}

fn decode_kind(block: &Value, id: &str, ctx: &mut DecodeContext<'_>) -> UnitKind {
    let type_tag = block["type"].as_str().unwrap_or("unknown").to_string();
    match parse_unit(block) {
        Ok(kind) => {
            if let UnitKind::Unsupported { type_tag, .. } = &kind {
                ctx.error(PageError::UnsupportedUnit {
                    unit_id: id.to_string(),
                    type_tag: type_tag.clone(),
                });
            }
            kind
        }
        Err(reason) => {
            ctx.error(PageError::MalformedUnit {
                unit_id: id.to_string(),
                type_tag: type_tag.clone(),
                reason,
            });
            UnitKind::Unsupported {
                type_tag,
                raw: block.clone(),
            }
        }
    }
}

/// Work item of the render loop
enum Step<'u> {
    /// A run of siblings; consecutive list items get grouped into one list
    Siblings(&'u [ContentUnit]),
    Unit(&'u ContentUnit),
    Emit(String),
}

/// Renders a unit forest to HTML, issuing tokens as references are met
pub(crate) fn render_units(units: &[ContentUnit], ctx: &mut DecodeContext<'_>) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Siblings(units)];

    while let Some(step) = stack.pop() {
        let steps = match step {
            Step::Emit(html) => {
                out.push_str(&html);
                continue;
            }
            Step::Siblings(units) => group_siblings(units),
            Step::Unit(unit) => render_unit(unit, ctx),
        };
        stack.extend(steps.into_iter().rev());
    }

    out
}

fn group_siblings(units: &[ContentUnit]) -> Vec<Step<'_>> {
    let mut steps = Vec::new();
    let mut open = None;

    for unit in units {
        let style = unit.kind.list_style();
        if style != open {
            if let Some(current) = open {
                steps.push(Step::Emit(current.close_tag().to_string()));
            }
            if let Some(next) = style {
                steps.push(Step::Emit(next.open_tag().to_string()));
            }
            open = style;
        }
        steps.push(Step::Unit(unit));
    }
    if let Some(current) = open {
        steps.push(Step::Emit(current.close_tag().to_string()));
    }
    steps
}

/// Wraps a unit's children between two fragments
fn wrap<'u>(open: String, children: &'u [ContentUnit], close: &str) -> Vec<Step<'u>> {
    vec![
        Step::Emit(open),
        Step::Siblings(children),
        Step::Emit(close.to_string()),
    ]
}

/// A leaf fragment followed by its children in an indented block
fn with_indented<'u>(html: String, children: &'u [ContentUnit]) -> Vec<Step<'u>> {
    if children.is_empty() {
        return vec![Step::Emit(html)];
    }
    let mut steps = vec![Step::Emit(html)];
    steps.extend(wrap(
        "<div class=\"indented\">".to_string(),
        children,
        "</div>",
    ));
    steps
}

fn render_unit<'u>(unit: &'u ContentUnit, ctx: &mut DecodeContext<'_>) -> Vec<Step<'u>> {
    let children = unit.children.as_slice();
    match &unit.kind {
        UnitKind::Paragraph(text) => {
            with_indented(format!("<p>{}</p>", render_rich_text(text, ctx)), children)
        }
        UnitKind::Heading { level, text } => with_indented(
            format!("<h{level}>{}</h{level}>", render_rich_text(text, ctx)),
            children,
        ),
        UnitKind::BulletedListItem(text) | UnitKind::NumberedListItem(text) => {
            wrap(format!("<li>{}", render_rich_text(text, ctx)), children, "</li>")
        }
        UnitKind::ToDo { text, checked } => {
            let checkbox = if *checked {
                "<input type=\"checkbox\" disabled checked>"
            } else {
                "<input type=\"checkbox\" disabled>"
            };
            wrap(
                format!("<li>{checkbox} {}", render_rich_text(text, ctx)),
                children,
                "</li>",
            )
        }
        UnitKind::Toggle(text) => wrap(
            format!("<details><summary>{}</summary>", render_rich_text(text, ctx)),
            children,
            "</details>",
        ),
        UnitKind::Quote(text) => wrap(
            format!("<blockquote>{}", render_rich_text(text, ctx)),
            children,
            "</blockquote>",
        ),
        UnitKind::Callout { text, icon } => {
            let icon = icon
                .as_deref()
                .map(|i| format!("<span class=\"callout-icon\">{}</span>", escape(i)))
                .unwrap_or_default();
            wrap(
                format!(
                    "<div class=\"callout\">{icon}<p>{}</p>",
                    render_rich_text(text, ctx)
                ),
                children,
                "</div>",
            )
        }
        UnitKind::Code { text, language } => vec![Step::Emit(format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            escape(language),
            render_rich_text(text, ctx)
        ))],
        UnitKind::Template(text) => wrap(
            format!("<div class=\"template\">{}", render_rich_text(text, ctx)),
            children,
            "</div>",
        ),
        UnitKind::Equation { expression } => vec![Step::Emit(format!(
            "<div class=\"equation\">{}</div>",
            escape(expression)
        ))],
        UnitKind::Divider => vec![Step::Emit("<hr>".to_string())],
        UnitKind::TableOfContents => vec![Step::Emit(
            "<nav class=\"table-of-contents\"></nav>".to_string(),
        )],
        UnitKind::Breadcrumb => vec![Step::Emit("<nav class=\"breadcrumb\"></nav>".to_string())],
        UnitKind::WebLink {
            url,
            caption,
            label,
        } => {
            let text = match label {
                _ if !caption.is_empty() => render_rich_text(caption, ctx),
                Some(label) => escape(label),
                None => escape(url),
            };
            vec![Step::Emit(format!(
                "<p class=\"web-link\">{}</p>",
                anchor(url, &text)
            ))]
        }
        UnitKind::Media {
            kind,
            source,
            caption,
        } => vec![Step::Emit(render_media(*kind, source, caption, ctx))],
        UnitKind::ChildPage { title } => {
            let placeholder = ctx.link(&canonical_id(&unit.id), Some(title));
            vec![Step::Emit(format!("<p class=\"child-page\">{placeholder}</p>"))]
        }
        UnitKind::ChildDatabase { title } => {
            ctx.reference(ObjectRef::database(canonical_id(&unit.id)));
            let title = if title.is_empty() { "Untitled" } else { title };
            vec![Step::Emit(format!(
                "<p class=\"child-database\">{}</p>",
                escape(title)
            ))]
        }
        UnitKind::LinkToPage { target_id, kind } => match kind {
            ObjectKind::Page => {
                let placeholder = ctx.link(target_id, None);
                vec![Step::Emit(format!("<p class=\"link-to-page\">{placeholder}</p>"))]
            }
            ObjectKind::Database => {
                ctx.reference(ObjectRef::database(target_id.clone()));
                vec![Step::Emit(format!(
                    "<p class=\"link-to-database\">{}</p>",
                    escape(target_id)
                ))]
            }
        },
        UnitKind::Table {
            has_column_header,
            has_row_header,
        } => vec![Step::Emit(render_table(
            children,
            *has_column_header,
            *has_row_header,
            ctx,
        ))],
        UnitKind::TableRow { .. } => vec![Step::Emit(render_table(
            std::slice::from_ref(unit),
            false,
            false,
            ctx,
        ))],
        UnitKind::ColumnList => wrap(
            "<div class=\"column-list\">".to_string(),
            children,
            "</div>",
        ),
        UnitKind::Column => wrap("<div class=\"column\">".to_string(), children, "</div>"),
        UnitKind::SyncedBlock => wrap(
            "<div class=\"synced-block\">".to_string(),
            children,
            "</div>",
        ),
        UnitKind::Unsupported { type_tag, .. } => wrap(
            format!("<div class=\"unsupported\" data-type=\"{}\">", escape(type_tag)),
            children,
            "</div>",
        ),
    }
}

fn render_media(
    kind: AttachmentKind,
    source: &MediaSource,
    caption: &RichText,
    ctx: &mut DecodeContext<'_>,
) -> String {
    let body = match source {
        MediaSource::Hosted { url } => ctx.attachment(kind, url),
        MediaSource::External { url } => match kind {
            AttachmentKind::Image => format!(
                "<img src=\"{}\" alt=\"{}\">",
                escape(url),
                escape(&plain_text(caption))
            ),
            _ => anchor(url, &escape(url)),
        },
    };
    let caption = if caption.is_empty() {
        String::new()
    } else {
        format!("<figcaption>{}</figcaption>", render_rich_text(caption, ctx))
    };
    format!("<figure>{body}{caption}</figure>")
}

fn render_table(
    rows: &[ContentUnit],
    has_column_header: bool,
    has_row_header: bool,
    ctx: &mut DecodeContext<'_>,
) -> String {
    let mut html = String::from("<table>");
    let table_rows = rows.iter().filter_map(|row| match &row.kind {
        UnitKind::TableRow { cells } => Some(cells),
        _ => None,
    });

    for (r, cells) in table_rows.enumerate() {
        html.push_str("<tr>");
        for (c, cell) in cells.iter().enumerate() {
            let tag = if (r == 0 && has_column_header) || (c == 0 && has_row_header) {
                "th"
            } else {
                "td"
            };
            html.push_str(&format!("<{tag}>{}</{tag}>", render_rich_text(cell, ctx)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}
