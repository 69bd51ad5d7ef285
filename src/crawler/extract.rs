//! Single-page extraction: fetch, strip chrome, pull main content and title.

use chrono::Utc;
use ego_tree::NodeRef;
use reqwest::{Client, StatusCode};
use scraper::{node::Node, ElementRef, Html, Selector};

use crate::classify::categorize;
use crate::text::clean_text;
use crate::types::DocumentChunk;

/// Subtrees excluded from text extraction.
const STRIP_TAGS: [&str; 5] = ["script", "style", "nav", "header", "footer"];

/// Structural candidates for the main content container, first non-empty
/// match wins.
const CONTENT_SELECTORS: [&str; 5] = ["main", "article", ".content", "#content", ".support-content"];

/// Fetches a page and extracts it into a [`DocumentChunk`].
///
/// Every failure mode (transport error, non-200 status, unreadable body,
/// a page with no usable text) is logged and collapses to `None`; a bad
/// page never aborts the crawl that requested it.
pub async fn extract_page(
    client: &Client,
    url: &str,
    max_content_length: usize,
) -> Option<DocumentChunk> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(url, error = %err, "page fetch failed");
            return None;
        }
    };
    if response.status() != StatusCode::OK {
        tracing::warn!(url, status = %response.status(), "page returned non-200");
        return None;
    }
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(url, error = %err, "page body unreadable");
            return None;
        }
    };

    let (title, content) = parse_page(&body, max_content_length);
    if content.is_empty() {
        tracing::warn!(url, "page had no extractable content");
        return None;
    }

    let category = categorize(&format!("{title} {content}"));
    Some(
        DocumentChunk::new(content, title, url, category)
            .with_metadata("scraped_at", Utc::now().to_rfc3339()),
    )
}

/// Parses HTML into `(title, content)`, both normalized.
///
/// Kept synchronous on purpose: `scraper::Html` is not `Send`, so it must
/// never live across an await point.
pub fn parse_page(html: &str, max_content_length: usize) -> (String, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|element| element.text().collect::<String>().trim().to_string())
        })
        .unwrap_or_default();

    let mut content = String::new();
    for candidate in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(candidate) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element_text(element);
            if !text.is_empty() {
                content = text;
                break;
            }
        }
    }
    if content.is_empty() {
        content = element_text(document.root_element());
    }

    (title, truncate_chars(&content, max_content_length))
}

fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(*element, &mut raw);
    clean_text(&raw)
}

/// Recursive DOM walk that skips comment nodes and [`STRIP_TAGS`] subtrees.
fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push_str(trimmed);
                out.push('\n');
            }
        }
        Node::Comment(_) => {}
        Node::Element(element) => {
            if STRIP_TAGS.contains(&element.name()) {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

fn truncate_chars(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        text.chars().take(max_len).collect()
    }
}
