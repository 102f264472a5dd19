//! Content extraction for fetched pages
//!
//! This module turns raw HTML into:
//! - Page metadata (description, author, publication date)
//! - Readable main text, without navigation and other boilerplate
//!
//! Extraction never fails: missing metadata fields are `None` and a page
//! with no readable text yields `None` for the text.

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;

/// Metadata found in a page's head and markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
}

/// Options for main text extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOptions {
    /// Keep user comment sections
    pub include_comments: bool,

    /// Keep table contents, one row per line
    pub include_tables: bool,

    /// Prepend a header with the page metadata
    pub with_metadata: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            include_comments: false,
            include_tables: true,
            with_metadata: false,
        }
    }
}

// ===== Metadata =====

const DESCRIPTION_KEYS: &[&str] = &["description", "og:description", "twitter:description"];
const AUTHOR_KEYS: &[&str] = &["author", "article:author", "og:article:author"];
const DATE_KEYS: &[&str] = &[
    "article:published_time",
    "og:article:published_time",
    "date",
    "datepublished",
    "dc.date",
];

/// Element fallbacks for author when no meta tag names one
const AUTHOR_SELECTORS: &[&str] = &[
    "[itemprop='author'] [itemprop='name']",
    "[itemprop='author']",
    "a[rel='author']",
];

/// Element fallbacks for the publication date
const DATE_SELECTORS: &[&str] = &["time[datetime]"];

/// Extracts description, author and date from a page
///
/// # Arguments
///
/// * `html` - The HTML content to inspect
///
/// # Example
///
/// ```
/// use lantern_crawl::crawler::extract_metadata;
///
/// let html = r#"<html><head><meta name="author" content="Ada"></head></html>"#;
/// let metadata = extract_metadata(html);
/// assert_eq!(metadata.author.as_deref(), Some("Ada"));
/// assert!(metadata.description.is_none());
/// ```
pub fn extract_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);
    metadata_from_document(&document)
}

fn metadata_from_document(document: &Html) -> PageMetadata {
    let meta = collect_meta_tags(document);
    let lookup = |keys: &[&str]| keys.iter().find_map(|key| meta.get(*key).cloned());

    PageMetadata {
        title: extract_title(document),
        description: lookup(DESCRIPTION_KEYS),
        author: lookup(AUTHOR_KEYS).or_else(|| first_match(document, AUTHOR_SELECTORS)),
        date: lookup(DATE_KEYS).or_else(|| first_match(document, DATE_SELECTORS)),
    }
}

/// Maps lowercased `name`/`property`/`itemprop` keys to the first non-empty content
fn collect_meta_tags(document: &Html) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return tags;
    };

    for element in document.select(&selector) {
        let attrs = element.value();
        let Some(content) = attrs.attr("content").and_then(clean) else {
            continue;
        };
        for key_attr in ["name", "property", "itemprop"] {
            if let Some(key) = attrs.attr(key_attr) {
                tags.entry(key.trim().to_ascii_lowercase())
                    .or_insert_with(|| content.clone());
            }
        }
    }

    tags
}

fn first_match(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document.select(&selector).find_map(|element| {
            let attrs = element.value();
            attrs
                .attr("content")
                .or_else(|| attrs.attr("datetime"))
                .and_then(clean)
                .or_else(|| clean(&element.text().collect::<String>()))
        })
    })
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .and_then(|element| clean(&element.text().collect::<String>()))
}

fn clean(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

// ===== Main text =====

/// Subtrees that never contain readable content
const SKIPPED_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "canvas", "iframe", "nav",
    "footer", "aside", "form", "button", "select",
];

/// Elements that start a new line of output
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "ol", "p", "pre",
    "section", "table", "tbody", "thead", "tfoot", "tr", "ul",
];

const TABLE_TAGS: &[&str] = &["table", "thead", "tbody", "tfoot", "tr", "td", "th", "caption"];

/// Extracts the readable main text of a page
///
/// The text root is the largest `<article>`, else `<main>`, else `<body>`.
/// Scripts, styles, navigation, footers, sidebars and forms are dropped.
/// Lines are whitespace-collapsed and blank lines removed.
///
/// # Arguments
///
/// * `html` - The HTML content
/// * `options` - What to keep besides body text
///
/// # Returns
///
/// `None` when nothing readable remains.
pub fn extract_text(html: &str, options: &TextOptions) -> Option<String> {
    let document = Html::parse_document(html);
    let root = content_root(&document);

    let mut buffer = String::new();
    collect_text(root, options, &mut buffer);
    let body = normalize_lines(&buffer);

    if body.is_empty() {
        return None;
    }

    if options.with_metadata {
        let header = metadata_header(&metadata_from_document(&document));
        if !header.is_empty() {
            return Some(format!("{}\n\n{}", header, body));
        }
    }

    Some(body)
}

fn content_root(document: &Html) -> ElementRef<'_> {
    if let Ok(selector) = Selector::parse("article") {
        let largest = document
            .select(&selector)
            .max_by_key(|article| article.text().map(str::len).sum::<usize>());
        if let Some(article) = largest {
            return article;
        }
    }

    for tag in ["main", "body"] {
        if let Ok(selector) = Selector::parse(tag) {
            if let Some(element) = document.select(&selector).next() {
                return element;
            }
        }
    }

    document.root_element()
}

fn collect_text(element: ElementRef<'_>, options: &TextOptions, buffer: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => buffer.push_str(text),
            Node::Element(_) => {
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                if should_skip(child_element, options) {
                    continue;
                }

                let tag = child_element.value().name();
                if tag == "td" || tag == "th" {
                    if current_line_has_text(buffer) {
                        buffer.push_str(" | ");
                    }
                    collect_text(child_element, options, buffer);
                } else if BLOCK_TAGS.contains(&tag) {
                    buffer.push('\n');
                    collect_text(child_element, options, buffer);
                    buffer.push('\n');
                } else {
                    collect_text(child_element, options, buffer);
                }
            }
            // HTML comments, doctypes and processing instructions
            _ => {}
        }
    }
}

fn should_skip(element: ElementRef<'_>, options: &TextOptions) -> bool {
    let attrs = element.value();
    let tag = attrs.name();

    if SKIPPED_TAGS.contains(&tag) || attrs.attr("hidden").is_some() {
        return true;
    }
    if !options.include_tables && TABLE_TAGS.contains(&tag) {
        return true;
    }
    !options.include_comments && is_comment_section(element)
}

/// Whole id/class tokens that name a user comment section
const COMMENT_SECTIONS: &[&str] = &[
    "comment",
    "comments",
    "comment-list",
    "commentlist",
    "comments-list",
    "comment-area",
    "comments-area",
    "comment-section",
    "comments-section",
    "comment-thread",
    "comments-thread",
    "comment-respond",
    "comment-form",
    "disqus_thread",
    "dsq-content",
];

fn is_comment_section(element: ElementRef<'_>) -> bool {
    let attrs = element.value();
    let names_comments = |token: &str| {
        COMMENT_SECTIONS
            .iter()
            .any(|name| name.eq_ignore_ascii_case(token.trim()))
    };

    attrs.id().map(names_comments).unwrap_or(false) || attrs.classes().any(names_comments)
}

fn current_line_has_text(buffer: &str) -> bool {
    buffer
        .rsplit('\n')
        .next()
        .map(|line| !line.trim().is_empty())
        .unwrap_or(false)
}

fn normalize_lines(buffer: &str) -> String {
    buffer
        .lines()
        .filter_map(clean)
        .collect::<Vec<_>>()
        .join("\n")
}

fn metadata_header(metadata: &PageMetadata) -> String {
    [
        ("Title", &metadata.title),
        ("Author", &metadata.author),
        ("Date", &metadata.date),
        ("Description", &metadata.description),
    ]
    .iter()
    .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v)))
    .collect::<Vec<_>>()
    .join("\n")
}
