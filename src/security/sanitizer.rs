//! Rich-text cleaning for ticket and comment bodies.
//!
//! A submitted body is turned into two renderings: a safe HTML fragment that
//! keeps basic formatting, and a plain-text version used for validation and
//! listings.

use regex::Regex;
use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurifiedContent {
    pub content: String,
    pub html: String,
}

pub trait ContentSanitizer: Send + Sync {
    fn purify(&self, raw: &str) -> PurifiedContent;
}

const DEFAULT_ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "em", "h1", "h2", "h3", "h4", "hr", "i", "li", "ol",
    "p", "pre", "s", "span", "strong", "sub", "sup", "table", "tbody", "td", "th", "thead", "tr",
    "u", "ul",
];

/// Dropped together with everything inside them.
const DISCARDED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "svg", "math",
    "textarea", "title",
];

const VOID_TAGS: &[&str] = &["br", "hr"];

const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

const MAX_DEPTH: usize = 64;

static ANY_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid HTML tag regex"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\n]+").expect("Invalid whitespace regex"));

/// Allow-list purifier over a parsed fragment.
///
/// Unknown tags are dropped but their text is kept. Script-like elements go
/// with their content. Attributes are dropped except `href` and `title` on
/// links, and an `href` survives only with an http, https or mailto scheme
/// (or none).
#[derive(Debug, Clone)]
pub struct HtmlPurifier {
    allowed_tags: Vec<String>,
}

impl HtmlPurifier {
    pub fn new() -> Self {
        Self::with_allowed_tags(DEFAULT_ALLOWED_TAGS.iter().copied())
    }

    pub fn with_allowed_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            allowed_tags: tags.into_iter().map(|t| t.to_ascii_lowercase()).collect(),
        }
    }

    fn is_allowed(&self, tag: &str) -> bool {
        self.allowed_tags.iter().any(|t| t == tag)
    }

    pub fn clean_html(&self, raw: &str) -> String {
        let fragment = Html::parse_fragment(raw);
        let mut out = String::with_capacity(raw.len());
        self.write_children(fragment.root_element(), 0, &mut out);
        out.trim().to_string()
    }

    fn write_children(&self, parent: ElementRef<'_>, depth: usize, out: &mut String) {
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => out.push_str(&escape_text(text)),
                Node::Element(_) => {
                    if let Some(element) = ElementRef::wrap(child) {
                        self.write_element(element, depth + 1, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn write_element(&self, element: ElementRef<'_>, depth: usize, out: &mut String) {
        let name = element.value().name().to_ascii_lowercase();
        if DISCARDED_TAGS.contains(&name.as_str()) {
            return;
        }
        if depth > MAX_DEPTH {
            let text: String = element.text().collect();
            out.push_str(&escape_text(&text));
            return;
        }
        if !self.is_allowed(&name) {
            self.write_children(element, depth, out);
            return;
        }

        out.push('<');
        out.push_str(&name);
        for (attr, value) in element.value().attrs() {
            if let Some(attr) = allowed_attribute(&name, attr, value) {
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }
        }
        out.push('>');
        if VOID_TAGS.contains(&name.as_str()) {
            return;
        }
        self.write_children(element, depth, out);
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

fn allowed_attribute(tag: &str, attr: &str, value: &str) -> Option<&'static str> {
    match (tag, attr.to_ascii_lowercase().as_str()) {
        ("a", "href") if is_safe_url(value) => Some("href"),
        ("a", "title") => Some("title"),
        _ => None,
    }
}

/// `value` is already entity-decoded by the parser. Browsers ignore control
/// characters and whitespace inside a scheme, so those are removed first.
fn is_safe_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_control() && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let scheme_end = compact.find(':');
    let path_start = compact.find(['/', '?', '#']);
    match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => true,
        (Some(colon), _) => ALLOWED_URL_SCHEMES.contains(&&compact[..colon]),
        (None, _) => true,
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

impl Default for HtmlPurifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSanitizer for HtmlPurifier {
    fn purify(&self, raw: &str) -> PurifiedContent {
        let html = self.clean_html(raw);
        let content = strip_html_tags(&html);
        PurifiedContent { content, html }
    }
}

/// Removes every tag, decodes the common entities and collapses whitespace.
pub fn strip_html_tags(input: &str) -> String {
    let spaced = input
        .replace("<br>", " ")
        .replace("<br/>", " ")
        .replace("<br />", " ")
        .replace("</p>", " ");
    let text = ANY_TAG_REGEX.replace_all(&spaced, "");
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE_REGEX.replace_all(&decoded, " ").trim().to_string()
}
