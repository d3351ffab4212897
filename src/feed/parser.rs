use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::{compile, decode_html_entities, sanitize};

/// Tags tried, in order, for each field of an entry.
const TITLE_TAGS: &[&str] = &["title"];
const LINK_TAGS: &[&str] = &["link", "guid", "atom:link", "dc:identifier"];
const DATE_TAGS: &[&str] = &["pubDate", "updated", "dc:date", "atom:updated"];

/// One entry extracted from a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Sanitized title, never empty
    pub title: String,
    /// Sanitized link, empty when the entry carries none
    pub link: String,
    /// Sanitized publish date as written in the feed
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
}

/// Content pattern for a single tag name, e.g. `<title type="text">(...)</title>`.
struct TagPattern {
    name: &'static str,
    regex: Regex,
}

fn tag_patterns() -> &'static [TagPattern] {
    static PATTERNS: OnceLock<Vec<TagPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        TITLE_TAGS
            .iter()
            .chain(LINK_TAGS)
            .chain(DATE_TAGS)
            .map(|&name| {
                let escaped = regex::escape(name);
                TagPattern {
                    name,
                    regex: compile(&format!(r"(?is)<{escaped}(?:\s[^>]*)?>(.*?)</{escaped}>")),
                }
            })
            .collect()
    })
}

fn item_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"(?is)<item(?:\s[^>]*)?>.*?</item>"))
}

fn link_href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r#"(?i)<link[^>]*href=["']([^"']+)["'][^>]*>"#))
}

/// Raw inner text of the first `<name>...</name>` element in `block`.
fn tag_content<'a>(block: &'a str, name: &str) -> Option<&'a str> {
    let pattern = tag_patterns().iter().find(|p| p.name == name)?;
    pattern
        .regex
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// First non-empty raw content among `names`, tried in order.
fn extract_first<'a>(block: &'a str, names: &[&str]) -> &'a str {
    names
        .iter()
        .filter_map(|name| tag_content(block, name))
        .find(|content| !content.is_empty())
        .unwrap_or("")
}

fn extract_link(block: &str) -> String {
    let link = sanitize(extract_first(block, LINK_TAGS));
    if !link.is_empty() {
        return link;
    }

    link_href_pattern()
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|href| decode_html_entities(href.as_str().trim()).into_owned())
        .unwrap_or_default()
}

fn parse_item(block: &str) -> Option<FeedItem> {
    let title = sanitize(extract_first(block, TITLE_TAGS));
    if title.is_empty() {
        return None;
    }

    let link = extract_link(block);
    let pub_date = Some(sanitize(extract_first(block, DATE_TAGS))).filter(|d| !d.is_empty());

    Some(FeedItem {
        title,
        link,
        pub_date,
    })
}

/// Extracts up to `max_items` entries from raw RSS/Atom text.
///
/// Scans `<item>` blocks with tolerant patterns rather than an XML parser,
/// so unescaped ampersands or stray namespaces do not sink the whole feed.
/// Entries whose sanitized title is empty are skipped; a missing link
/// becomes `""` and a missing date becomes `None`.
///
/// The result preserves document order and never exceeds `max_items`.
///
/// # Examples
///
/// ```
/// use newsticker::feed::parse_feed;
///
/// let xml = "<rss><channel>\
///     <item><title>A</title><link>http://x/a</link><pubDate>Mon</pubDate></item>\
///     <item><title>B</title></item>\
/// </channel></rss>";
///
/// let items = parse_feed(xml, 10);
/// assert_eq!(items.len(), 2);
/// assert_eq!(items[0].link, "http://x/a");
/// assert_eq!(items[1].pub_date, None);
/// ```
pub fn parse_feed(raw: &str, max_items: usize) -> Vec<FeedItem> {
    let mut items = Vec::new();
    if max_items == 0 {
        return items;
    }

    for block in item_pattern().find_iter(raw) {
        let Some(item) = parse_item(block.as_str()) else {
            tracing::trace!("Skipping feed entry without a title");
            continue;
        };
        items.push(item);
        if items.len() >= max_items {
            break;
        }
    }

    items
}
