use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Named entities decoded by [`decode_html_entities`]. Anything else is left verbatim.
static NAMED_ENTITIES: [(&str, &str); 5] = [
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
];

fn cdata_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"(?is)<!\[CDATA\[(.*?)\]\]>"))
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"<[^>]+>"))
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| compile(r"(?i)&(#x?[0-9a-f]+|[a-z]+);"))
}

/// Compiles one of the crate's built-in patterns.
///
/// Panics on an invalid pattern. Callers pass only literals exercised by tests.
pub(crate) fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("built-in pattern {pattern:?} failed to compile: {e}"),
    }
}

/// Replaces every `<![CDATA[ ... ]]>` wrapper with its inner text.
pub fn strip_cdata(value: &str) -> Cow<'_, str> {
    cdata_pattern().replace_all(value, "${1}")
}

/// Removes every `<...>` sequence. Markup is dropped, never decoded.
pub fn strip_tags(value: &str) -> Cow<'_, str> {
    tag_pattern().replace_all(value, "")
}

/// Decodes the five XML named entities plus decimal (`&#65;`) and hex
/// (`&#x42;`) numeric entities.
///
/// Unknown named entities, and numeric entities that do not name a Unicode
/// scalar value, are returned unchanged.
///
/// # Examples
///
/// ```
/// use newsticker::util::decode_html_entities;
///
/// assert_eq!(decode_html_entities("&#65;&#x42;"), "AB");
/// assert_eq!(decode_html_entities("Tom &amp; Jerry"), "Tom & Jerry");
/// assert_eq!(decode_html_entities("&foo;"), "&foo;");
/// ```
pub fn decode_html_entities(value: &str) -> Cow<'_, str> {
    entity_pattern().replace_all(value, |caps: &Captures<'_>| {
        let entity = caps[1].to_ascii_lowercase();
        decode_entity(&entity).unwrap_or_else(|| caps[0].to_owned())
    })
}

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(hex) = entity.strip_prefix("#x") {
        return code_point(u32::from_str_radix(hex, 16).ok()?);
    }
    if let Some(decimal) = entity.strip_prefix('#') {
        return code_point(decimal.parse::<u32>().ok()?);
    }
    NAMED_ENTITIES
        .iter()
        .find(|(name, _)| *name == entity)
        .map(|(_, decoded)| (*decoded).to_owned())
}

fn code_point(value: u32) -> Option<String> {
    char::from_u32(value).map(String::from)
}

/// Collapses every run of whitespace into a single space and trims both ends.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns a raw feed field into plain display text.
///
/// Steps, in order: unwrap CDATA, drop tags, decode entities, collapse
/// whitespace, trim.
///
/// # Examples
///
/// ```
/// use newsticker::util::sanitize;
///
/// assert_eq!(sanitize("<![CDATA[Hello &amp; <b>World</b>]]>"), "Hello & World");
/// assert_eq!(sanitize("  spaced\n\t out  "), "spaced out");
/// ```
pub fn sanitize(value: &str) -> String {
    let unwrapped = strip_cdata(value);
    let untagged = strip_tags(&unwrapped);
    let decoded = decode_html_entities(&untagged);
    collapse_whitespace(&decoded)
}

/// Ellipsis appended when a line is cut short.
const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Truncates a string to at most `max_width` terminal columns.
///
/// Appends `...` when text is cut. Widths of three columns or fewer have no
/// room for an ellipsis, so the string is simply cut. Wide characters (CJK,
/// emoji) count as two columns.
///
/// # Examples
///
/// ```
/// use newsticker::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if UnicodeWidthStr::width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let (budget, suffix) = if max_width <= ELLIPSIS_WIDTH {
        (max_width, "")
    } else {
        (max_width - ELLIPSIS_WIDTH, ELLIPSIS)
    };

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{}", &s[..cut], suffix))
}

/// Removes C0/C1 control characters and ANSI escape sequences.
///
/// Feed text ends up on a terminal, so escape sequences embedded in a title
/// must not reach it. Tabs and newlines are kept.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_unsafe = |c: char| {
        c == '\x1b'
            || c == '\x7f'
            || (c < ' ' && c != '\t' && c != '\n')
            || ('\u{80}'..='\u{9f}').contains(&c)
    };
    if !s.chars().any(is_unsafe) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{9b}' {
            // 8-bit CSI
            for n in chars.by_ref() {
                if ('\x40'..='\x7e').contains(&n) {
                    break;
                }
            }
        } else if c == '\x1b' {
            match chars.peek() {
                // CSI: parameters run until a final byte in 0x40..=0x7e
                Some('[') => {
                    chars.next();
                    for n in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&n) {
                            break;
                        }
                    }
                }
                // OSC: terminated by BEL or ESC \
                Some(']') => {
                    chars.next();
                    while let Some(n) = chars.next() {
                        if n == '\x07' {
                            break;
                        }
                        if n == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_unsafe(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Joins item titles into one ticker line.
///
/// Control characters are stripped from each title. A `max_width` of zero
/// disables truncation.
pub fn ticker_line<'a, I>(titles: I, separator: &str, max_width: usize) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let line = titles
        .into_iter()
        .map(strip_control_chars)
        .collect::<Vec<_>>()
        .join(separator);

    if max_width == 0 {
        line
    } else {
        truncate_to_width(&line, max_width).into_owned()
    }
}
