//! Utility functions shared by the fetcher, the parser and the binary.
//!
//! - **URL validation**: only absolute http(s) URLs are accepted as feed sources
//! - **Text processing**: feed field sanitization (CDATA, tags, entities,
//!   whitespace) and terminal-safe ticker line rendering
//!
//! # Examples
//!
//! ```
//! use newsticker::util::{sanitize, ticker_line, validate_feed_url};
//!
//! let url = validate_feed_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(sanitize("<![CDATA[Rates &amp; <i>markets</i>]]>"), "Rates & markets");
//! assert_eq!(ticker_line(["One", "Two"], " • ", 0), "One • Two");
//! ```

mod text;
mod url_validator;

pub(crate) use text::compile;
pub use text::{
    collapse_whitespace, decode_html_entities, sanitize, strip_cdata, strip_control_chars,
    strip_tags, ticker_line, truncate_to_width,
};
pub use url_validator::{validate_feed_url, UrlValidationError};
