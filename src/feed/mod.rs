//! Feed retrieval and entry extraction.
//!
//! - `fetcher`: HTTP(S) retrieval with manual redirect following,
//!   content-encoding decoding and an uncompressed fallback
//! - `parser`: tolerant `<item>` scanner producing sanitized [`FeedItem`]s
//!
//! # Example
//!
//! ```ignore
//! use newsticker::feed::{parse_feed, FeedFetcher};
//!
//! let fetcher = FeedFetcher::new()?;
//! let xml = fetcher.fetch("https://feeds.bbci.co.uk/news/world/rss.xml").await?;
//! let items = parse_feed(&xml, 10);
//! ```

mod fetcher;
mod parser;

pub use fetcher::{
    FeedFetcher, FetchAttempt, FetchError, FetchFeed, MAX_REDIRECTS, REQUEST_TIMEOUT, USER_AGENT,
};
pub use parser::{parse_feed, FeedItem};
