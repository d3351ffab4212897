//! A resilient RSS/Atom news ticker.
//!
//! - [`feed`] fetches feed documents (redirects, content-encoding, an
//!   uncompressed fallback) and scans them into [`feed::FeedItem`]s
//! - [`ticker`] runs fetch-and-parse cycles on a fixed interval and reports
//!   one [`ticker::TickerEvent`] per cycle
//! - [`config`] loads the TOML configuration
//! - [`util`] holds text sanitization and URL validation

pub mod config;
pub mod feed;
pub mod ticker;
pub mod util;
