//! Integration tests for the full pipeline: HTTP fetch, feed scanning, scheduling.
//!
//! Each test starts its own wiremock server and drives a real `FeedFetcher`
//! through a `Ticker`. Only the immediate first cycle of each schedule is
//! observed, so no test waits out a refresh interval.

use newsticker::config::Config;
use newsticker::feed::{FeedFetcher, FeedItem};
use newsticker::ticker::{run_cycle, FeedSource, Ticker, TickerEvent};
use newsticker::util::ticker_line;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WORLD_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>World</title>
    <item>
      <title><![CDATA[Talks <b>resume</b> in Geneva]]></title>
      <link>https://example.com/geneva</link>
      <pubDate>Mon, 12 Oct 2026 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Markets &amp; rates   steady</title>
      <guid>https://example.com/markets</guid>
      <dc:date>2026-10-12T09:00:00Z</dc:date>
    </item>
    <item>
      <title>   </title>
      <link>https://example.com/untitled</link>
    </item>
    <item>
      <title>Storm warning issued</title>
    </item>
  </channel>
</rss>"#;

async fn next_event(rx: &mut mpsc::Receiver<TickerEvent>) -> TickerEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("No ticker event within 10s")
        .expect("Ticker channel closed")
}

fn item(title: &str, link: &str, pub_date: Option<&str>) -> FeedItem {
    FeedItem {
        title: title.to_string(),
        link: link.to_string(),
        pub_date: pub_date.map(str::to_string),
    }
}

async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

// ============================================================================
// Scheduled Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_first_cycle_delivers_sanitized_items() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/world.xml",
        ResponseTemplate::new(200).set_body_string(WORLD_FEED),
    )
    .await;

    let (tx, mut rx) = mpsc::channel(4);
    let mut ticker = Ticker::new(Arc::new(FeedFetcher::new().unwrap()), tx);
    ticker.configure(FeedSource::new(format!("{}/world.xml", server.uri()), 10, 600_000));

    let event = next_event(&mut rx).await;
    assert_eq!(
        event,
        TickerEvent::News {
            items: vec![
                item(
                    "Talks resume in Geneva",
                    "https://example.com/geneva",
                    Some("Mon, 12 Oct 2026 08:00:00 GMT"),
                ),
                item(
                    "Markets & rates steady",
                    "https://example.com/markets",
                    Some("2026-10-12T09:00:00Z"),
                ),
                item("Storm warning issued", "", None),
            ]
        }
    );

    ticker.stop();
}

#[tokio::test]
async fn test_server_error_becomes_error_event() {
    let server = MockServer::start().await;
    serve(&server, "/down.xml", ResponseTemplate::new(500)).await;

    let (tx, mut rx) = mpsc::channel(4);
    let mut ticker = Ticker::new(Arc::new(FeedFetcher::new().unwrap()), tx);
    ticker.configure(
        FeedSource::new(format!("{}/down.xml", server.uri()), 10, 600_000).with_name("World"),
    );

    let event = next_event(&mut rx).await;
    assert_eq!(
        event,
        TickerEvent::Error {
            message: "World update failed: Request failed with status 500".to_string()
        }
    );
    assert!(ticker.is_running());
}

#[tokio::test]
async fn test_redirected_feed_through_ticker() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/old.xml",
        ResponseTemplate::new(301).insert_header("Location", "/world.xml"),
    )
    .await;
    serve(
        &server,
        "/world.xml",
        ResponseTemplate::new(200).set_body_string(WORLD_FEED),
    )
    .await;

    let (tx, mut rx) = mpsc::channel(4);
    let mut ticker = Ticker::new(Arc::new(FeedFetcher::new().unwrap()), tx);
    ticker.configure(FeedSource::new(format!("{}/old.xml", server.uri()), 1, 600_000));

    match next_event(&mut rx).await {
        TickerEvent::News { items } => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].title, "Talks resume in Geneva");
        }
        other => panic!("Expected news, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reconfigure_switches_feed() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/world.xml",
        ResponseTemplate::new(200).set_body_string(WORLD_FEED),
    )
    .await;
    serve(&server, "/gone.xml", ResponseTemplate::new(404)).await;

    let (tx, mut rx) = mpsc::channel(4);
    let mut ticker = Ticker::new(Arc::new(FeedFetcher::new().unwrap()), tx);

    ticker.configure(FeedSource::new(format!("{}/gone.xml", server.uri()), 10, 600_000));
    assert!(matches!(next_event(&mut rx).await, TickerEvent::Error { .. }));

    ticker.configure(FeedSource::new(format!("{}/world.xml", server.uri()), 2, 600_000));
    match next_event(&mut rx).await {
        TickerEvent::News { items } => assert_eq!(items.len(), 2),
        other => panic!("Expected news, got {other:?}"),
    }
}

// ============================================================================
// One-shot Tests
// ============================================================================

#[tokio::test]
async fn test_config_source_to_ticker_line() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/world.xml",
        ResponseTemplate::new(200).set_body_string(WORLD_FEED),
    )
    .await;

    let config = Config {
        feed_url: format!("{}/world.xml", server.uri()),
        max_items: 2,
        separator: " | ".to_string(),
        ..Config::default()
    };
    let fetcher = FeedFetcher::new().unwrap();

    let event = run_cycle(&fetcher, &config.feed_source()).await;
    let TickerEvent::News { items } = event else {
        panic!("Expected news, got {event:?}");
    };

    let line = ticker_line(
        items.iter().map(|i| i.title.as_str()),
        &config.separator,
        config.max_line_width,
    );
    assert_eq!(line, "Talks resume in Geneva | Markets & rates steady");
}

#[tokio::test]
async fn test_unreachable_host_reports_network_error() {
    let fetcher = FeedFetcher::with_timeout(Duration::from_secs(2)).unwrap();
    let source = FeedSource::new("http://127.0.0.1:1/rss.xml", 10, 600_000);

    match run_cycle(&fetcher, &source).await {
        TickerEvent::Error { message } => assert!(message.starts_with("News update failed: ")),
        other => panic!("Expected error, got {other:?}"),
    }
}
