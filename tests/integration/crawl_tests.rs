//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use async_trait::async_trait;
use reqwest::{Request, Response};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use trawl::crawler::rules::{follow_links, html_only};
use trawl::crawler::Transport;
use trawl::output::{record_rule, SqliteSink};
use trawl::{CrawlError, CrawlOption, CrawlState, CrawlSummary, Crawler};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>Test</title></head><body>{}</body></html>",
            body
        ))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, page: &str, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .expect(expected)
        .mount(server)
        .await;
}

async fn run(options: Vec<CrawlOption>) -> (Crawler, CrawlSummary) {
    let crawler = Crawler::builder()
        .options(options)
        .expect("valid options")
        .start()
        .expect("crawl starts");

    let summary = tokio::time::timeout(Duration::from_secs(20), crawler.wait())
        .await
        .expect("crawl should terminate");

    (crawler, summary)
}

/// Forwards to a real client while tracking concurrent sends
struct CountingTransport {
    client: reqwest::Client,
    current: AtomicUsize,
    max: AtomicUsize,
    sent: AtomicUsize,
}

impl CountingTransport {
    fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            current: AtomicUsize::new(0),
            max: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn send(&self, request: Request) -> Result<Response, reqwest::Error> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        self.sent.fetch_add(1, Ordering::SeqCst);

        let result = self.client.execute(request).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Forwards to a real client, noting when each request starts
struct RecordingTransport {
    client: reqwest::Client,
    started: Mutex<Vec<(String, Instant)>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Start instant of the request whose address ends with `suffix`
    fn started_at(&self, suffix: &str) -> Instant {
        self.started
            .lock()
            .unwrap()
            .iter()
            .find(|(url, _)| url.ends_with(suffix))
            .map(|(_, at)| *at)
            .unwrap_or_else(|| panic!("no request for {}", suffix))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: Request) -> Result<Response, reqwest::Error> {
        self.started
            .lock()
            .unwrap()
            .push((request.url().to_string(), Instant::now()));
        self.client.execute(request).await
    }
}

#[tokio::test]
async fn test_full_crawl_follows_links_once() {
    let server = MockServer::start().await;
    let base = server.uri();

    // The seed links to page1 twice, page1 links back to the seed
    mount_page(
        &server,
        "/",
        &format!(
            r#"<a href="{0}/page1">One</a> <a href="/page1#again">Again</a>"#,
            base
        ),
        1,
    )
    .await;
    mount_page(&server, "/page1", r#"<a href="/">Home</a>"#, 1).await;

    let (crawler, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/", base)]),
        CrawlOption::Response(html_only()),
        CrawlOption::Response(follow_links()),
    ])
    .await;

    assert_eq!(summary.state, CrawlState::Completed);
    assert_eq!(summary.dispatched, 2);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.errors, 0);
    assert!(crawler.filter().has_visited(&format!("{}/page1", base)));
    assert!(crawler.queue().is_closed());
}

#[tokio::test]
async fn test_duplicate_seed_fetched_once() {
    let server = MockServer::start().await;
    mount_page(&server, "/only", "", 1).await;

    let seed = format!("{}/only", server.uri());
    let (_, summary) = run(vec![CrawlOption::StartUrls(vec![seed.clone(), seed])]).await;

    assert_eq!(summary.dispatched, 1);
    assert_eq!(summary.rejected, 1);
}

#[tokio::test]
async fn test_non_html_pages_are_not_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="/hidden">not a link</a>"#)
                .insert_header("content-type", "text/plain"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/hidden", "", 0).await;

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/data.txt", server.uri())]),
        CrawlOption::Response(html_only()),
        CrawlOption::Response(follow_links()),
    ])
    .await;

    assert_eq!(summary.fetched, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_admission_bounds_concurrent_fetches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html("").set_delay(Duration::from_millis(100)))
        .expect(20)
        .mount(&server)
        .await;

    let seeds = (0..20)
        .map(|i| format!("{}/page/{}", server.uri(), i))
        .collect();
    let transport = Arc::new(CountingTransport::new());

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(seeds),
        CrawlOption::Workers(3),
        CrawlOption::Transport(transport.clone()),
    ])
    .await;

    assert_eq!(summary.fetched, 20);
    assert_eq!(transport.sent.load(Ordering::SeqCst), 20);

    let max = transport.max.load(Ordering::SeqCst);
    assert!(max <= 3, "at most 3 concurrent fetches, saw {}", max);
    assert!(max >= 2, "fetches should overlap, saw {}", max);
}

#[tokio::test]
async fn test_same_origin_requests_are_paced() {
    let server = MockServer::start().await;
    mount_page(&server, "/one", "", 1).await;
    mount_page(&server, "/two", "", 1).await;

    let transport = Arc::new(RecordingTransport::new());
    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![
            format!("{}/one", server.uri()),
            format!("{}/two", server.uri()),
        ]),
        CrawlOption::Delay(Duration::from_secs(1)),
        CrawlOption::Transport(transport.clone()),
    ])
    .await;

    let one = transport.started_at("/one");
    let two = transport.started_at("/two");
    assert!(two - one >= Duration::from_secs(1), "requests started {:?} apart", two - one);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.requeued, 1);
}

#[tokio::test]
async fn test_pacing_holds_when_admission_waits_for_a_worker() {
    let slow = MockServer::start().await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("").set_delay(Duration::from_millis(1500)))
        .expect(1)
        .mount(&slow)
        .await;
    mount_page(&server, "/a", "", 1).await;
    mount_page(&server, "/b", "", 1).await;

    // The only worker is busy with another origin while /a and /b wait
    let transport = Arc::new(RecordingTransport::new());
    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![
            format!("{}/slow", slow.uri()),
            format!("{}/a", server.uri()),
            format!("{}/b", server.uri()),
        ]),
        CrawlOption::Workers(1),
        CrawlOption::Delay(Duration::from_secs(1)),
        CrawlOption::Transport(transport.clone()),
    ])
    .await;

    let a = transport.started_at("/a");
    let b = transport.started_at("/b");
    assert!(b - a >= Duration::from_secs(1), "requests started {:?} apart", b - a);
    assert_eq!(summary.fetched, 3);
    assert!(summary.requeued >= 1);
}

#[tokio::test]
async fn test_different_origins_are_not_paced_together() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    mount_page(&first, "/", "", 1).await;
    mount_page(&second, "/", "", 1).await;

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/", first.uri()), format!("{}/", second.uri())]),
        CrawlOption::Delay(Duration::from_secs(30)),
    ])
    .await;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.requeued, 0);
}

#[tokio::test]
async fn test_abort_stops_admission_and_drains() {
    let server = MockServer::start().await;

    // Only the request in flight at abort time reaches the server
    Mock::given(method("GET"))
        .respond_with(html("").set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let seeds: Vec<String> = (0..30)
        .map(|i| format!("{}/slow/{}", server.uri(), i))
        .collect();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);

    let crawler = Crawler::builder()
        .options(vec![
            CrawlOption::StartUrls(seeds),
            CrawlOption::Workers(1),
            CrawlOption::response(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }),
        ])
        .unwrap()
        .start()
        .unwrap();

    while crawler.summary().dispatched == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    crawler.abort();
    assert!(crawler.state().is_stopping());

    // Added after abort: ignored
    crawler.add(format!("{}/late", server.uri()));

    let summary = tokio::time::timeout(Duration::from_secs(5), crawler.wait())
        .await
        .expect("abort should finish promptly");

    // The fetch in flight finished, but its response chain was skipped
    assert_eq!(summary.state, CrawlState::Aborted);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.processed, 0);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
    assert!(crawler.queue().is_empty());
}

#[tokio::test]
async fn test_request_rule_error_is_reported() {
    let server = MockServer::start().await;
    mount_page(&server, "/refused", "", 0).await;

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/refused", server.uri())]),
        CrawlOption::request(|_, request| {
            Err(CrawlError::rule(request.url().as_str(), "signing failed"))
        }),
        CrawlOption::on_error(move |e| sink.lock().unwrap().push(e.to_string())),
    ])
    .await;

    assert_eq!(summary.state, CrawlState::Completed);
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.errors, 1);

    // The error consumer runs on its own task
    tokio::time::sleep(Duration::from_millis(50)).await;
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("signing failed"));
}

#[tokio::test]
async fn test_headers_option_sets_request_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-crawl-test", "yes"))
        .respond_with(html(""))
        .expect(1)
        .mount(&server)
        .await;

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/", server.uri())]),
        CrawlOption::Headers(vec![("X-Crawl-Test".to_string(), "yes".to_string())]),
    ])
    .await;

    assert_eq!(summary.fetched, 1);
}

#[tokio::test]
async fn test_transport_error_is_reported_and_crawl_completes() {
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&errors);

    // Nothing listens on port 9 of the loopback address
    let (crawler, summary) = run(vec![
        CrawlOption::StartUrls(vec!["http://127.0.0.1:9/".to_string()]),
        CrawlOption::on_error(move |e| {
            if matches!(e, CrawlError::Http { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }),
    ])
    .await;

    assert_eq!(summary.state, CrawlState::Completed);
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.errors, 1);

    // Failed addresses are not marked visited
    assert!(!crawler.filter().has_visited("http://127.0.0.1:9/"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_response_chain_short_circuits() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "", 1).await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&calls);
    let second = Arc::clone(&calls);

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/", server.uri())]),
        CrawlOption::response(move |_, page| {
            first.lock().unwrap().push(page.status.as_u16());
            false
        }),
        CrawlOption::response(move |_, _| {
            second.lock().unwrap().push(0);
            true
        }),
    ])
    .await;

    assert_eq!(summary.errors, 0);
    assert_eq!(*calls.lock().unwrap(), vec![200]);
}

#[tokio::test]
async fn test_error_status_still_reaches_response_rules() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&statuses);

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/missing", server.uri())]),
        CrawlOption::response(move |_, page| {
            seen.lock().unwrap().push(page.status.as_u16());
            true
        }),
    ])
    .await;

    assert_eq!(summary.errors, 0);
    assert_eq!(*statuses.lock().unwrap(), vec![404]);
}

#[tokio::test]
async fn test_exclude_patterns_skip_links() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/public">Public</a> <a href="/private/secret">Private</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/public", "", 1).await;
    mount_page(&server, "/private/secret", "", 0).await;

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/", server.uri())]),
        CrawlOption::ExcludePatterns(vec!["/private/".to_string()]),
        CrawlOption::Response(follow_links()),
    ])
    .await;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.rejected, 1);
}

#[tokio::test]
async fn test_allow_patterns_restrict_to_site() {
    let site = MockServer::start().await;
    let elsewhere = MockServer::start().await;

    mount_page(
        &site,
        "/",
        &format!(r#"<a href="{}/away">Away</a>"#, elsewhere.uri()),
        1,
    )
    .await;
    mount_page(&elsewhere, "/away", "", 0).await;

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/", site.uri())]),
        CrawlOption::AllowPatterns(vec![format!("^{}", regex::escape(&site.uri()))]),
        CrawlOption::Response(follow_links()),
    ])
    .await;

    assert_eq!(summary.fetched, 1);
}

#[tokio::test]
async fn test_pages_recorded_to_database() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/next">Next</a>"#, 1).await;
    mount_page(&server, "/next", "", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(SqliteSink::new(&dir.path().join("pages.db")).unwrap());

    let (_, summary) = run(vec![
        CrawlOption::StartUrls(vec![format!("{}/", server.uri())]),
        CrawlOption::Response(record_rule(sink.clone())),
        CrawlOption::Response(html_only()),
        CrawlOption::Response(follow_links()),
    ])
    .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(sink.count().unwrap(), 2);
}
