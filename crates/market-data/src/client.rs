//! Rate-limited client for the market price API.
//!
//! Every outbound call goes through the shared [`RequestPacer`]. A 429
//! answer is never surfaced: the client backs off and retries the same
//! request indefinitely. There is no fallback price source, so blocking
//! the refresh cycle here beats producing a gap in the cached data.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::{Client, Response, StatusCode};

use crate::backoff::BackoffPolicy;
use crate::errors::FetchError;
use crate::models::{lowest_viable_price, AuctionListing, BazaarSnapshot};
use crate::pacer::RequestPacer;

/// Default HTTP request timeout. Bounds a single attempt; the retry
/// loop spans attempts, it never waits inside one.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the upstream quota reset time (RFC 3339).
const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";

/// Read-only source of market price data.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current bazaar snapshot for a product tag.
    async fn bazaar_snapshot(&self, tag: &str) -> Result<BazaarSnapshot, FetchError>;

    /// Fetch the lowest viable auction price for an item tag, if any
    /// active listing yields one.
    async fn lowest_auction_price(&self, tag: &str) -> Result<Option<i64>, FetchError>;
}

/// HTTP client for the price API.
pub struct PriceClient {
    http: Client,
    base_url: String,
    pacer: Arc<RequestPacer>,
    backoff: BackoffPolicy,
}

impl PriceClient {
    /// Create a price client sharing the given pacer.
    pub fn new(
        base_url: impl Into<String>,
        pacer: Arc<RequestPacer>,
        backoff: BackoffPolicy,
    ) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            pacer,
            backoff,
        }
    }

    /// Issue a paced GET, retrying indefinitely while the upstream
    /// answers 429.
    ///
    /// Returns the response only on 200. Any other status is surfaced
    /// as [`FetchError::Status`]; transport errors are returned
    /// immediately without retrying.
    async fn get_ok(&self, url: &str, resource: &str) -> Result<Response, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            self.pacer.wait().await;

            let resp = self.http.get(url).send().await?;
            match resp.status() {
                StatusCode::OK => return Ok(resp),
                StatusCode::TOO_MANY_REQUESTS => {
                    attempt += 1;
                    let mut delay = self.backoff.delay(attempt);
                    if let Some(reset_at) = parse_reset_header(&resp) {
                        delay = self.backoff.capped_by_reset(delay, reset_at, Utc::now());
                    }
                    drop(resp);

                    warn!(
                        "Rate limited for {} (attempt {}), waiting {:?}",
                        resource, attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                status => return Err(FetchError::status(status)),
            }
        }
    }

    async fn snapshot_for_tag(&self, tag: &str) -> Result<BazaarSnapshot, FetchError> {
        let url = format!("{}/api/bazaar/{}/snapshot", self.base_url, tag);
        let resp = self.get_ok(&url, tag).await?;
        resp.json::<BazaarSnapshot>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Parse the quota reset header, if present and well-formed.
fn parse_reset_header(resp: &Response) -> Option<DateTime<Utc>> {
    let value = resp.headers().get(RATE_LIMIT_RESET_HEADER)?.to_str().ok()?;
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl PriceSource for PriceClient {
    async fn bazaar_snapshot(&self, tag: &str) -> Result<BazaarSnapshot, FetchError> {
        // The bazaar keys most products by lowercase tag; fall back to
        // the raw tag when the normalized one is unknown upstream.
        let normalized = tag.to_lowercase();
        match self.snapshot_for_tag(&normalized).await {
            Err(FetchError::Status { status }) if normalized != tag => {
                debug!(
                    "Bazaar returned status {} for {}, retrying with raw tag {}",
                    status, normalized, tag
                );
                self.snapshot_for_tag(tag).await
            }
            other => other,
        }
    }

    async fn lowest_auction_price(&self, tag: &str) -> Result<Option<i64>, FetchError> {
        let url = format!("{}/api/auctions/tag/{}/active/bin", self.base_url, tag);
        let resp = self.get_ok(&url, tag).await?;
        let listings: Vec<AuctionListing> = resp
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(lowest_viable_price(&listings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_base_url_is_normalized() {
        let pacer = Arc::new(RequestPacer::default());
        let client = PriceClient::new(
            "https://prices.example.com/",
            pacer,
            BackoffPolicy::default(),
        );
        assert_eq!(client.base_url, "https://prices.example.com");
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    /// Serve one canned response per incoming connection, recording the
    /// request path of each.
    async fn serve_responses(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let paths = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&paths);
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                if let Some(path) = head.split_whitespace().nth(1) {
                    recorded.lock().unwrap().push(path.to_string());
                }
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        (format!("http://{}", addr), paths)
    }

    fn fast_client(base_url: &str) -> PriceClient {
        PriceClient::new(
            base_url,
            Arc::new(RequestPacer::new(Duration::from_millis(1))),
            BackoffPolicy {
                base: Duration::from_millis(10),
                max: Duration::from_millis(40),
            },
        )
    }

    const SNAPSHOT_BODY: &str =
        r#"{"buyPrice": 1250.5, "sellPrice": 1100.0, "buyOrders": [], "sellOrders": []}"#;

    #[tokio::test]
    async fn test_rate_limited_request_is_retried_until_ok() {
        let (base_url, paths) = serve_responses(vec![
            http_response("429 Too Many Requests", "{}"),
            http_response("429 Too Many Requests", "{}"),
            http_response("200 OK", SNAPSHOT_BODY),
        ])
        .await;

        let client = fast_client(&base_url);
        let snapshot = client.bazaar_snapshot("AMBER_STONE").await.unwrap();
        assert_eq!(snapshot.buy_price, 1250.5);

        // Every attempt hit the same normalized resource; the 429s were
        // consumed by the retry loop, never surfaced.
        let paths = paths.lock().unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths
            .iter()
            .all(|p| p == "/api/bazaar/amber_stone/snapshot"));
    }

    #[tokio::test]
    async fn test_unknown_lowercase_tag_falls_back_to_raw_tag() {
        let (base_url, paths) = serve_responses(vec![
            http_response("404 Not Found", "{}"),
            http_response("200 OK", SNAPSHOT_BODY),
        ])
        .await;

        let client = fast_client(&base_url);
        let snapshot = client.bazaar_snapshot("AMBER_STONE").await.unwrap();
        assert_eq!(snapshot.sell_price, 1100.0);

        let paths = paths.lock().unwrap();
        assert_eq!(
            *paths,
            vec![
                "/api/bazaar/amber_stone/snapshot".to_string(),
                "/api/bazaar/AMBER_STONE/snapshot".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_does_not_loop_when_tags_match() {
        let (base_url, paths) =
            serve_responses(vec![http_response("404 Not Found", "{}")]).await;

        let client = fast_client(&base_url);
        let err = client.bazaar_snapshot("amber").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404 }));

        // The tag was already lowercase, so there is no second attempt.
        assert_eq!(paths.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auction_price_is_derived_from_listings() {
        let body = r#"[
            {"startingBid": 500, "highestBidAmount": 0, "bin": true},
            {"startingBid": 300, "highestBidAmount": 0, "bin": true}
        ]"#;
        let (base_url, paths) = serve_responses(vec![http_response("200 OK", body)]).await;

        let client = fast_client(&base_url);
        let price = client.lowest_auction_price("AMBER_STONE").await.unwrap();
        assert_eq!(price, Some(300));
        assert_eq!(
            *paths.lock().unwrap(),
            vec!["/api/auctions/tag/AMBER_STONE/active/bin".to_string()]
        );
    }

    #[tokio::test]
    async fn test_transport_error_returns_immediately() {
        // Bind and drop a listener so the port is closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = fast_client(&format!("http://{}", addr));
        let err = client.bazaar_snapshot("AMBER_STONE").await.unwrap_err();
        assert!(err.is_transport());
    }
}
