//! Client for a remote SPARQL query service.
//!
//! The target endpoints (DBpedia, Wikidata) rate-limit aggressively and fail
//! intermittently rather than permanently, so every transport or decode
//! failure is treated as transient and retried. The retry behavior is an
//! explicit, injected policy: the default reproduces the historical
//! retry-until-success loop, while callers that need bounded latency set an
//! attempt ceiling, a deadline, or a cancellation token.

use crate::error::{CompletenessError, Result};
use crate::results::ResultTable;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Wait strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait a fixed interval before the next attempt.
    Fixed(Duration),
}

/// Retry discipline for the endpoint client.
///
/// `max_attempts: None` retries without ceiling; callers relying on it must
/// supply a deadline or cancellation token, since a single `query` call can
/// otherwise block indefinitely.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff: Backoff,
    pub max_attempts: Option<u64>,
    /// Wall-clock budget across all attempts of one query.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            backoff: Backoff::Fixed(Duration::from_secs(2)),
            max_attempts: None,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    pub fn bounded(max_attempts: u64) -> Self {
        RetryPolicy {
            max_attempts: Some(max_attempts),
            ..RetryPolicy::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Out-of-band cancellation for unbounded retry loops, checked between
/// attempts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Anything that can answer a SPARQL query with a result table.
///
/// The windowed fetcher and the derivation strategies are written against
/// this seam so they can run against a scripted service in tests.
pub trait QueryService {
    fn query(&self, query: &str) -> Result<ResultTable>;
}

/// HTTP client for one SPARQL endpoint.
pub struct EndpointClient {
    url: Url,
    agent: ureq::Agent,
    policy: RetryPolicy,
    cancel: CancelToken,
}

/// Per-request socket timeout. Distinct from the policy deadline, which
/// spans all attempts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

impl EndpointClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_policy(endpoint, RetryPolicy::default())
    }

    pub fn with_policy(endpoint: &str, policy: RetryPolicy) -> Result<Self> {
        let url = Url::parse(endpoint).map_err(|e| CompletenessError::InvalidEndpoint {
            url: endpoint.to_string(),
            message: e.to_string(),
        })?;
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(EndpointClient {
            url,
            agent,
            policy,
            cancel: CancelToken::new(),
        })
    }

    /// Installs a cancellation token shared with the caller.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn endpoint(&self) -> &str {
        self.url.as_str()
    }

    /// Sends `query` and retries per the configured policy until a decodable
    /// response arrives.
    pub fn query(&self, query: &str) -> Result<ResultTable> {
        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(CompletenessError::Cancelled);
            }
            if let Some(deadline) = self.policy.deadline {
                if started.elapsed() >= deadline {
                    return Err(CompletenessError::DeadlineExceeded);
                }
            }

            attempts += 1;
            match self.attempt(query) {
                Ok(table) => {
                    debug!(
                        "query succeeded on attempt {} ({} rows)",
                        attempts,
                        table.len()
                    );
                    return Ok(table);
                }
                Err(message) => {
                    warn!("query attempt {} failed: {}", attempts, message);
                    if let Some(max) = self.policy.max_attempts {
                        if attempts >= max {
                            return Err(CompletenessError::Endpoint { attempts, message });
                        }
                    }
                    if let Backoff::Fixed(interval) = self.policy.backoff {
                        // Do not sleep past the deadline.
                        let wait = match self.policy.deadline {
                            Some(deadline) => {
                                let remaining = deadline.saturating_sub(started.elapsed());
                                interval.min(remaining)
                            }
                            None => interval,
                        };
                        std::thread::sleep(wait);
                    }
                }
            }
        }
    }

    /// One attempt; any failure is reported as a transient message.
    fn attempt(&self, query: &str) -> std::result::Result<ResultTable, String> {
        let response = self
            .agent
            .get(self.url.as_str())
            .query("query", query)
            .set("Accept", "application/sparql-results+json")
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => format!("HTTP status {}", code),
                ureq::Error::Transport(t) => format!("transport error: {}", t),
            })?;
        let body = response
            .into_string()
            .map_err(|e| format!("failed to read response body: {}", e))?;
        ResultTable::from_json(&body).map_err(|e| e.to_string())
    }
}

impl QueryService for EndpointClient {
    fn query(&self, query: &str) -> Result<ResultTable> {
        EndpointClient::query(self, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    const EMPTY_RESULTS: &str =
        r#"{ "head": { "vars": ["s"] }, "results": { "bindings": [] } }"#;

    /// Serves `responses` in order on a loopback socket, one per connection.
    fn spawn_server(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        format!("http://{}/sparql", addr)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/sparql-results+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn error_response() -> String {
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string()
    }

    #[test]
    fn retries_transient_failure_then_succeeds() {
        let url = spawn_server(vec![error_response(), ok_response(EMPTY_RESULTS)]);
        let policy = RetryPolicy::bounded(5).with_backoff(Backoff::None);
        let client = EndpointClient::with_policy(&url, policy).unwrap();
        let table = client.query("SELECT ?s WHERE { ?s ?p ?o }").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn malformed_json_is_transient() {
        let url = spawn_server(vec![
            ok_response("{ not json"),
            ok_response(EMPTY_RESULTS),
        ]);
        let policy = RetryPolicy::bounded(5).with_backoff(Backoff::None);
        let client = EndpointClient::with_policy(&url, policy).unwrap();
        assert!(client.query("SELECT ?s WHERE { ?s ?p ?o }").is_ok());
    }

    #[test]
    fn attempt_ceiling_surfaces_endpoint_error() {
        let url = spawn_server(vec![error_response(), error_response()]);
        let policy = RetryPolicy::bounded(2).with_backoff(Backoff::None);
        let client = EndpointClient::with_policy(&url, policy).unwrap();
        match client.query("SELECT ?s WHERE { ?s ?p ?o }") {
            Err(CompletenessError::Endpoint { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected Endpoint error, got {:?}", other),
        }
    }

    #[test]
    fn deadline_bounds_unbounded_retry() {
        // Nothing listens on this port after the listener is dropped.
        let url = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}/sparql", listener.local_addr().unwrap())
        };
        let policy = RetryPolicy::default()
            .with_backoff(Backoff::Fixed(Duration::from_millis(10)))
            .with_deadline(Duration::from_millis(150));
        let client = EndpointClient::with_policy(&url, policy).unwrap();
        match client.query("SELECT ?s WHERE { ?s ?p ?o }") {
            Err(CompletenessError::DeadlineExceeded) => {}
            other => panic!("expected DeadlineExceeded, got {:?}", other),
        }
    }

    #[test]
    fn cancellation_stops_the_loop() {
        let url = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}/sparql", listener.local_addr().unwrap())
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        let client = EndpointClient::new(&url).unwrap().with_cancel_token(cancel);
        match client.query("SELECT ?s WHERE { ?s ?p ?o }") {
            Err(CompletenessError::Cancelled) => {}
            other => panic!("expected Cancelled, got {:?}", other),
        }
    }

    #[test]
    fn rejects_invalid_endpoint_url() {
        assert!(matches!(
            EndpointClient::new("not a url"),
            Err(CompletenessError::InvalidEndpoint { .. })
        ));
    }
}
